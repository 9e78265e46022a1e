//! Schema manager: drop and recreate all seven tables, then verify them.
//!
//! Destructive by nature. Whatever the tables held before is gone once `run`
//! returns, and a failing statement leaves the schema half rebuilt.

use anyhow::Result;
use tracing::info;

use super::db::{run_in_order, StatementRunner, StepTiming, TableCatalog};
use super::verify::{verify_tables as verify_in_catalog, Verification};
use crate::sql_queries::{create_table_queries, drop_table_queries, Table};

pub async fn drop_tables<R>(runner: &mut R) -> Result<Vec<StepTiming>>
where
    R: StatementRunner + ?Sized,
{
    run_in_order(runner, &drop_table_queries()).await
}

pub async fn create_tables<R>(runner: &mut R) -> Result<Vec<StepTiming>>
where
    R: StatementRunner + ?Sized,
{
    run_in_order(runner, &create_table_queries()).await
}

pub async fn verify_tables<C>(catalog: &mut C) -> Vec<Verification>
where
    C: TableCatalog + ?Sized,
{
    verify_in_catalog(catalog, &Table::ALL).await
}

/// Drop, create, verify.
pub async fn run<W>(warehouse: &mut W) -> Result<Vec<Verification>>
where
    W: StatementRunner + TableCatalog + ?Sized,
{
    info!(step = "drop", tables = Table::ALL.len(), "resetting schema");
    drop_tables(warehouse).await?;
    info!(step = "create", tables = Table::ALL.len(), "creating tables");
    create_tables(warehouse).await?;
    let verified = verify_tables(warehouse).await;
    info!(
        verified = verified.iter().filter(|v| v.is_verified()).count(),
        total = verified.len(),
        "schema ready"
    );
    Ok(verified)
}
