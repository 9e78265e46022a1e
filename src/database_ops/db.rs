use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool, Row,
};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use crate::config::WarehouseConfig;
use crate::sql_queries::{table_exists_sql, Statement};

/// Runs one statement and commits it before returning.
#[async_trait::async_trait]
pub trait StatementRunner: Send {
    /// Returns the number of rows affected.
    async fn execute_committed(&mut self, label: &str, sql: &str) -> Result<u64>;
}

/// Existence lookups against `information_schema.tables`.
#[async_trait::async_trait]
pub trait TableCatalog: Send {
    async fn table_count(&mut self, table: &str) -> Result<i64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Outcome of one executed statement.
#[derive(Debug, Clone)]
pub struct StepTiming {
    pub label: String,
    pub rows_affected: u64,
    pub elapsed: Duration,
}

/// Single warehouse session. The pool is capped at one connection so every
/// statement goes through the same backend, strictly one after another.
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(cfg), fields(host = %cfg.cluster.host, db = %cfg.cluster.db_name))]
    pub async fn connect(cfg: &WarehouseConfig) -> Result<Self> {
        let database_url = cfg.database_url()?;
        // Redshift has no server-side prepared statement cache worth keeping
        let connect_options = PgConnectOptions::from_str(&database_url)
            .context("invalid warehouse DSN")?
            .statement_cache_capacity(0);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .context("failed to open warehouse session")?;
        info!("connected to warehouse");
        Ok(Self { pool })
    }

    /// Ordered column definitions for `table`, as the catalog reports them.
    pub async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_name = $1 \
             ORDER BY ordinal_position",
        )
        .persistent(false)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("describe {table}"))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let nullable: String = row.try_get("is_nullable")?;
            out.push(ColumnInfo {
                name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
                nullable: nullable.eq_ignore_ascii_case("YES"),
            });
        }
        Ok(out)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl StatementRunner for Db {
    async fn execute_committed(&mut self, label: &str, sql: &str) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| format!("{label}: begin"))?;
        let res = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(sql))
            .await
            .with_context(|| format!("{label} failed"))?;
        tx.commit()
            .await
            .with_context(|| format!("{label}: commit"))?;
        Ok(res.rows_affected())
    }
}

#[async_trait::async_trait]
impl TableCatalog for Db {
    async fn table_count(&mut self, table: &str) -> Result<i64> {
        let sql = table_exists_sql(table);
        let row = sqlx::raw_sql(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("catalog lookup for {table}"))?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}

/// Execute `statements` in order, each committed before the next is sent.
/// The first failure aborts the sequence; nothing already committed is undone.
pub async fn run_in_order<R>(runner: &mut R, statements: &[Statement]) -> Result<Vec<StepTiming>>
where
    R: StatementRunner + ?Sized,
{
    let mut steps = Vec::with_capacity(statements.len());
    for stmt in statements {
        let started = Instant::now();
        let rows_affected = runner.execute_committed(&stmt.label, &stmt.sql).await?;
        let elapsed = started.elapsed();
        info!(
            statement = %stmt.label,
            rows = rows_affected,
            elapsed_ms = elapsed.as_millis() as u64,
            "committed"
        );
        steps.push(StepTiming {
            label: stmt.label.clone(),
            rows_affected,
            elapsed,
        });
    }
    Ok(steps)
}
