//! Post-condition check: does each table exist in the catalog?
//!
//! Purely advisory. A failed lookup is reported and logged, never returned as an
//! error, and never stops the run.

use std::io::{self, Write};
use tracing::warn;

use super::db::TableCatalog;
use crate::sql_queries::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Verified,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub table: Table,
    pub status: VerifyStatus,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        self.status == VerifyStatus::Verified
    }

    pub fn report_line(&self) -> String {
        match self.status {
            VerifyStatus::Verified => format!("Table creation verified: {}", self.table),
            VerifyStatus::Failed => {
                format!("Table creation verification failed: {}", self.table)
            }
        }
    }
}

/// Look up every table, print one status line per table, and return the outcomes.
pub async fn verify_tables<C>(catalog: &mut C, tables: &[Table]) -> Vec<Verification>
where
    C: TableCatalog + ?Sized,
{
    let mut out = Vec::with_capacity(tables.len());
    for &table in tables {
        let status = match catalog.table_count(table.name()).await {
            Ok(n) if n > 0 => VerifyStatus::Verified,
            Ok(_) => VerifyStatus::Failed,
            Err(e) => {
                warn!(table = table.name(), error = %e, "catalog lookup failed");
                VerifyStatus::Failed
            }
        };
        let v = Verification { table, status };
        safe_println(&v.report_line());
        out.push(v);
    }
    out
}

fn safe_println(s: &str) {
    let mut stdout = io::stdout();
    let _ = writeln!(stdout, "{}", s);
}
