//! In-memory stand-in for a warehouse session, used by orchestrator tests.

use anyhow::{bail, Result};
use std::collections::BTreeSet;

use super::db::{StatementRunner, TableCatalog};

#[derive(Debug, Default)]
pub struct FakeWarehouse {
    /// Labels of every committed statement, in order.
    pub committed: Vec<String>,
    pub tables: BTreeSet<String>,
    /// Statement label that fails instead of committing.
    pub fail_on: Option<String>,
    pub fail_catalog: bool,
}

impl FakeWarehouse {
    pub fn with_tables(names: &[&str]) -> Self {
        Self {
            tables: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl StatementRunner for FakeWarehouse {
    async fn execute_committed(&mut self, label: &str, _sql: &str) -> Result<u64> {
        if self.fail_on.as_deref() == Some(label) {
            bail!("{label} failed: simulated statement error");
        }
        match label.split_once(' ') {
            Some(("drop", table)) => {
                self.tables.remove(table);
            }
            Some(("create", table)) => {
                self.tables.insert(table.to_string());
            }
            Some((_, table)) if !self.tables.contains(table) => {
                bail!("{label} failed: relation \"{table}\" does not exist");
            }
            _ => {}
        }
        self.committed.push(label.to_string());
        Ok(0)
    }
}

#[async_trait::async_trait]
impl TableCatalog for FakeWarehouse {
    async fn table_count(&mut self, table: &str) -> Result<i64> {
        if self.fail_catalog {
            bail!("catalog unavailable");
        }
        Ok(i64::from(self.tables.contains(table)))
    }
}
