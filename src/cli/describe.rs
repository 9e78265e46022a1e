use anyhow::Result;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::WarehouseConfig;
use crate::database_ops::db::{ColumnInfo, Db};
use crate::sql_queries::{select_tables, Table};

#[derive(Debug, Clone, Default)]
pub struct DescribeConfig {
    pub config_path: Option<PathBuf>,
    /// Subset of tables to describe (default: all seven).
    pub tables: Option<Vec<String>>,
}

pub async fn run(cfg: DescribeConfig) -> Result<()> {
    let wh = WarehouseConfig::discover(cfg.config_path.as_deref())?;
    let tables = select_tables(cfg.tables.as_deref())?;
    let db = Db::connect(&wh).await?;

    let mut out = String::new();
    for table in tables {
        let columns = db.describe_columns(table.name()).await?;
        render_table(&mut out, table, &columns);
    }
    let _ = write!(io::stdout(), "{out}");
    db.close().await;
    Ok(())
}

fn render_table(out: &mut String, table: Table, columns: &[ColumnInfo]) {
    if columns.is_empty() {
        writeln!(out, "columns {:30} (missing)", table.name()).ok();
        return;
    }
    writeln!(out, "columns {:30}", table.name()).ok();
    for c in columns {
        writeln!(
            out,
            "  - {:24} {:8} {}",
            c.name,
            if c.nullable { "null" } else { "not-null" },
            c.data_type
        )
        .ok();
    }
}
