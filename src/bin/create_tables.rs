use anyhow::{Context, Result};
use clap::Parser;
use sparkify_dwh::database_ops::schema;
use sparkify_dwh::util::env;
use sparkify_dwh::{Db, WarehouseConfig};
use std::path::PathBuf;

/// Drop and recreate the staging and star-schema tables.
#[derive(Parser, Debug)]
#[command(name = "create_tables", version)]
struct Args {
    /// TOML file with [cluster], [iam_role] and [s3] sections (DWH_* env vars override it)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("create_tables");
    let args = Args::parse();

    let cfg = WarehouseConfig::discover(args.config.as_deref())?;
    env::preflight_check("create_tables", &cfg)?;
    let mut db = Db::connect(&cfg).await.context("connect")?;

    schema::run(&mut db).await?;

    db.close().await;
    Ok(())
}
