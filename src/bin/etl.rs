use anyhow::{Context, Result};
use clap::Parser;
use sparkify_dwh::database_ops::load;
use sparkify_dwh::util::env;
use sparkify_dwh::{Db, WarehouseConfig};
use std::path::PathBuf;
use tracing::info;

/// Copy the S3 sources into staging, then populate the star schema.
#[derive(Parser, Debug)]
#[command(name = "etl", version)]
struct Args {
    /// TOML file with [cluster], [iam_role] and [s3] sections (DWH_* env vars override it)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("etl");
    let args = Args::parse();

    let cfg = WarehouseConfig::discover(args.config.as_deref())?;
    env::preflight_check("etl", &cfg)?;
    let mut db = Db::connect(&cfg).await.context("connect")?;

    let report = load::run(&mut db, &cfg).await?;
    info!(
        statements = report.steps.len(),
        elapsed_ms = report.total_elapsed().as_millis() as u64,
        "etl: completed"
    );

    db.close().await;
    Ok(())
}
