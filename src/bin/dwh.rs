use anyhow::Result;
use clap::{Parser, Subcommand};
use sparkify_dwh::database_ops::{load, schema, verify};
use sparkify_dwh::sql_queries::select_tables;
use sparkify_dwh::util::env;
use sparkify_dwh::{Db, WarehouseConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dwh", version, about = "Sparkify warehouse admin CLI")]
struct Cli {
    /// TOML file with [cluster], [iam_role] and [s3] sections (DWH_* env vars override it)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Drop and recreate all staging and star-schema tables
    CreateTables,
    /// Bulk-load staging from S3, then populate the star schema
    Etl {
        /// Skip the COPY step and only rerun the inserts over current staging contents
        #[arg(long, default_value_t = false)]
        skip_copy: bool,
    },
    /// Check which tables exist in the catalog
    Verify {
        /// Optional comma-separated filter of tables
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },
    /// Print column definitions as the catalog reports them
    Describe {
        /// Optional comma-separated filter of tables
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },
    /// Build the star schema in memory from local copies of the source files
    Simulate {
        /// Directory holding the event-log JSON files
        #[arg(long)]
        log_data: PathBuf,
        /// Directory holding the song JSON files
        #[arg(long)]
        song_data: PathBuf,
        /// Number of insert passes to run without a reset in between
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        passes: u32,
        /// Write the resulting tables to this JSON file
        #[arg(long)]
        json_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("dwh");
    let cli = Cli::parse();

    match cli.command {
        Commands::CreateTables => {
            let cfg = WarehouseConfig::discover(cli.config.as_deref())?;
            env::preflight_check("create-tables", &cfg)?;
            let mut db = Db::connect(&cfg).await?;
            schema::run(&mut db).await?;
            db.close().await;
        }
        Commands::Etl { skip_copy } => {
            let cfg = WarehouseConfig::discover(cli.config.as_deref())?;
            env::preflight_check("etl", &cfg)?;
            let mut db = Db::connect(&cfg).await?;
            if skip_copy {
                let steps = load::insert_tables(&mut db).await?;
                info!(statements = steps.len(), "etl: inserts rerun");
                load::verify_tables(&mut db).await;
            } else {
                let report = load::run(&mut db, &cfg).await?;
                info!(
                    statements = report.steps.len(),
                    elapsed_ms = report.total_elapsed().as_millis() as u64,
                    "etl: completed"
                );
            }
            db.close().await;
        }
        Commands::Verify { tables } => {
            let selected = select_tables(tables.as_deref())?;
            let cfg = WarehouseConfig::discover(cli.config.as_deref())?;
            let mut db = Db::connect(&cfg).await?;
            let results = verify::verify_tables(&mut db, &selected).await;
            info!(
                verified = results.iter().filter(|v| v.is_verified()).count(),
                total = results.len(),
                "verify: done"
            );
            db.close().await;
        }
        Commands::Describe { tables } => {
            use sparkify_dwh::cli::describe::{run, DescribeConfig};
            run(DescribeConfig {
                config_path: cli.config,
                tables,
            })
            .await?;
        }
        Commands::Simulate {
            log_data,
            song_data,
            passes,
            json_out,
        } => {
            use sparkify_dwh::cli::simulate::{run, SimulateConfig};
            run(SimulateConfig {
                log_dir: log_data,
                song_dir: song_data,
                passes,
                json_out,
            })?;
        }
    }

    Ok(())
}
