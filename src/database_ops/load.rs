//! Load orchestrator: S3 -> staging (COPY), staging -> star schema (INSERT), verify.

use anyhow::Result;
use std::time::Duration;
use tracing::info;

use super::db::{run_in_order, StatementRunner, StepTiming, TableCatalog};
use super::verify::{verify_tables as verify_in_catalog, Verification};
use crate::config::WarehouseConfig;
use crate::sql_queries::{copy_table_queries, insert_table_queries, Table};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub steps: Vec<StepTiming>,
    pub verifications: Vec<Verification>,
}

impl LoadReport {
    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|s| s.elapsed).sum()
    }
}

/// Bulk-copy the event logs and the song catalog into the staging tables.
pub async fn load_staging_tables<R>(
    runner: &mut R,
    cfg: &WarehouseConfig,
) -> Result<Vec<StepTiming>>
where
    R: StatementRunner + ?Sized,
{
    run_in_order(runner, &copy_table_queries(cfg)).await
}

/// Populate songplays, users, songs, artists, time, in that order.
pub async fn insert_tables<R>(runner: &mut R) -> Result<Vec<StepTiming>>
where
    R: StatementRunner + ?Sized,
{
    run_in_order(runner, &insert_table_queries()).await
}

pub async fn verify_tables<C>(catalog: &mut C) -> Vec<Verification>
where
    C: TableCatalog + ?Sized,
{
    verify_in_catalog(catalog, &Table::STAGING).await
}

pub async fn run<W>(warehouse: &mut W, cfg: &WarehouseConfig) -> Result<LoadReport>
where
    W: StatementRunner + TableCatalog + ?Sized,
{
    let mut report = LoadReport::default();
    info!(step = "copy", "loading staging tables");
    report.steps.extend(load_staging_tables(warehouse, cfg).await?);
    info!(step = "insert", "populating analytical tables");
    report.steps.extend(insert_tables(warehouse).await?);
    report.verifications = verify_tables(warehouse).await;
    info!(
        statements = report.steps.len(),
        elapsed_ms = report.total_elapsed().as_millis() as u64,
        "load finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, S3Config};
    use crate::database_ops::schema;
    use crate::database_ops::testing::FakeWarehouse;

    fn cfg() -> WarehouseConfig {
        WarehouseConfig {
            cluster: ClusterConfig {
                host: "localhost".into(),
                db_name: "dev".into(),
                db_user: "awsuser".into(),
                db_password: "secret".into(),
                port: 5439,
            },
            iam_role_arn: "arn:aws:iam::123456789012:role/dwhRole".into(),
            s3: S3Config {
                log_data: "s3://bucket/log_data".into(),
                log_jsonpath: "s3://bucket/log_json_path.json".into(),
                song_data: "s3://bucket/song_data".into(),
                region: "us-west-2".into(),
            },
        }
    }

    #[tokio::test]
    async fn copies_then_inserts_in_fixed_order() {
        let mut wh = FakeWarehouse::default();
        schema::run(&mut wh).await.unwrap();
        wh.committed.clear();

        let report = run(&mut wh, &cfg()).await.unwrap();
        assert_eq!(
            wh.committed,
            vec![
                "copy staging_events",
                "copy staging_songs",
                "insert songplays",
                "insert users",
                "insert songs",
                "insert artists",
                "insert time",
            ]
        );
        assert_eq!(report.steps.len(), 7);
        let verified: Vec<Table> = report.verifications.iter().map(|v| v.table).collect();
        assert_eq!(verified, Table::STAGING.to_vec());
        assert!(report.verifications.iter().all(|v| v.is_verified()));
    }

    #[tokio::test]
    async fn copy_failure_skips_all_inserts() {
        let mut wh = FakeWarehouse::default();
        schema::run(&mut wh).await.unwrap();
        wh.committed.clear();
        wh.fail_on = Some("copy staging_songs".into());

        assert!(run(&mut wh, &cfg()).await.is_err());
        assert_eq!(wh.committed, vec!["copy staging_events"]);
    }

    #[tokio::test]
    async fn missing_staging_tables_fail_the_copy() {
        let mut wh = FakeWarehouse::default();
        let err = run(&mut wh, &cfg()).await.unwrap_err();
        assert!(err.to_string().contains("staging_events"));
        assert!(wh.committed.is_empty());
    }
}
