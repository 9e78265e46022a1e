//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::sync::Once;
use tracing::info;

use crate::config::WarehouseConfig;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            // Fallback to the crate root so `cargo run` from a subdirectory still works
            let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
            let _ = dotenv::from_filename(candidate);
        }
    });
}

/// Common bootstrap for CLI binaries: load .env and install the tracing subscriber.
pub fn bootstrap_cli(bin_name: &str) {
    init_env();
    if let Err(e) = crate::logging::init_tracing("info,sqlx=warn") {
        eprintln!("[{bin_name}] {e}");
    }
    info!(target = "bootstrap", bin = bin_name, "environment loaded");
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Log a redacted snapshot of the resolved configuration and fail on blank required values.
pub fn preflight_check(title: &str, cfg: &WarehouseConfig) -> anyhow::Result<()> {
    let snapshot = cfg.redacted();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    let blank: Vec<&str> = [
        ("DWH_HOST", &cfg.cluster.host),
        ("DWH_DB_NAME", &cfg.cluster.db_name),
        ("DWH_DB_USER", &cfg.cluster.db_user),
        ("DWH_DB_PASSWORD", &cfg.cluster.db_password),
        ("DWH_IAM_ROLE_ARN", &cfg.iam_role_arn),
        ("DWH_LOG_DATA", &cfg.s3.log_data),
        ("DWH_LOG_JSONPATH", &cfg.s3.log_jsonpath),
        ("DWH_SONG_DATA", &cfg.s3.song_data),
        ("DWH_REGION", &cfg.s3.region),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(k, _)| k)
    .collect();
    if !blank.is_empty() {
        anyhow::bail!("blank warehouse configuration: {:?}", blank);
    }
    Ok(())
}

/// Mask credentials before a value reaches the logs.
pub fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD") || k.contains("SECRET") || k.contains("TOKEN") {
        return "***".to_string();
    }

    let val_trim = val.trim();

    // Always redact postgres DSNs even if the key isn't obviously sensitive.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        let scheme = u.scheme().to_ascii_lowercase();
        if scheme == "postgres" || scheme == "postgresql" {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    val_trim.to_string()
}
