use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Installs the global subscriber: compact one-line events on stderr, so the
/// per-table status lines on stdout stay readable when piped.
///
/// `default_filter` applies when `RUST_LOG` is unset.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_an_error() {
        let _ = init_tracing("warn");
        assert!(init_tracing("warn").is_err());
    }
}
