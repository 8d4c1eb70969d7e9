use tracing_subscriber::EnvFilter;

/// Human-readable logs on stderr; stdout is reserved for the command report.
/// Level comes from `BINGSYNC_LOG` (same syntax as `RUST_LOG`), default `info`.
pub fn init() {
    let filter = EnvFilter::try_from_env("BINGSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
