use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV_VAR: &str = "CONJURE_LOG";

/// Installs the global fmt subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
