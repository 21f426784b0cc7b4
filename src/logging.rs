//! Process-wide logging init, called once at startup.

/// Initialize `tracing_subscriber` from the configured verbosity threshold.
/// `level` is handed to `EnvFilter` verbatim, so both bare levels ("info")
/// and target-scoped directives ("cached_dns_resolver=debug") work.
pub fn init(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
