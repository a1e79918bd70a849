//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g.
/// `RUST_LOG=meadow::grass=trace` for per-frame cull stats.
///
/// # Example
/// ```
/// meadow::core::logging::init();
/// log::info!("Grass demo started");
/// ```
pub fn init() {
    // try_init so tools and doctests can call this more than once
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
