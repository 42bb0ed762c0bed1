// ABOUTME: Logging setup for the opkssh binary
// ABOUTME: Stderr tracing with a verbosity-selected default level and RUST_LOG override

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Default level for a `-v` count: WARN, then INFO, then DEBUG.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Filter from `RUST_LOG`-style directives, falling back to the verbosity level
/// when they are absent, blank or unparseable.
pub fn filter(verbosity: u8, directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(level_for(verbosity).into()))
}

/// Standard logging to stderr so stdout stays clean for command output.
pub fn init(verbosity: u8) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter(verbosity, directives.as_deref()))
        .init();
}
