//! Process-wide structured logging, set once at binary startup.

use slog::{Drain, Level};

/// Initializes the global logger used by every `slog::info!`/`warn!`/etc.
/// call in the crate. `level` parses the same strings as `log::LevelFilter`
/// (`trace`, `debug`, `info`, `warn`, `error`).
pub fn init(level: &str) {
    let level = parse_level(level);
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = slog::Logger::root(drain, slog::o!());
    slog_global::set_global(logger);
}

fn parse_level(s: &str) -> Level {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "warn" | "warning" => Level::Warning,
        "error" => Level::Error,
        "critical" => Level::Critical,
        _ => Level::Info,
    }
}
