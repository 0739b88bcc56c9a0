//! Structured logging setup: `RUST_LOG`-driven console output plus a
//! daily-rolling JSONL error log under `logs/`, both layered on the same
//! `tracing_subscriber::registry` (spec §6 persisted layout).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Guard must be held for the lifetime of the process or the non-blocking
/// file writer stops flushing.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

pub fn init_logging() -> LoggingGuard {
    std::fs::create_dir_all("logs").ok();
    let file_appender = tracing_appender::rolling::daily("logs", "error");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::filter::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let console_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    LoggingGuard { _file_guard: guard }
}
