//! Tracing setup for the CLI. Logs go to `LOG_FILE` when set, otherwise nowhere,
//! so stdout carries only the answer.

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking writer alive; drop it only at exit so buffered lines are flushed.
pub struct LogGuard(Option<tracing_appender::non_blocking::WorkerGuard>);

pub fn init() -> Result<LogGuard, Box<dyn std::error::Error>> {
    let Some(path) = std::env::var_os("LOG_FILE").filter(|v| !v.is_empty()) else {
        return Ok(LogGuard(None));
    };
    let path = Path::new(&path);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("LOG_FILE has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()?;
    Ok(LogGuard(Some(guard)))
}
