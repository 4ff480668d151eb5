//! Console and file log sinks

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr layer and a plain-text file layer under `log_dir`.
///
/// `RUST_LOG` overrides the console level only; the file always records at
/// least `info` so every run leaves a complete trail next to its snapshots.
/// The returned guard flushes the file writer when dropped and must outlive
/// the run.
pub fn init(log_dir: &Path, verbose: bool) -> Result<(PathBuf, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;

    // one file per run, named by its start time
    let file_name = format!("docsweep-{}.log", Utc::now().format("%Y%m%dT%H%M%SZ"));
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&file_name)
        .build(log_dir)
        .with_context(|| format!("cannot open log file in {}", log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let level = if verbose { "debug" } else { "info" };
    let quiet_deps = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{}", level, quiet_deps)));
    let file_filter = EnvFilter::new(format!("{},{}", level, quiet_deps));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .try_init()
        .context("logging already initialized")?;

    Ok((log_dir.join(file_name), guard))
}
