//! Logging setup
//!
//! Console output is filtered by `RUST_LOG` (default `info`). With a log
//! directory a second, non-blocking writer appends to
//! `<dir>/phishguard_<timestamp>.log`; keep the returned guard alive until
//! exit so buffered lines are flushed.

use chrono::Local;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use phishguard_core::config::TIMESTAMP_FORMAT;

use crate::cli::{Error, Result};

/// Name of the log file created for this process
pub fn log_file_name() -> String {
    format!("phishguard_{}.log", Local::now().format(TIMESTAMP_FORMAT))
}

pub fn init_logging(log_dir: Option<&Path>, json: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, log_file_name());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let json_layer = json.then(|| fmt::layer().json());
    let text_layer = (!json).then(|| fmt::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(guard)
}
