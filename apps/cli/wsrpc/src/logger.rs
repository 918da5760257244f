//! Logging for the wsrpc binary.
//!
//! Colored stdout for whoever runs the client, plus `wsrpc.log` in the data
//! directory. The level comes from `WSRPC_LOG`, read after `.env` is loaded,
//! so frame logging can be turned up without a rebuild. tungstenite logs every
//! frame and handshake step on its own; those targets are capped at warn since
//! `log_frames` already records each frame once.

use crate::error::WsrpcError;

use common::ErrorLocation;

use std::env;
use std::io::stdout;
use std::panic::Location;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::{format_rfc3339_millis, format_rfc3339_seconds};
use log::{LevelFilter, info, warn};

static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "wsrpc.log";

/// Environment variable holding the log level (`error` .. `trace`, `off`).
pub const LOG_LEVEL_ENV: &str = "WSRPC_LOG";

#[cfg(debug_assertions)]
pub(crate) const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
pub(crate) const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

const SOCKET_TARGETS: [&str; 2] = ["tungstenite", "tokio_tungstenite"];

/// Initialize the logger with dual output (stdout + `{log_dir}/wsrpc.log`).
///
/// Safe to call more than once: later calls log a warning and return Ok.
///
/// # Errors
///
/// Returns [`WsrpcError::Wsrpc`] if the log file cannot be created or a global
/// logger is already installed by someone else.
pub fn initialize(log_dir: &Path) -> Result<(), WsrpcError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("Logger already initialized");
        return Ok(());
    }

    let requested = env::var(LOG_LEVEL_ENV).ok();
    let level = level_from(requested.as_deref());

    initialize_internal(log_dir, level)?;
    info!("Logger initialized with level {level}");

    if let Some(value) = requested.filter(|value| value.trim().parse::<LevelFilter>().is_err()) {
        warn!("Ignoring unknown {LOG_LEVEL_ENV} value {value:?}");
    }

    Ok(())
}

/// Level for a `WSRPC_LOG` value. Unset or unknown values give the build default.
pub(crate) fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(DEFAULT_LOG_LEVEL)
}

#[track_caller]
pub(crate) fn initialize_internal(log_dir: &Path, level: LevelFilter) -> Result<(), WsrpcError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{time} {level}] {message}",
                time = format_rfc3339_seconds(SystemTime::now()),
                level = colors.color(record.level()),
            ))
        })
        .chain(stdout());

    // The file is for after-the-fact debugging: target and source line, no colors
    let file_dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{time} {level} {target}] {message} [{file}:{line}]",
                time = format_rfc3339_millis(SystemTime::now()),
                level = record.level(),
                target = record.target(),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0)
            ))
        })
        .chain(
            fern::log_file(&log_file_path).map_err(|e| WsrpcError::Wsrpc {
                message: format!("Failed to create log file {}: {e}", log_file_path.display()),
                location: ErrorLocation::from(Location::caller()),
            })?,
        );

    SOCKET_TARGETS
        .iter()
        .fold(Dispatch::new().level(level), |dispatch, target| {
            dispatch.level_for(*target, LevelFilter::Warn.min(level))
        })
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| WsrpcError::Wsrpc {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
