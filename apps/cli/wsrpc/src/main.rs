use wsrpc::error::WsrpcError;
use wsrpc::handlers::{LoggingObserver, demo_router};
use wsrpc::logger::initialize as LoggerInitialize;

use wsrpc_core::{Session, SessionBuilder, SessionConfig, WorkerDispatch};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};

const APP_DIR_NAME: &str = "wsrpc";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), WsrpcError> {
    // Missing .env is fine
    let env_file = dotenvy::dotenv().ok();

    let config_dir = app_dir(dirs::config_dir(), "config")?;
    let log_dir = app_dir(dirs::data_local_dir(), "data")?;

    create_dir_all(&log_dir).map_err(|e| WsrpcError::Wsrpc {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("wsrpc starting");
    info!("Log directory: {}", log_dir.display());
    if let Some(path) = env_file {
        info!("Loaded environment from {}", path.display());
    }

    let config = SessionConfig::load(&config_dir)
        .map_err(|e| WsrpcError::Config {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?
        .with_env_overrides();

    let dispatch = WorkerDispatch::spawn().map_err(|e| WsrpcError::Core {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let session: Session = SessionBuilder::from_config(&config)
        .with_router(demo_router())
        .with_observer(Arc::new(LoggingObserver))
        .with_dispatch_context(Arc::new(dispatch))
        .build();

    info!("Connecting to {}", config.url);
    session.start();

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| WsrpcError::Wsrpc {
            message: format!("Failed to wait for Ctrl-C: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!("Shutting down");
    session.close();

    Ok(())
}

fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, WsrpcError> {
    base.map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| WsrpcError::Wsrpc {
            message: format!("No {kind} directory on this platform"),
            location: ErrorLocation::from(Location::caller()),
        })
}
