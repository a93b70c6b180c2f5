//! Service bootstrap for hosts embedding LoopGrab.
//!
//! A host supplies its media runtime as a [`MediaHost`] and calls [`run`],
//! which sets up logging, loads the user's configuration, and serves the IPC
//! socket the CLI talks to until the process is asked to stop.

use crate::capture::MediaHost;
use crate::config::{load_config, AppConfig};
use crate::delivery::{DeliverySink, DirectorySink};
use loopgrab_common::ipc::get_socket_path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[cfg(unix)]
use crate::{ipc, logging::init_logging, state::CaptureManager};
#[cfg(unix)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use tracing::{error, warn};

pub type ServiceResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Everything the service needs besides the host.
pub struct ServiceOptions {
    pub config: AppConfig,
    pub sink: Arc<dyn DeliverySink>,
    pub socket_path: PathBuf,
}

impl ServiceOptions {
    /// Save into the configured output directory and listen on `socket_path`.
    pub fn from_config(config: AppConfig, socket_path: PathBuf) -> Result<Self, String> {
        let sink = DirectorySink::from_config(&config)?;
        info!("Captures will be saved to {:?}", sink.directory());
        Ok(Self {
            config,
            sink: Arc::new(sink),
            socket_path,
        })
    }

    /// Options from the user's config file and the default socket path.
    pub fn from_environment() -> Result<Self, String> {
        Self::from_config(load_config(), get_socket_path())
    }
}

/// Serve IPC requests for `host` until `shutdown` is raised.
#[cfg(unix)]
pub async fn serve(
    host: Arc<dyn MediaHost>,
    options: ServiceOptions,
    shutdown: Arc<AtomicBool>,
) -> ServiceResult {
    let manager = Arc::new(CaptureManager::new(host, options.sink, options.config));
    ipc::run_server(manager, &options.socket_path, shutdown).await
}

/// Run the capture service for `host` until SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn run(host: Arc<dyn MediaHost>) -> ServiceResult {
    let _log_guard = init_logging();
    info!("LoopGrab service starting (pid: {})...", std::process::id());

    let options = ServiceOptions::from_environment()?;
    let shutdown = Arc::new(AtomicBool::new(false));
    tokio::spawn(raise_on_signal(Arc::clone(&shutdown)));

    let result = serve(host, options, shutdown).await;
    match &result {
        Ok(()) => info!("LoopGrab service stopped"),
        Err(e) => error!("IPC server error: {}", e),
    }
    result
}

/// Raise `shutdown` on the first SIGINT or SIGTERM.
#[cfg(unix)]
async fn raise_on_signal(shutdown: Arc<AtomicBool>) {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("SIGINT handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
    info!("Shutdown requested");
    shutdown.store(true, Ordering::SeqCst);
}
