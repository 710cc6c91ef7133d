use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::configuration::config::Config;
use crate::error_handling::types::ControllerError;
use crate::scoring::report::ReportService;
use crate::signaling::relay::{Relay, RelayInput};
use crate::storage::{build_storage, Storage};
use crate::web_interface::web_server::WebServer;

/// Capacity of the channel feeding the relay task.
const RELAY_QUEUE: usize = 1024;

/// Wires storage, the relay task and the web server together.
///
/// # Fields Overview
///
/// - `config`: effective configuration, shared with the report builder
/// - `storage`: backend selected by `[storage]`
/// - `reports`: report service over `storage`
pub struct Controller {
    pub config: Arc<Config>,
    storage: Arc<dyn Storage>,
    reports: Arc<ReportService>,
}

impl Controller {
    /// Opens the configured storage backend.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        let config = Arc::new(config);
        let storage = build_storage(&config.storage).await.map_err(|e| {
            error!("Unable to open {:?} storage: {}", config.storage.backend, e);
            ControllerError::StorageError(e)
        })?;
        info!("Storage backend {:?} ready", config.storage.backend);
        let reports = Arc::new(ReportService::new(storage.clone(), config.clone()));
        Ok(Self {
            config,
            storage,
            reports,
        })
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn reports(&self) -> Arc<ReportService> {
        self.reports.clone()
    }

    /// Spawns the relay and builds the web server feeding it.
    pub fn spawn_services(&self) -> (WebServer, Sender<RelayInput>, JoinHandle<()>) {
        let (relay, relay_task) = Relay::new().spawn(RELAY_QUEUE);
        let server = WebServer::new(self.storage.clone(), self.reports.clone(), relay.clone());
        (server, relay, relay_task)
    }

    /// Serves until Ctrl-C.
    pub async fn run(&self) -> Result<(), ControllerError> {
        let addr = self.config.socket_addr()?;
        self.run_until(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await
    }

    /// Serves on `addr` until `shutdown` resolves, then stops the relay.
    ///
    /// Upgraded sockets outlive the HTTP server, so the relay task is aborted
    /// rather than drained.
    pub async fn run_until<F>(&self, addr: SocketAddr, shutdown: F) -> Result<(), ControllerError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let (server, relay, relay_task) = self.spawn_services();
        let result = server.start(addr, shutdown).await;
        drop(server);
        drop(relay);
        relay_task.abort();
        match relay_task.await {
            Err(e) if !e.is_cancelled() => error!("Relay task ended abnormally: {:?}", e),
            _ => info!("Relay stopped"),
        }
        result.map_err(ControllerError::from)
    }
}
