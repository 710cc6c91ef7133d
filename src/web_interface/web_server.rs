use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use tokio::sync::mpsc::Sender;
use warp::{Filter, Rejection, Reply};

use super::routes::api_routes;
use super::ws::ws_route;
use crate::error_handling::types::WebError;
use crate::scoring::report::ReportService;
use crate::signaling::relay::RelayInput;
use crate::storage::storage_trait::Storage;

/// HTTP API and signaling WebSocket endpoint.
///
/// # Fields Overview
///
/// - `storage`: event, session and interview store behind `/api/events`,
///   `/api/sessions` and `/api/interviews`
/// - `reports`: report builder behind `/api/reports`
/// - `relay`: input channel of the relay task, fed by every `/ws` socket
pub struct WebServer {
    storage: Arc<dyn Storage>,
    reports: Arc<ReportService>,
    relay: Sender<RelayInput>,
}

impl WebServer {
    pub fn new(
        storage: Arc<dyn Storage>,
        reports: Arc<ReportService>,
        relay: Sender<RelayInput>,
    ) -> Self {
        Self {
            storage,
            reports,
            relay,
        }
    }

    /// The composed filter: `/ws` plus every `/api` route, with permissive CORS.
    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST", "OPTIONS"])
            .allow_headers(vec!["content-type"]);
        ws_route(self.relay.clone())
            .or(api_routes(self.storage.clone(), self.reports.clone()))
            .with(cors)
            .with(warp::log("vigil::http"))
    }

    /// Serves until `shutdown` resolves.
    pub async fn start<F>(&self, addr: SocketAddr, shutdown: F) -> Result<(), WebError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| {
                error!("Unable to bind {}: {}", addr, e);
                WebError::BindFailed(e.to_string())
            })?;
        info!("Listening on http://{}", bound);
        server.await;
        info!("Web server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::config::Config;
    use crate::signaling::relay::Relay;
    use crate::storage::memory_storage::MemoryStorage;

    fn server() -> WebServer {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let reports = Arc::new(ReportService::new(
            storage.clone(),
            Arc::new(Config::default()),
        ));
        let (relay, _task) = Relay::new().spawn(16);
        WebServer::new(storage, reports, relay)
    }

    #[tokio::test]
    async fn routes_serve_api_and_reject_unknown_paths() {
        let server = server();
        let routes = server.routes();
        let res = warp::test::request()
            .path("/api/health")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request().path("/nope").reply(&routes).await;
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn start_fails_on_a_taken_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let result = server().start(addr, async {}).await;
        assert!(matches!(result, Err(WebError::BindFailed(_))));
    }
}
