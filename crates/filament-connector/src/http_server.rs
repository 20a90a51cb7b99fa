//! HTTP server for a connector.
//!
//! Wires the three wire-protocol routes plus a health probe into an axum
//! app. Bodies over the shared payload limit are rejected before parsing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use filament_common::{FilamentError, Paths, Result, MAX_PAYLOAD_SIZE};
use filament_supervisor::Supervisor;

use crate::http_router::ConnectorRouter;

pub struct ConnectorServer {
    router: Arc<ConnectorRouter>,
    paths: Paths,
}

impl ConnectorServer {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self::with_paths(supervisor, Paths::default())
    }

    pub fn with_paths(supervisor: Arc<Supervisor>, paths: Paths) -> Self {
        Self {
            router: Arc::new(ConnectorRouter::new(supervisor)),
            paths,
        }
    }

    /// The axum application. Exposed separately from [`run`](Self::run) so
    /// tests can serve it on an ephemeral listener.
    pub fn app(&self) -> axum::Router {
        axum::Router::new()
            .route(&self.paths.setup, post(handle_setup))
            .route(&self.paths.run, post(handle_run))
            .route(&self.paths.notify, post(handle_notify))
            .route("/__health", get(health_check))
            .layer(CorsLayer::permissive())
            .with_state(self.router.clone())
    }

    /// Binds and serves until shutdown.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let app = self.app();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FilamentError::Transport(format!("failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| FilamentError::Transport(format!("failed to get local addr: {}", e)))?;
        info!("connector listening on {}", local_addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| FilamentError::Transport(format!("server error: {}", e)))
    }
}

/// Maps core errors onto HTTP status codes. Parse-level problems are the
/// caller's fault; missing placements are 404; everything else is a server
/// error on this peer.
fn error_status(error: &FilamentError) -> StatusCode {
    match error {
        FilamentError::Json(_)
        | FilamentError::InvalidSignal { .. }
        | FilamentError::UnknownSignal(_)
        | FilamentError::MissingChainId => StatusCode::BAD_REQUEST,
        FilamentError::NodeNotFound(_)
        | FilamentError::StageNotFound(_)
        | FilamentError::NoNextConnector(_)
        | FilamentError::MonitoringNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: Result<serde_json::Value>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(error) => {
            warn!(%error, "request failed");
            (
                error_status(&error),
                Json(serde_json::json!({ "error": error.to_string() })),
            )
                .into_response()
        }
    }
}

fn check_size(body: &Bytes) -> Option<Response> {
    if body.len() > MAX_PAYLOAD_SIZE {
        return Some(
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("body of {} bytes exceeds the {} byte limit", body.len(), MAX_PAYLOAD_SIZE),
            )
                .into_response(),
        );
    }
    None
}

async fn handle_setup(State(router): State<Arc<ConnectorRouter>>, body: Bytes) -> Response {
    if let Some(rejection) = check_size(&body) {
        return rejection;
    }
    respond(router.handle_setup(&body).await)
}

async fn handle_run(State(router): State<Arc<ConnectorRouter>>, body: Bytes) -> Response {
    if let Some(rejection) = check_size(&body) {
        return rejection;
    }
    respond(router.handle_run(&body).await)
}

async fn handle_notify(State(router): State<Arc<ConnectorRouter>>, body: Bytes) -> Response {
    if let Some(rejection) = check_size(&body) {
        return rejection;
    }
    respond(router.handle_notify(&body).await)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&FilamentError::MissingChainId),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&FilamentError::NoNextConnector("B".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&FilamentError::ProcessingFailed {
                node_id: "n".into(),
                stage_index: 0,
                cause: "boom".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let body = Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        let rejection = check_size(&body).unwrap();
        assert_eq!(rejection.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
