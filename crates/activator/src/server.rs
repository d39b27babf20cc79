//! HTTP surface of the activation gateway.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::activation::activate;
use crate::backend::ClusterBackend;
use crate::config::Config;
use crate::models::ServiceDescription;
use crate::status::{classify_failure, collect_status};
use crate::templates::{TemplateEngine, WelcomeContext};

/// Shared application state.
pub struct AppState {
    /// Gateway configuration.
    pub config: Config,
    /// Platform API facade.
    pub backend: Arc<dyn ClusterBackend>,
    /// Page templates.
    pub templates: TemplateEngine,
    /// Serializes activation runs within this process; the conditional
    /// scale-up guards against other processes.
    activation_lock: Mutex<()>,
}

impl AppState {
    /// Create the shared state.
    #[must_use]
    pub fn new(config: Config, backend: Arc<dyn ClusterBackend>, templates: TemplateEngine) -> Self {
        Self {
            config,
            backend,
            templates,
            activation_lock: Mutex::new(()),
        }
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(welcome_handler))
        .route("/health", get(health_handler))
        .route("/run_script", post(run_script_handler))
        .route("/start_service/{service_name}", post(start_service_handler))
        .route("/stop_service/{service_name}", post(stop_service_handler))
        .route("/get_status", get(get_status_handler))
        .route("/stop_script", post(stop_script_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn run_server(state: Arc<AppState>, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Activation gateway listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Response to a start/stop control request.
#[derive(Debug, Serialize)]
struct ControlResponse {
    message: String,
    response: ServiceDescription,
}

/// Error body for 500 responses.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

/// Body for the unimplemented `stop_script` endpoint.
#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// Welcome page handler.
async fn welcome_handler(State(state): State<Arc<AppState>>) -> Response {
    let context = WelcomeContext {
        cluster: &state.config.cluster,
        region: &state.config.region,
        version: env!("CARGO_PKG_VERSION"),
    };
    match state.templates.render_welcome(&context) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(error = %err, "failed to render welcome page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Activation handler. Soft failures (cluster busy, task never ready, no
/// public address) are HTTP 200 with the condition encoded in the body; only
/// platform API failures become 500s.
async fn run_script_handler(State(state): State<Arc<AppState>>) -> Response {
    let _guard = state.activation_lock.lock().await;

    let opts = state.config.activation_options();
    match activate(state.backend.as_ref(), &state.config.cluster, &opts).await {
        Ok(activation) => (StatusCode::OK, Json(activation)).into_response(),
        Err(err) => {
            error!(error = %err, "activation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Scale a service to one replica.
async fn start_service_handler(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Response {
    scale_service(&state, &service_name, 1, "starting").await
}

/// Scale a service to zero replicas.
async fn stop_service_handler(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Response {
    scale_service(&state, &service_name, 0, "stopping").await
}

async fn scale_service(state: &AppState, service: &str, count: u32, verb: &str) -> Response {
    match state
        .backend
        .set_desired_count(&state.config.cluster, service, count, None)
        .await
    {
        Ok(description) => {
            info!(%service, count, "desired count updated");
            (
                StatusCode::OK,
                Json(ControlResponse {
                    message: format!("Service {service} is {verb}."),
                    response: description,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!(%service, count, error = %err, "scale request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Status report across all services.
async fn get_status_handler(State(state): State<Arc<AppState>>) -> Response {
    match collect_status(state.backend.as_ref(), &state.config.cluster).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => {
            let class = classify_failure(&err);
            error!(?class, error = %err, "status aggregation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: class.public_message().to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Declared but intentionally unimplemented.
async fn stop_script_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(MessageResponse {
            message: "stop_script is not implemented",
        }),
    )
}
