// 🌐 HTTP surface - axum router shared by the server binary and the tests

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::engine::AssignmentEngine;
use crate::error::{ProvisionError, ValidationError};
use crate::models::{AssignFolderRequest, ProvisionRequest};
use crate::provisioning::FolderProvisioner;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AssignmentEngine>,
    pub provisioner: Arc<FolderProvisioner>,
}

/// Error body for every non-2xx answer
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

fn error_response(status: StatusCode, error: String, problems: Vec<String>) -> Response {
    (status, Json(ErrorBody { error, problems })).into_response()
}

fn validation_response(err: ValidationError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "invalid request".to_string(),
        err.problems,
    )
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
struct ServiceInfo {
    service: &'static str,
    version: &'static str,
    endpoints: [&'static str; 4],
}

/// GET / - Service banner
async fn service_info() -> impl IntoResponse {
    Json(ServiceInfo {
        service: "drive-folder-sync",
        version: crate::VERSION,
        endpoints: ["/health", "/assign-folder", "/folders/provision", "/"],
    })
}

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// POST /assign-folder - Resolve and persist folder ids for a batch of records
async fn assign_folder(State(state): State<AppState>, Json(request): Json<AssignFolderRequest>) -> Response {
    match state.engine.assign(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => validation_response(e),
    }
}

/// POST /folders/provision - Create the company / person folder tree
async fn provision_folders(State(state): State<AppState>, Json(request): Json<ProvisionRequest>) -> Response {
    match state.provisioner.provision(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(ProvisionError::Validation(e)) => validation_response(e),
        Err(e @ (ProvisionError::ContainerNotFound(_) | ProvisionError::RouteNotFound(_))) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string(), Vec::new())
        }
        Err(e) => {
            error!(error = %e, "Folder provisioning failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), Vec::new())
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/assign-folder", post(assign_folder))
        .route("/asignar-folder", post(assign_folder))
        .route("/folders/provision", post(provision_folders))
        .route("/carpetas/crear", post(provision_folders))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
