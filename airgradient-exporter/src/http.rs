//! HTTP endpoints for scraping, device configuration, and measurement push.

use std::sync::Arc;

use airgradient_common::DeviceId;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, FailedToBufferBody};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::DeviceSettings;
use crate::ingest::{IngestError, MeasurementIngestor};
use crate::registry::SharedRegistry;

/// Content type of the scrape response.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Route serving device configuration.
pub const CONFIG_ROUTE: &str = "/sensors/:mac/one/config";

/// Route accepting measurement pushes.
pub const MEASURES_ROUTE: &str = "/sensors/:mac/measures";

/// Liveness route.
pub const HEALTH_ROUTE: &str = "/health";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    registry: SharedRegistry,
    ingestor: MeasurementIngestor,
    device: Arc<DeviceSettings>,
}

impl AppState {
    pub fn new(registry: SharedRegistry, device: DeviceSettings) -> Self {
        Self {
            ingestor: MeasurementIngestor::new(registry.clone()),
            registry,
            device: Arc::new(device),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }
}

/// Errors terminated at the handler boundary.
#[derive(Debug)]
pub enum ApiError {
    BadRequest,
    PayloadTooLarge,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest => (StatusCode::BAD_REQUEST, "Bad Request\n").into_response(),
            ApiError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large\n").into_response()
            }
            ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response()
            }
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        match rejection {
            BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(e)) => {
                warn!(error = %e, "Measurement body exceeds size limit");
                ApiError::PayloadTooLarge
            }
            other => {
                error!(error = %other, "Failed to read body");
                ApiError::Internal
            }
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match &err {
            IngestError::Malformed { body, source } => {
                error!(error = %source, body = %body, "Failed to decode measurement");
            }
        }
        ApiError::BadRequest
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route(CONFIG_ROUTE, get(config_handler))
        .route(MEASURES_ROUTE, post(measures_handler))
        .route(HEALTH_ROUTE, get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Log the request line and the headers devices are identified by.
fn log_request(method: &Method, uri: &Uri, headers: &HeaderMap) {
    let value_of = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    info!(
        path = %uri.path(),
        method = %method,
        user_agent = %value_of(header::USER_AGENT),
        content_type = %value_of(header::CONTENT_TYPE),
        accept = %value_of(header::ACCEPT),
        "request"
    );
}

/// Handler for the scrape endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.registry.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        ApiError::Internal
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
        body,
    )
        .into_response())
}

/// Handler for `GET /sensors/{mac}/one/config`.
async fn config_handler(
    State(state): State<AppState>,
    Path(mac): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    log_request(&method, &uri, &headers);

    let body = state.device.server_config().to_json().map_err(|e| {
        error!(mac = %mac, error = %e, "Failed to marshal config");
        ApiError::Internal
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Handler for `POST /sensors/{mac}/measures`.
async fn measures_handler(
    State(state): State<AppState>,
    Path(mac): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<&'static str, ApiError> {
    log_request(&method, &uri, &headers);

    let body = body?;

    let device = DeviceId::from_path_segment(&mac);
    state.ingestor.ingest(&device, &body)?;

    Ok("OK")
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}
