//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use vitserve_classifiers::{ImageClassificationHandler, InferenceHandler};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ImageClassificationHandler>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/invocations", post(invocations))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check; the model is loaded before the listener is bound
async fn ping(State(state): State<AppState>) -> Json<serde_json::Value> {
    let context = state.handler.context();
    Json(json!({
        "status": "healthy",
        "model": context.model_id(),
        "device": context.device(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Run decode → predict → encode for one request
async fn invocations(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    metrics::counter!("vitserve_requests_total").increment(1);
    let start = Instant::now();

    let content_type = header_value(&headers, header::CONTENT_TYPE).unwrap_or_default();
    let accept = header_value(&headers, header::ACCEPT);
    let handler = state.handler.clone();

    // Forward passes are CPU/GPU bound; keep them off the async workers
    let (body, response_type) = tokio::task::spawn_blocking(move || {
        handler.invoke(&body, &content_type, accept.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("inference task failed: {}", e)))??;

    metrics::histogram!("vitserve_inference_latency_us").record(start.elapsed().as_micros() as f64);

    Ok(([(header::CONTENT_TYPE, response_type)], body).into_response())
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Error handling
#[derive(Debug)]
enum AppError {
    Inference(vitserve_core::Error),
    Internal(String),
}

impl From<vitserve_core::Error> for AppError {
    fn from(err: vitserve_core::Error) -> Self {
        AppError::Inference(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::Inference(err) => {
                let (status, error_type) = match &err {
                    vitserve_core::Error::UnsupportedMediaType(_) => {
                        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type")
                    }
                    err if err.is_client_error() => (StatusCode::BAD_REQUEST, "invalid_request_error"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "model_error"),
                };
                (status, error_type, err.to_string())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        if status.is_server_error() {
            error!("Invocation failed: {}", message);
        } else {
            warn!("Invocation rejected: {}", message);
        }
        metrics::counter!("vitserve_errors_total", "type" => error_type).increment(1);

        let body = json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        });

        (status, Json(body)).into_response()
    }
}
