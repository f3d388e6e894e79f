//! HTTP surface.
//!
//! Routes mirror the operations one to one. Bodies are parsed by hand so that
//! malformed input gets the same error envelope as domain failures.

mod error;
mod handlers;
pub mod types;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::metrics::MetricsSink;
use crate::repository::Store;
use crate::AppState;

/// Response header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router<S: Store>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::<S>))
        .route("/team/add", post(handlers::add_team::<S>))
        .route("/team/get", get(handlers::get_team::<S>))
        .route("/users/setIsActive", post(handlers::set_is_active::<S>))
        .route("/users/getReview", get(handlers::get_review::<S>))
        .route("/pullRequest/create", post(handlers::create_pull_request::<S>))
        .route("/pullRequest/merge", post(handlers::merge_pull_request::<S>))
        .route("/pullRequest/reassign", post(handlers::reassign_reviewer::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            record_request::<S>,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(assign_request_id))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

/// Tags every log line of the request with a fresh correlation id and echoes
/// it back in `x-request-id`.
async fn assign_request_id(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn record_request<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    state.metrics.http_request(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}
