//! HTTP API for order-cloud
//!
//! - `GET /health`
//! - `POST /gateway/notify`: payment gateway webhook, always `200 OK`
//! - `POST /rpc/<operation>`: JSON (camelCase) in, [`ApiResponse`] out;
//!   every operation except `submitRegistration` needs a bearer token

pub mod branches;
pub mod devices;
pub mod gateway_webhook;
pub mod health;
pub mod orders;
pub mod payments;
pub mod registrations;

use axum::{Json, Router};
use http::{HeaderName, HeaderValue};
use serde::Serialize;
use shared::error::{ApiResponse, AppError};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::AppState;

/// Handler result: success payload wrapped in [`ApiResponse`]
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// `{}` payload for operations with nothing to return
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Empty {}

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// All routes, no middleware
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(gateway_webhook::router())
        .merge(registrations::router())
        .merge(branches::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(devices::router())
}

/// Fully layered application
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static("x-request-id");
    build_router()
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, XRequestId))
        .with_state(state)
}
