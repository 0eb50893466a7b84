//! Payment RPCs

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::{ApiResult, ok};
use crate::auth::CurrentUser;
use crate::services::payments::{CheckoutParams, VerifyResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc/preparePayment", post(prepare))
        .route("/rpc/verifyPayment", post(verify))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub order_id: String,
    pub transaction_id: String,
}

pub async fn prepare(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<PrepareRequest>,
) -> ApiResult<CheckoutParams> {
    ok(state.payments.prepare(&user, &req.order_id).await?)
}

pub async fn verify(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<VerifyResult> {
    ok(state
        .payments
        .verify(&user, &req.order_id, &req.transaction_id)
        .await?)
}
