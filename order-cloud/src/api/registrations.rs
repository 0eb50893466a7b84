//! Registration RPCs

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::{ApprovalOverrides, Registration, RegistrationStatus, RegistrationSubmit};

use super::{ApiResult, Empty, ok};
use crate::auth::CurrentUser;
use crate::services::registration::ApprovalResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc/submitRegistration", post(submit))
        .route("/rpc/hqListRegistrations", post(list))
        .route("/rpc/hqApproveRegistration", post(approve))
        .route("/rpc/hqRejectRegistration", post(reject))
        .route("/rpc/hqResetRegistration", post(reset))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocIdRequest {
    pub doc_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRequest {
    pub status: Option<RegistrationStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub doc_id: String,
    #[serde(default)]
    pub overrides: Option<ApprovalOverrides>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub doc_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /rpc/submitRegistration (public), returns the document id
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<RegistrationSubmit>,
) -> ApiResult<String> {
    ok(state.registrations.submit(req).await?)
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ListRequest>,
) -> ApiResult<Vec<Registration>> {
    ok(state.registrations.list(&user, req.status).await?)
}

pub async fn approve(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<ApprovalResult> {
    let overrides = req.overrides.unwrap_or_default();
    ok(state.registrations.approve(&user, &req.doc_id, overrides).await?)
}

pub async fn reject(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Empty> {
    state.registrations.reject(&user, &req.doc_id, req.reason).await?;
    ok(Empty {})
}

pub async fn reset(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<DocIdRequest>,
) -> ApiResult<Empty> {
    state.registrations.reset(&user, &req.doc_id).await?;
    ok(Empty {})
}
