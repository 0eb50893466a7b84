//! Branch administration RPCs

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::{Branch, BranchUpdate};

use super::{ApiResult, ok};
use crate::auth::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc/hqSetBranchActive", post(set_active))
        .route("/rpc/hqUpdateBranch", post(update))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub branch_id: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub branch_id: String,
    #[serde(flatten)]
    pub update: BranchUpdate,
}

pub async fn set_active(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<Branch> {
    ok(state.branches.set_active(&user, &req.branch_id, req.active).await?)
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateRequest>,
) -> ApiResult<Branch> {
    ok(state.branches.update(&user, &req.branch_id, req.update).await?)
}
