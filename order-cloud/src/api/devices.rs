//! Device token registration

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::{ApiResult, Empty, ok};
use crate::auth::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/rpc/registerDeviceToken", post(register))
}

#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RegisterTokenRequest>,
) -> ApiResult<Empty> {
    state.profiles.register_device_token(&user, &req.token).await?;
    ok(Empty {})
}
