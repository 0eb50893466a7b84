//! Order RPCs

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::Order;

use super::{ApiResult, Empty, ok};
use crate::auth::CurrentUser;
use crate::services::orders::{OrderDetail, OrderFilter, OrderLineInput, TransitionResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc/createDraftOrder", post(create_draft))
        .route("/rpc/addOrderItem", post(add_item))
        .route("/rpc/setOrderItemQty", post(set_qty))
        .route("/rpc/placeOrder", post(place))
        .route("/rpc/getOrder", post(get_order))
        .route("/rpc/listMyOrders", post(list_mine))
        .route("/rpc/hqListOrders", post(hq_list))
        .route("/rpc/hqUpdateOrderStatus", post(update_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdRequest {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub order_id: String,
    pub line: OrderLineInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetQtyRequest {
    pub order_id: String,
    pub product_id: String,
    pub qty: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_id: String,
    pub next_status: String,
}

pub async fn create_draft(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Order> {
    ok(state.orders.create_draft(&user).await?)
}

pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<Empty> {
    state.orders.add_item(&user, &req.order_id, req.line).await?;
    ok(Empty {})
}

pub async fn set_qty(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SetQtyRequest>,
) -> ApiResult<Empty> {
    state
        .orders
        .set_qty(&user, &req.order_id, &req.product_id, req.qty)
        .await?;
    ok(Empty {})
}

pub async fn place(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<OrderIdRequest>,
) -> ApiResult<Order> {
    ok(state.orders.place(&user, &req.order_id).await?)
}

pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<OrderIdRequest>,
) -> ApiResult<OrderDetail> {
    ok(state.orders.get(&user, &req.order_id).await?)
}

pub async fn list_mine(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Vec<Order>> {
    ok(state.orders.list_mine(&user).await?)
}

pub async fn hq_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(filter): Json<OrderFilter>,
) -> ApiResult<Vec<Order>> {
    ok(state.orders.hq_list(&user, filter).await?)
}

pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<TransitionResult> {
    ok(state
        .orders
        .transition(&user, &req.order_id, &req.next_status)
        .await?)
}
