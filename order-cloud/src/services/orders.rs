//! Order lifecycle
//!
//! Every status change is a read-validate-write inside one store write
//! transaction. Two racing transitions from the same state serialize on the
//! writer lock; the second one re-reads the new status and fails the edge
//! check, leaving the winner's write in place.

use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Branch, Order, OrderLine, OrderStatus, OrderTotals, UserProfile};
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::error::{ServiceError, ServiceResult};
use crate::notify::{HQ_TOPIC, Notification, Notifier, Target, branch_topic};
use crate::store::{Collection, DocTxn, Direction, DocumentStore, Query, child_key};

/// Default and maximum page size for HQ order search
pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 200;

/// Line payload from the client; totals are never taken from here
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineInput {
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand_id: String,
    #[serde(default)]
    pub unit: String,
    pub unit_price: i64,
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub branch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// HQ search parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<String>,
    pub branch_prefix: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct OrderService {
    store: DocumentStore,
    notifier: Notifier,
}

/// Load an order inside a transaction and check the caller owns it
fn load_owned(txn: &DocTxn<'_>, order_id: &str, caller: &CurrentUser) -> ServiceResult<Order> {
    let order: Order = txn
        .get(Collection::Orders, order_id)?
        .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, order_id))?;
    if order.owner_uid != caller.uid {
        return Err(AppError::new(ErrorCode::NotOrderOwner)
            .with_detail("orderId", order_id)
            .into());
    }
    Ok(order)
}

fn require_draft(order: &Order) -> Result<(), AppError> {
    if order.status != OrderStatus::Draft {
        return Err(AppError::new(ErrorCode::OrderNotDraft)
            .with_detail("orderId", order.id.as_str())
            .with_detail("status", order.status.as_str()));
    }
    Ok(())
}

fn validate_product_id(product_id: &str) -> Result<(), AppError> {
    if product_id.trim().is_empty() {
        return Err(AppError::required("productId"));
    }
    if product_id.contains('/') {
        return Err(AppError::invalid_argument("productId must not contain '/'"));
    }
    Ok(())
}

impl OrderService {
    pub fn new(store: DocumentStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// One open draft per owner; concurrent calls return the same draft
    pub async fn create_draft(&self, caller: &CurrentUser) -> ServiceResult<Order> {
        let branch_id = caller.require_branch()?.to_string();
        let now = now_millis();

        let (order, created) = self.store.transaction(|txn| {
            let existing: Vec<Order> = txn.query(
                &Query::new(Collection::Orders)
                    .filter_eq("ownerUid", caller.uid.as_str())
                    .filter_eq("status", OrderStatus::Draft.as_str())
                    .order_by("createdAt", Direction::Desc)
                    .limit(1),
            )?;
            if let Some(order) = existing.into_iter().next() {
                return Ok::<_, ServiceError>((order, false));
            }

            let branch_name = match txn.get::<Branch>(Collection::Branches, &branch_id)? {
                Some(branch) if !branch.active => {
                    return Err(AppError::new(ErrorCode::BranchInactive)
                        .with_detail("branchId", branch_id.as_str())
                        .into());
                }
                Some(branch) => branch.name,
                None => txn
                    .get::<UserProfile>(Collection::Users, &caller.uid)?
                    .and_then(|p| p.branch_name)
                    .unwrap_or_default(),
            };

            let id = uuid::Uuid::new_v4().simple().to_string();
            let order = Order::new_draft(id, caller.uid.as_str(), branch_id.as_str(), branch_name, now);
            txn.create(Collection::Orders, &order.id, &order)?;
            Ok((order, true))
        })?;

        if created {
            tracing::info!(order_id = %order.id, owner = %caller.uid, branch_id = %order.branch_id, "Draft order created");
        }
        Ok(order)
    }

    /// Upsert a line keyed by product id; `qty <= 0` removes it
    pub async fn add_item(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        input: OrderLineInput,
    ) -> ServiceResult<()> {
        validate_product_id(&input.product_id)?;
        if input.unit_price < 0 {
            return Err(AppError::with_message(ErrorCode::ValueOutOfRange, "unitPrice must not be negative").into());
        }
        let now = now_millis();

        self.store.transaction(|txn| {
            let mut order = load_owned(txn, order_id, caller)?;
            require_draft(&order)?;

            let key = child_key(order_id, &input.product_id);
            if input.qty <= 0 {
                txn.delete(Collection::OrderLines, &key)?;
            } else {
                let line = OrderLine {
                    product_id: input.product_id.clone(),
                    name: input.name.trim().to_string(),
                    brand_id: input.brand_id.trim().to_string(),
                    unit: input.unit.trim().to_string(),
                    unit_price: input.unit_price,
                    qty: input.qty,
                };
                txn.set(Collection::OrderLines, &key, &line)?;
            }
            order.updated_at = now;
            txn.set(Collection::Orders, order_id, &order)?;
            Ok(())
        })
    }

    pub async fn set_qty(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        product_id: &str,
        qty: i64,
    ) -> ServiceResult<()> {
        validate_product_id(product_id)?;
        let now = now_millis();

        self.store.transaction(|txn| {
            let mut order = load_owned(txn, order_id, caller)?;
            require_draft(&order)?;

            let key = child_key(order_id, product_id);
            if qty <= 0 {
                txn.delete(Collection::OrderLines, &key)?;
            } else {
                let mut line: OrderLine = txn
                    .get(Collection::OrderLines, &key)?
                    .ok_or_else(|| AppError::not_found(ErrorCode::OrderItemNotFound, product_id))?;
                line.qty = qty;
                txn.set(Collection::OrderLines, &key, &line)?;
            }
            order.updated_at = now;
            txn.set(Collection::Orders, order_id, &order)?;
            Ok(())
        })
    }

    /// DRAFT → PENDING with totals recomputed from the stored lines
    pub async fn place(&self, caller: &CurrentUser, order_id: &str) -> ServiceResult<Order> {
        let now = now_millis();

        let order = self.store.transaction(|txn| {
            let mut order = load_owned(txn, order_id, caller)?;
            require_draft(&order)?;

            let lines: Vec<OrderLine> = txn.children(Collection::OrderLines, order_id)?;
            if lines.is_empty() {
                return Err(AppError::new(ErrorCode::OrderEmpty)
                    .with_detail("orderId", order_id)
                    .into());
            }
            let totals = OrderTotals::compute(&lines).ok_or_else(|| {
                AppError::with_message(ErrorCode::ValueOutOfRange, "Order total overflows")
            })?;

            if let Some(branch) = txn.get::<Branch>(Collection::Branches, &order.branch_id)? {
                order.set_branch_name(branch.name);
            }
            order.total_amount = totals.total_amount;
            order.items_count = totals.items_count;
            order.placed_at = Some(now);
            order.record_transition(OrderStatus::Pending, &caller.uid, now);
            txn.set(Collection::Orders, order_id, &order)?;
            Ok::<_, ServiceError>(order)
        })?;

        tracing::info!(
            order_id = %order.id,
            branch_id = %order.branch_id,
            total_amount = order.total_amount,
            items_count = order.items_count,
            "Order placed"
        );

        self.notifier
            .dispatch(
                Target::Topic(HQ_TOPIC.into()),
                Notification::new(
                    "order_placed",
                    format!("placed:{}", order.id),
                    "New order",
                    format!("{}: {} items", order.branch_name, order.items_count),
                )
                .with("orderId", &order.id)
                .with("branchId", &order.branch_id)
                .with("totalAmount", order.total_amount.to_string()),
            )
            .await;

        Ok(order)
    }

    /// HQ status change along the lifecycle graph
    pub async fn transition(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        next_status: &str,
    ) -> ServiceResult<TransitionResult> {
        caller.require_hq()?;
        let next = OrderStatus::parse(next_status).ok_or_else(|| {
            AppError::new(ErrorCode::InvalidStatus).with_detail("status", next_status)
        })?;
        let now = now_millis();

        let (result, owner_uid) = self.store.transaction(|txn| {
            let mut order: Order = txn
                .get(Collection::Orders, order_id)?
                .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, order_id))?;

            // placement belongs to the owner; HQ only moves placed orders
            let from = order.status;
            if from == OrderStatus::Draft || !from.can_transition_to(next) {
                return Err(AppError::precondition(
                    ErrorCode::IllegalTransition,
                    format!("{from} -> {next} is not allowed"),
                )
                .with_detail("from", from.as_str())
                .with_detail("to", next.as_str())
                .into());
            }

            order.record_transition(next, &caller.uid, now);
            txn.set(Collection::Orders, order_id, &order)?;
            Ok::<_, ServiceError>((
                TransitionResult {
                    from,
                    to: next,
                    branch_id: order.branch_id.clone(),
                },
                order.owner_uid,
            ))
        })?;

        tracing::info!(
            order_id = %order_id,
            from = %result.from,
            to = %result.to,
            operator = %caller.uid,
            "Order status changed"
        );

        let notification = Notification::new(
            "order_status",
            format!("status:{order_id}:{}", result.to),
            "Order status updated",
            format!("{} → {}", result.from, result.to),
        )
        .with("orderId", order_id)
        .with("status", result.to.as_str());
        self.notifier
            .dispatch(Target::Topic(branch_topic(&result.branch_id)), notification.clone())
            .await;
        match self.store.get::<UserProfile>(Collection::Users, &owner_uid) {
            Ok(Some(profile)) => {
                self.notifier
                    .dispatch_devices(&profile.device_tokens, notification)
                    .await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(owner = %owner_uid, error = %e, "Could not load owner device tokens"),
        }

        Ok(result)
    }

    /// Header and lines; owner or HQ
    pub async fn get(&self, caller: &CurrentUser, order_id: &str) -> ServiceResult<OrderDetail> {
        let order: Order = self
            .store
            .get(Collection::Orders, order_id)?
            .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, order_id))?;
        if !caller.is_hq() && order.owner_uid != caller.uid {
            return Err(AppError::new(ErrorCode::NotOrderOwner)
                .with_detail("orderId", order_id)
                .into());
        }
        let lines = self.store.children(Collection::OrderLines, order_id)?;
        Ok(OrderDetail { order, lines })
    }

    /// Caller's own orders, newest first
    pub async fn list_mine(&self, caller: &CurrentUser) -> ServiceResult<Vec<Order>> {
        let query = Query::new(Collection::Orders)
            .filter_eq("ownerUid", caller.uid.as_str())
            .order_by("createdAt", Direction::Desc);
        Ok(self.store.query(&query)?)
    }

    /// HQ search by status and branch-name prefix, newest first
    pub async fn hq_list(&self, caller: &CurrentUser, filter: OrderFilter) -> ServiceResult<Vec<Order>> {
        caller.require_hq()?;

        let mut query = Query::new(Collection::Orders);
        if let Some(raw) = filter.status.as_deref().filter(|s| !s.trim().is_empty()) {
            let status = OrderStatus::parse(raw)
                .ok_or_else(|| AppError::new(ErrorCode::InvalidStatus).with_detail("status", raw))?;
            query = query.filter_eq("status", status.as_str());
        }
        if let Some(prefix) = filter.branch_prefix.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            query = query.filter_prefix("branchNameLower", &prefix.to_lowercase());
        }
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        query = query.order_by("createdAt", Direction::Desc).limit(limit);

        Ok(self.store.query(&query)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Harness;
    use shared::error::ErrorKind;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn line(product_id: &str, unit_price: i64, qty: i64) -> OrderLineInput {
        OrderLineInput {
            product_id: product_id.into(),
            name: product_id.into(),
            brand_id: "B1".into(),
            unit: "ea".into(),
            unit_price,
            qty,
        }
    }

    async fn placed_order(h: &Harness, owner: &CurrentUser) -> Order {
        let draft = h.orders.create_draft(owner).await.unwrap();
        h.orders.add_item(owner, &draft.id, line("P1", 1000, 3)).await.unwrap();
        h.orders.add_item(owner, &draft.id, line("P2", 500, 2)).await.unwrap();
        h.orders.place(owner, &draft.id).await.unwrap()
    }

    fn kind(err: ServiceError) -> ErrorKind {
        AppError::from(err).kind()
    }

    #[tokio::test]
    async fn test_create_draft_is_get_or_create() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");

        let first = h.orders.create_draft(&owner).await.unwrap();
        let second = h.orders.create_draft(&owner).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.branch_name, "Songdo");
        assert_eq!(first.branch_name_lower, "songdo");
        assert_eq!(first.status, OrderStatus::Draft);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_draft_yields_one_order() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);

        for round in 0..50 {
            let owner = h.branch_user(&format!("u{round}"), "BR_1");
            let barrier = Arc::new(Barrier::new(2));
            let racers: Vec<_> = (0..2)
                .map(|_| {
                    let orders = h.orders.clone();
                    let owner = owner.clone();
                    let barrier = barrier.clone();
                    tokio::spawn(async move {
                        barrier.wait().await;
                        orders.create_draft(&owner).await
                    })
                })
                .collect();

            let mut ids = Vec::new();
            for racer in racers {
                ids.push(racer.await.unwrap().unwrap().id);
            }
            assert_eq!(ids[0], ids[1], "round {round}");
            assert_eq!(h.orders.list_mine(&owner).await.unwrap().len(), 1, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_create_draft_rejects_inactive_branch_and_non_branch_roles() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", false);
        let owner = h.branch_user("u1", "BR_1");
        let err: AppError = h.orders.create_draft(&owner).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::BranchInactive);

        let err = h.orders.create_draft(&h.hq()).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_place_recomputes_totals() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");

        let order = placed_order(&h, &owner).await;
        assert_eq!(order.total_amount, 4000);
        assert_eq!(order.items_count, 5);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.placed_at.is_some());
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].from, OrderStatus::Draft);
        assert_eq!(order.status_history[0].to, OrderStatus::Pending);
        assert_eq!(order.status_history[0].by, "u1");
        assert_eq!(h.transport.count_event(&format!("placed:{}", order.id)), 1);
    }

    #[tokio::test]
    async fn test_line_editing() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let draft = h.orders.create_draft(&owner).await.unwrap();

        h.orders.add_item(&owner, &draft.id, line("P1", 1000, 3)).await.unwrap();
        h.orders.add_item(&owner, &draft.id, line("P1", 1200, 1)).await.unwrap();
        h.orders.add_item(&owner, &draft.id, line("P2", 500, 2)).await.unwrap();
        h.orders.set_qty(&owner, &draft.id, "P2", 0).await.unwrap();

        let err = h.orders.set_qty(&owner, &draft.id, "P9", 2).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);

        let detail = h.orders.get(&owner, &draft.id).await.unwrap();
        assert_eq!(detail.lines.len(), 1);
        assert_eq!(detail.lines[0].unit_price, 1200);
        assert_eq!(detail.lines[0].qty, 1);

        h.orders.set_qty(&owner, &draft.id, "P1", 4).await.unwrap();
        let placed = h.orders.place(&owner, &draft.id).await.unwrap();
        assert_eq!(placed.total_amount, 4800);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_touch_draft() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let other = h.branch_user("u2", "BR_1");
        let draft = h.orders.create_draft(&owner).await.unwrap();

        let err: AppError = h
            .orders
            .add_item(&other, &draft.id, line("P1", 1, 1))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::NotOrderOwner);
        assert!(h.orders.get(&other, &draft.id).await.is_err());
        assert!(h.orders.get(&h.hq(), &draft.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_place_empty_and_twice() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let draft = h.orders.create_draft(&owner).await.unwrap();

        let err: AppError = h.orders.place(&owner, &draft.id).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::OrderEmpty);
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

        h.orders.add_item(&owner, &draft.id, line("P1", 10, 1)).await.unwrap();
        h.orders.place(&owner, &draft.id).await.unwrap();
        let err: AppError = h.orders.place(&owner, &draft.id).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::OrderNotDraft);

        let err: AppError = h
            .orders
            .add_item(&owner, &draft.id, line("P2", 10, 1))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderNotDraft);
    }

    #[tokio::test]
    async fn test_place_overflow_is_invalid_argument() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let draft = h.orders.create_draft(&owner).await.unwrap();
        h.orders.add_item(&owner, &draft.id, line("P1", i64::MAX, 2)).await.unwrap();

        let err = h.orders.place(&owner, &draft.id).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::InvalidArgument);
        let detail = h.orders.get(&owner, &draft.id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Draft);
    }

    #[tokio::test]
    async fn test_place_picks_up_renamed_branch() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let draft = h.orders.create_draft(&owner).await.unwrap();
        h.orders.add_item(&owner, &draft.id, line("P1", 10, 1)).await.unwrap();
        h.seed_branch("BR_1", "Songdo Central", true);

        let placed = h.orders.place(&owner, &draft.id).await.unwrap();
        assert_eq!(placed.branch_name, "Songdo Central");
        assert_eq!(placed.branch_name_lower, "songdo central");
    }

    #[tokio::test]
    async fn test_full_lifecycle_and_illegal_edges() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let hq = h.hq();
        let order = placed_order(&h, &owner).await;

        let err: AppError = h
            .orders
            .transition(&hq, &order.id, "SHIPPED")
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::IllegalTransition);
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        let stored = h.orders.get(&hq, &order.id).await.unwrap().order;
        assert_eq!(stored.status, OrderStatus::Pending);

        for (next, from) in [("APPROVED", OrderStatus::Pending), ("shipped", OrderStatus::Approved), ("DELIVERED", OrderStatus::Shipped)] {
            let result = h.orders.transition(&hq, &order.id, next).await.unwrap();
            assert_eq!(result.from, from);
            assert_eq!(result.branch_id, "BR_1");
        }

        let stored = h.orders.get(&hq, &order.id).await.unwrap().order;
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert_eq!(stored.status_history.len(), 4);
        assert_eq!(stored.status_history[3].by, hq.uid);

        let err = h.orders.transition(&hq, &order.id, "REJECTED").await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_transition_input_and_role_checks() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let hq = h.hq();
        let order = placed_order(&h, &owner).await;

        let err = h.orders.transition(&owner, &order.id, "APPROVED").await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::PermissionDenied);

        let err = h.orders.transition(&hq, &order.id, "LOST").await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::InvalidArgument);

        let err = h.orders.transition(&hq, "missing", "APPROVED").await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);

        // legacy alias maps onto PENDING, which is not reachable from PENDING
        let err = h.orders.transition(&hq, &order.id, "PLACED").await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::FailedPrecondition);

        let draft = h.orders.create_draft(&owner).await.unwrap();
        let err = h.orders.transition(&hq, &draft.id, "PENDING").await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::FailedPrecondition);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_one_winner() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let hq = h.hq();

        for round in 0..50 {
            let owner = h.branch_user(&format!("u{round}"), "BR_1");
            let order = placed_order(&h, &owner).await;
            let barrier = Arc::new(Barrier::new(2));

            let racers: Vec<_> = ["APPROVED", "REJECTED"]
                .into_iter()
                .map(|next| {
                    let orders = h.orders.clone();
                    let hq = hq.clone();
                    let id = order.id.clone();
                    let barrier = barrier.clone();
                    tokio::spawn(async move {
                        barrier.wait().await;
                        orders.transition(&hq, &id, next).await
                    })
                })
                .collect();

            let mut results = Vec::new();
            for racer in racers {
                results.push(racer.await.unwrap());
            }
            let b = results.pop().unwrap();
            let a = results.pop().unwrap();

            assert!(a.is_ok() != b.is_ok(), "round {round}: exactly one transition must win");
            let winner = if a.is_ok() { OrderStatus::Approved } else { OrderStatus::Rejected };
            let loser = if a.is_ok() { b } else { a };
            assert_eq!(kind(loser.unwrap_err()), ErrorKind::FailedPrecondition);

            let stored = h.orders.get(&hq, &order.id).await.unwrap().order;
            assert_eq!(stored.status, winner, "round {round}");
            assert_eq!(stored.status_history.len(), 2, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_transition_notifies_branch_and_devices() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        h.seed_device_token("u1", "device-1");
        let order = placed_order(&h, &owner).await;

        h.orders.transition(&h.hq(), &order.id, "APPROVED").await.unwrap();

        let event = format!("status:{}:APPROVED", order.id);
        let targets: Vec<Target> = h
            .transport
            .sent()
            .into_iter()
            .filter(|(_, n)| n.event_id() == event)
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            targets,
            vec![Target::Topic("branch_BR_1".into()), Target::Device("device-1".into())]
        );
    }

    #[tokio::test]
    async fn test_hq_list_prefix_and_status() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        h.seed_branch("BR_2", "Gangnam", true);
        let songdo = h.branch_user("u1", "BR_1");
        let gangnam = h.branch_user("u2", "BR_2");
        let hq = h.hq();
        let a = placed_order(&h, &songdo).await;
        placed_order(&h, &gangnam).await;
        h.orders.create_draft(&gangnam).await.unwrap();

        let found = h
            .orders
            .hq_list(&hq, OrderFilter {
                branch_prefix: Some("SONG".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);

        let pending = h
            .orders
            .hq_list(&hq, OrderFilter {
                status: Some("PLACED".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let limited = h
            .orders
            .hq_list(&hq, OrderFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        assert!(h.orders.hq_list(&songdo, OrderFilter::default()).await.is_err());
    }
}
