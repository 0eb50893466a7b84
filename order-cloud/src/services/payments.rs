//! Payment reconciliation
//!
//! Two inputs feed the same apply step: the gateway webhook and the
//! client-initiated verify call. Apply runs inside one write transaction
//! and enforces precedence:
//!
//! - PAID is terminal; nothing moves an order out of it
//! - FAILED / CANCELED can be overridden only by a different transaction id
//! - a redelivery of the outcome already stored changes nothing and does not
//!   notify again

use std::sync::Arc;

use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, OrderStatus, PaymentStatus};
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::webhook::{WebhookForm, WebhookNotice};
use crate::gateway::{GATEWAY_NAME, GatewayConfig, PaymentGateway, TransactionState, signature};
use crate::notify::{HQ_TOPIC, Notification, Notifier, Target};
use crate::store::{Collection, DocumentStore};

/// Outcome to record against an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid { tid: String },
    Failed { tid: String, message: String },
    Canceled { tid: String, message: Option<String> },
}

impl PaymentOutcome {
    fn tid(&self) -> &str {
        match self {
            Self::Paid { tid } | Self::Failed { tid, .. } | Self::Canceled { tid, .. } => tid,
        }
    }

    fn status(&self) -> PaymentStatus {
        match self {
            Self::Paid { .. } => PaymentStatus::Paid,
            Self::Failed { .. } => PaymentStatus::Failed,
            Self::Canceled { .. } => PaymentStatus::Canceled,
        }
    }
}

/// What apply did
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResult {
    pub order: Order,
    pub changed: bool,
}

/// Signed parameters for the client's checkout screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutParams {
    pub gateway: String,
    pub mid: String,
    pub order_id: String,
    pub amount: i64,
    pub timestamp: i64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub ok: bool,
    pub status: Option<PaymentStatus>,
    pub amount: i64,
}

/// How a webhook delivery was handled; the HTTP answer is `OK` either way
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    Ignored(String),
    Applied { status: PaymentStatus, changed: bool },
}

#[derive(Clone)]
pub struct PaymentService {
    store: DocumentStore,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Notifier,
    config: Arc<GatewayConfig>,
}

/// Whether `outcome` may overwrite what the order already holds
fn should_apply(order: &Order, outcome: &PaymentOutcome) -> bool {
    let same_tid = order.payment_tid.as_deref() == Some(outcome.tid());
    match order.payment_status {
        Some(PaymentStatus::Paid) => false,
        Some(PaymentStatus::Failed | PaymentStatus::Canceled) => !same_tid,
        Some(PaymentStatus::Ready) | None => true,
    }
}

impl PaymentService {
    pub fn new(
        store: DocumentStore,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            config: Arc::new(config),
        }
    }

    /// Mark READY and hand back signed checkout parameters
    ///
    /// A FAILED or CANCELED order keeps its status and tid on retry, so only
    /// a fresh transaction id can still move it to PAID.
    pub async fn prepare(&self, caller: &CurrentUser, order_id: &str) -> ServiceResult<CheckoutParams> {
        let now = now_millis();
        let order = self.store.transaction(|txn| {
            let mut order: Order = txn
                .get(Collection::Orders, order_id)?
                .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, order_id))?;
            if order.owner_uid != caller.uid {
                return Err(AppError::new(ErrorCode::NotOrderOwner)
                    .with_detail("orderId", order_id)
                    .into());
            }
            if order.status == OrderStatus::Draft {
                return Err(AppError::new(ErrorCode::OrderNotPlaced)
                    .with_detail("orderId", order_id)
                    .into());
            }
            if order.payment_status == Some(PaymentStatus::Paid) {
                return Err(AppError::new(ErrorCode::OrderAlreadyPaid)
                    .with_detail("orderId", order_id)
                    .into());
            }
            if order.payment_status.is_none() {
                order.payment_status = Some(PaymentStatus::Ready);
            }
            order.payment_gateway = Some(GATEWAY_NAME.to_string());
            order.updated_at = now;
            txn.set(Collection::Orders, order_id, &order)?;
            Ok::<_, ServiceError>(order)
        })?;

        let payload = signature::checkout_payload(&order.id, order.total_amount, now);
        let sig = signature::sign(&self.config.sign_key, &payload).map_err(AppError::internal)?;

        tracing::info!(order_id = %order.id, amount = order.total_amount, "Payment prepared");

        Ok(CheckoutParams {
            gateway: GATEWAY_NAME.to_string(),
            mid: self.config.mid.clone(),
            order_id: order.id,
            amount: order.total_amount,
            timestamp: now,
            signature: sig,
        })
    }

    /// Record `outcome` under the precedence rules and notify HQ on a new PAID
    pub async fn apply(&self, order_id: &str, outcome: PaymentOutcome) -> ServiceResult<ApplyResult> {
        let now = now_millis();
        let result = self.store.transaction(|txn| {
            let mut order: Order = txn
                .get(Collection::Orders, order_id)?
                .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, order_id))?;

            if !should_apply(&order, &outcome) {
                return Ok::<_, ServiceError>(ApplyResult {
                    order,
                    changed: false,
                });
            }

            order.payment_status = Some(outcome.status());
            order.payment_tid = Some(outcome.tid().to_string());
            order.payment_gateway = Some(GATEWAY_NAME.to_string());
            order.updated_at = now;
            match &outcome {
                PaymentOutcome::Paid { .. } => {
                    order.paid_at = Some(now);
                    order.payment_message = None;
                }
                PaymentOutcome::Failed { message, .. } => {
                    order.payment_message = Some(message.clone());
                }
                PaymentOutcome::Canceled { message, .. } => {
                    order.payment_message = message.clone();
                }
            }
            txn.set(Collection::Orders, order_id, &order)?;
            Ok(ApplyResult {
                order,
                changed: true,
            })
        })?;

        if result.changed {
            tracing::info!(
                order_id = %order_id,
                tid = %outcome.tid(),
                status = %outcome.status(),
                "Payment state updated"
            );
        } else {
            tracing::info!(
                order_id = %order_id,
                tid = %outcome.tid(),
                stored = ?result.order.payment_status,
                "Payment outcome ignored"
            );
        }

        if result.changed && matches!(outcome, PaymentOutcome::Paid { .. }) {
            let order = &result.order;
            self.notifier
                .dispatch(
                    Target::Topic(HQ_TOPIC.into()),
                    Notification::new(
                        "payment_paid",
                        format!("paid:{}:{}", order.id, outcome.tid()),
                        "Payment received",
                        format!("{}: {}", order.branch_name, order.total_amount),
                    )
                    .with("orderId", &order.id)
                    .with("branchId", &order.branch_id)
                    .with("tid", outcome.tid()),
                )
                .await;
        }

        Ok(result)
    }

    /// Gateway webhook; never fails, only reports what it did
    pub async fn handle_webhook(&self, form: WebhookForm) -> WebhookDisposition {
        let notice = match form.into_notice(&self.config.webhook_secret, &self.config.mid) {
            Ok(notice) => notice,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Webhook rejected");
                return WebhookDisposition::Ignored(reason.to_string());
            }
        };

        let order: Order = match self.store.get(Collection::Orders, &notice.order_id) {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::warn!(order_id = %notice.order_id, tid = %notice.tid, "Webhook for unknown order");
                return WebhookDisposition::Ignored("unknown order".into());
            }
            Err(e) => {
                tracing::error!(order_id = %notice.order_id, error = %e, "Webhook order lookup failed");
                return WebhookDisposition::Ignored("storage error".into());
            }
        };

        let outcome = webhook_outcome(&notice, &order);
        match self.apply(&notice.order_id, outcome).await {
            Ok(result) => WebhookDisposition::Applied {
                status: result.order.payment_status.unwrap_or(PaymentStatus::Ready),
                changed: result.changed,
            },
            Err(e) => {
                let err = AppError::from(e);
                tracing::error!(order_id = %notice.order_id, code = %err.code, error = %err, "Webhook apply failed");
                WebhookDisposition::Ignored(err.message)
            }
        }
    }

    /// Ask the gateway about `tid` and apply what it says
    ///
    /// Gateway timeouts and transport errors surface as `Unavailable` and
    /// leave the order untouched.
    pub async fn verify(
        &self,
        _caller: &CurrentUser,
        order_id: &str,
        transaction_id: &str,
    ) -> ServiceResult<VerifyResult> {
        let order_id = order_id.trim();
        let tid = transaction_id.trim();
        if order_id.is_empty() {
            return Err(AppError::required("orderId").into());
        }
        if tid.is_empty() {
            return Err(AppError::required("transactionId").into());
        }

        let order: Order = self
            .store
            .get(Collection::Orders, order_id)?
            .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, order_id))?;

        let verified = self
            .gateway
            .verify_by_transaction_id(tid)
            .await
            .map_err(AppError::from)?;

        let order_matches = verified.order_id.as_deref().is_none_or(|oid| oid == order_id);
        let amount_matches = verified.amount == order.total_amount;

        let outcome = match verified.state {
            TransactionState::Paid if order_matches && amount_matches => PaymentOutcome::Paid {
                tid: tid.to_string(),
            },
            TransactionState::Paid => {
                tracing::warn!(
                    order_id = %order_id,
                    tid = %tid,
                    gateway_amount = verified.amount,
                    order_amount = order.total_amount,
                    gateway_order = ?verified.order_id,
                    "Verified payment does not match order"
                );
                PaymentOutcome::Failed {
                    tid: tid.to_string(),
                    message: if order_matches {
                        ErrorCode::PaymentAmountMismatch.message().to_string()
                    } else {
                        "Transaction belongs to another order".to_string()
                    },
                }
            }
            TransactionState::Canceled => PaymentOutcome::Canceled {
                tid: tid.to_string(),
                message: verified.message.clone(),
            },
            TransactionState::Failed => PaymentOutcome::Failed {
                tid: tid.to_string(),
                message: verified
                    .message
                    .clone()
                    .unwrap_or_else(|| ErrorCode::PaymentVerificationFailed.message().to_string()),
            },
        };

        let applied_paid = matches!(outcome, PaymentOutcome::Paid { .. });
        let result = self.apply(order_id, outcome).await?;
        let stored = result.order.payment_status;

        Ok(VerifyResult {
            ok: applied_paid && stored == Some(PaymentStatus::Paid),
            status: stored,
            amount: verified.amount,
        })
    }
}

/// Approved with the exact total → PAID; anything else → FAILED
fn webhook_outcome(notice: &WebhookNotice, order: &Order) -> PaymentOutcome {
    let tid = notice.tid.clone();
    if notice.is_approved() && notice.amount == Some(order.total_amount) {
        return PaymentOutcome::Paid { tid };
    }
    let message = if notice.is_approved() {
        tracing::warn!(
            order_id = %order.id,
            tid = %notice.tid,
            gateway_amount = ?notice.amount,
            order_amount = order.total_amount,
            "Webhook amount does not match order"
        );
        ErrorCode::PaymentAmountMismatch.message().to_string()
    } else {
        notice
            .message
            .clone()
            .unwrap_or_else(|| format!("Gateway status {}", notice.status))
    };
    PaymentOutcome::Failed { tid, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::VerifiedTransaction;
    use crate::services::test_support::{Harness, signed_webhook};
    use shared::error::ErrorKind;

    async fn placed(h: &Harness) -> (CurrentUser, Order) {
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let order = h.place_order(&owner, &[("P1", 1000, 3), ("P2", 500, 2)]).await;
        (owner, order)
    }

    fn stored(h: &Harness, id: &str) -> Order {
        h.store.get(Collection::Orders, id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_webhook_paid_once() {
        let h = Harness::new();
        let (_, order) = placed(&h).await;

        let form = signed_webhook("00", "T1", &order.id, "4000");
        let first = h.payments.handle_webhook(form.clone()).await;
        assert_eq!(first, WebhookDisposition::Applied { status: PaymentStatus::Paid, changed: true });
        let after_first = stored(&h, &order.id);

        let second = h.payments.handle_webhook(form).await;
        assert_eq!(second, WebhookDisposition::Applied { status: PaymentStatus::Paid, changed: false });
        assert_eq!(stored(&h, &order.id), after_first);

        assert_eq!(after_first.payment_tid.as_deref(), Some("T1"));
        assert!(after_first.paid_at.is_some());
        assert_eq!(h.transport.count_event(&format!("paid:{}:T1", order.id)), 1);
    }

    #[tokio::test]
    async fn test_webhook_amount_mismatch_fails() {
        let h = Harness::new();
        let (_, order) = placed(&h).await;

        h.payments.handle_webhook(signed_webhook("00", "T1", &order.id, "3999")).await;
        let o = stored(&h, &order.id);
        assert_eq!(o.payment_status, Some(PaymentStatus::Failed));
        assert!(o.paid_at.is_none());
        assert_eq!(h.transport.count_event(&format!("paid:{}:T1", order.id)), 0);
    }

    #[tokio::test]
    async fn test_webhook_noops() {
        let h = Harness::new();
        let (_, order) = placed(&h).await;
        let before = stored(&h, &order.id);

        let mut bad_sig = signed_webhook("00", "T1", &order.id, "4000");
        bad_sig.sign = Some("00".repeat(32));
        let unknown = signed_webhook("00", "T1", "nope", "4000");
        let mut missing = signed_webhook("00", "T1", &order.id, "4000");
        missing.tid = None;

        for form in [bad_sig, unknown, missing] {
            assert!(matches!(
                h.payments.handle_webhook(form).await,
                WebhookDisposition::Ignored(_)
            ));
        }
        assert_eq!(stored(&h, &order.id), before);
    }

    #[tokio::test]
    async fn test_paid_is_terminal_and_failed_needs_new_tid() {
        let h = Harness::new();
        let (_, order) = placed(&h).await;

        h.payments.handle_webhook(signed_webhook("R1", "T1", &order.id, "4000")).await;
        assert_eq!(stored(&h, &order.id).payment_status, Some(PaymentStatus::Failed));

        // same tid cannot flip FAILED
        h.payments.handle_webhook(signed_webhook("00", "T1", &order.id, "4000")).await;
        assert_eq!(stored(&h, &order.id).payment_status, Some(PaymentStatus::Failed));

        // a fresh tid can
        h.payments.handle_webhook(signed_webhook("00", "T2", &order.id, "4000")).await;
        let o = stored(&h, &order.id);
        assert_eq!(o.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(o.payment_tid.as_deref(), Some("T2"));

        // nothing leaves PAID
        h.payments.handle_webhook(signed_webhook("R1", "T3", &order.id, "4000")).await;
        let o = stored(&h, &order.id);
        assert_eq!(o.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(o.payment_tid.as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn test_verify_paid() {
        let h = Harness::new();
        let (owner, order) = placed(&h).await;
        h.gateway.set(VerifiedTransaction {
            tid: "T1".into(),
            order_id: Some(order.id.clone()),
            amount: 4000,
            state: TransactionState::Paid,
            message: None,
        });

        let result = h.payments.verify(&owner, &order.id, "T1").await.unwrap();
        assert_eq!(result, VerifyResult { ok: true, status: Some(PaymentStatus::Paid), amount: 4000 });
        assert_eq!(h.transport.count_event(&format!("paid:{}:T1", order.id)), 1);

        // webhook racing in afterwards is a no-op
        h.payments.handle_webhook(signed_webhook("00", "T1", &order.id, "4000")).await;
        assert_eq!(h.transport.count_event(&format!("paid:{}:T1", order.id)), 1);
    }

    #[tokio::test]
    async fn test_verify_amount_mismatch_never_paid() {
        let h = Harness::new();
        let (owner, order) = placed(&h).await;
        h.gateway.set(VerifiedTransaction {
            tid: "T1".into(),
            order_id: None,
            amount: 100,
            state: TransactionState::Paid,
            message: None,
        });

        let result = h.payments.verify(&owner, &order.id, "T1").await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.status, Some(PaymentStatus::Failed));
        assert_eq!(stored(&h, &order.id).payment_status, Some(PaymentStatus::Failed));
    }

    #[tokio::test]
    async fn test_verify_foreign_order_and_canceled() {
        let h = Harness::new();
        let (owner, order) = placed(&h).await;
        h.gateway.set(VerifiedTransaction {
            tid: "T1".into(),
            order_id: Some("other".into()),
            amount: 4000,
            state: TransactionState::Paid,
            message: None,
        });
        let result = h.payments.verify(&owner, &order.id, "T1").await.unwrap();
        assert!(!result.ok);

        h.gateway.set(VerifiedTransaction {
            tid: "T2".into(),
            order_id: None,
            amount: 4000,
            state: TransactionState::Canceled,
            message: Some("user canceled".into()),
        });
        let result = h.payments.verify(&owner, &order.id, "T2").await.unwrap();
        assert_eq!(result.status, Some(PaymentStatus::Canceled));
        assert_eq!(stored(&h, &order.id).payment_message.as_deref(), Some("user canceled"));
    }

    #[tokio::test]
    async fn test_verify_timeout_leaves_order_alone() {
        let h = Harness::new();
        let (owner, order) = placed(&h).await;
        h.gateway.set_timeout("T1");
        let before = stored(&h, &order.id);

        let err: AppError = h.payments.verify(&owner, &order.id, "T1").await.unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(stored(&h, &order.id), before);

        let err: AppError = h.payments.verify(&owner, &order.id, "T-unknown").await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::PaymentVerificationFailed);
        assert_eq!(stored(&h, &order.id), before);
    }

    #[tokio::test]
    async fn test_prepare() {
        let h = Harness::new();
        let (owner, order) = placed(&h).await;

        let params = h.payments.prepare(&owner, &order.id).await.unwrap();
        assert_eq!(params.amount, 4000);
        let payload = signature::checkout_payload(&order.id, 4000, params.timestamp);
        assert!(signature::verify("sign-key", &payload, &params.signature).is_ok());
        assert_eq!(stored(&h, &order.id).payment_status, Some(PaymentStatus::Ready));

        let other = h.branch_user("u2", "BR_1");
        let err: AppError = h.payments.prepare(&other, &order.id).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::NotOrderOwner);

        h.payments.handle_webhook(signed_webhook("00", "T1", &order.id, "4000")).await;
        let err: AppError = h.payments.prepare(&owner, &order.id).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::OrderAlreadyPaid);
    }

    #[tokio::test]
    async fn test_retry_after_failure_keeps_failed_tid_blocked() {
        let h = Harness::new();
        let (owner, order) = placed(&h).await;

        h.payments.handle_webhook(signed_webhook("R1", "T1", &order.id, "4000")).await;
        assert_eq!(stored(&h, &order.id).payment_status, Some(PaymentStatus::Failed));

        h.payments.prepare(&owner, &order.id).await.unwrap();
        let o = stored(&h, &order.id);
        assert_eq!(o.payment_status, Some(PaymentStatus::Failed));
        assert_eq!(o.payment_tid.as_deref(), Some("T1"));

        // a late approval for the failed tid still cannot flip the order
        let late = h.payments.handle_webhook(signed_webhook("00", "T1", &order.id, "4000")).await;
        assert_eq!(late, WebhookDisposition::Applied { status: PaymentStatus::Failed, changed: false });
        assert_eq!(stored(&h, &order.id).payment_status, Some(PaymentStatus::Failed));
        assert_eq!(h.transport.count_event(&format!("paid:{}:T1", order.id)), 0);

        // the retry's own transaction goes through
        h.payments.handle_webhook(signed_webhook("00", "T2", &order.id, "4000")).await;
        assert_eq!(stored(&h, &order.id).payment_status, Some(PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_prepare_requires_placed_order() {
        let h = Harness::new();
        h.seed_branch("BR_1", "Songdo", true);
        let owner = h.branch_user("u1", "BR_1");
        let draft = h.orders.create_draft(&owner).await.unwrap();
        let err: AppError = h.payments.prepare(&owner, &draft.id).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::OrderNotPlaced);
    }
}
