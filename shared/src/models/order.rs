//! Order Model
//!
//! ```text
//! DRAFT --place--> PENDING --approve--> APPROVED --ship--> SHIPPED --deliver--> DELIVERED
//!                     \--reject--> REJECTED
//! ```
//!
//! `PLACED` is accepted on input as a legacy name for `PENDING` and is never
//! written back.

use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Mutable pre-placement phase
    #[default]
    Draft,
    #[serde(alias = "PLACED")]
    Pending,
    Approved,
    Rejected,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Draft,
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Shipped,
        Self::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
        }
    }

    /// Parse a status name, accepting the legacy `PLACED` alias
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "PENDING" | "PLACED" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "SHIPPED" => Some(Self::Shipped),
            "DELIVERED" => Some(Self::Delivered),
            _ => None,
        }
    }

    /// The single legal edge table
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Pending)
                | (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Delivered)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state, written only by the reconciliation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Ready,
    Paid,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit entry per status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub at: i64,
    pub by: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Order header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub owner_uid: String,
    pub branch_id: String,
    #[serde(default)]
    pub branch_name: String,
    /// Lowercase shadow of `branch_name` for prefix search
    #[serde(default)]
    pub branch_name_lower: String,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_at: Option<i64>,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Smallest currency unit; authoritative only once placed
    #[serde(default)]
    pub total_amount: i64,
    #[serde(default)]
    pub items_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_tid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_message: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
}

impl Order {
    pub fn new_draft(
        id: impl Into<String>,
        owner_uid: impl Into<String>,
        branch_id: impl Into<String>,
        branch_name: impl Into<String>,
        now: i64,
    ) -> Self {
        let mut order = Self {
            id: id.into(),
            owner_uid: owner_uid.into(),
            branch_id: branch_id.into(),
            branch_name: String::new(),
            branch_name_lower: String::new(),
            status: OrderStatus::Draft,
            placed_at: None,
            created_at: now,
            updated_at: now,
            total_amount: 0,
            items_count: 0,
            payment_gateway: None,
            payment_tid: None,
            payment_status: None,
            paid_at: None,
            payment_message: None,
            status_history: Vec::new(),
        };
        order.set_branch_name(branch_name);
        order
    }

    /// Set the branch name together with its lowercase shadow
    pub fn set_branch_name(&mut self, name: impl Into<String>) {
        self.branch_name = name.into();
        self.branch_name_lower = self.branch_name.to_lowercase();
    }

    /// Move to `to` and append the audit entry; the caller validates the edge
    pub fn record_transition(&mut self, to: OrderStatus, by: &str, at: i64) -> StatusChange {
        let change = StatusChange {
            at,
            by: by.to_string(),
            from: self.status,
            to,
        };
        self.status = to;
        self.updated_at = at;
        self.status_history.push(change.clone());
        change
    }
}

/// Line item, keyed by product id under its order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
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

/// Totals frozen at placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub total_amount: i64,
    pub items_count: i64,
}

impl OrderTotals {
    /// Σ(unitPrice × qty) and Σqty; `None` on overflow
    pub fn compute(lines: &[OrderLine]) -> Option<Self> {
        lines.iter().try_fold(
            OrderTotals {
                total_amount: 0,
                items_count: 0,
            },
            |acc, line| {
                let line_total = line.unit_price.checked_mul(line.qty)?;
                Some(OrderTotals {
                    total_amount: acc.total_amount.checked_add(line_total)?,
                    items_count: acc.items_count.checked_add(line.qty)?,
                })
            },
        )
    }
}
