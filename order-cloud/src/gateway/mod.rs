//! Payment gateway client
//!
//! - [`PaymentGateway`]: verification-by-transaction-id, the only call the
//!   reconciliation pipeline makes against the processor
//! - [`HttpGateway`]: reqwest implementation with a bounded timeout
//! - [`webhook`]: inbound notice parsing and signature checks
//! - [`signature`]: HMAC-SHA256 helpers shared by both directions

pub mod client;
pub mod signature;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

pub use client::HttpGateway;

/// Gateway name recorded on orders
pub const GATEWAY_NAME: &str = "inicis";

/// Outcome the gateway reports for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Paid,
    Canceled,
    Failed,
}

impl TransactionState {
    /// Map the processor's free-form status string
    pub fn from_gateway(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "00" | "PAID" | "DONE" | "APPROVED" => Self::Paid,
            "CANCELED" | "CANCELLED" | "CANCEL" => Self::Canceled,
            _ => Self::Failed,
        }
    }
}

/// Gateway's view of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    pub tid: String,
    /// Present when the gateway reports which order the payment was for
    pub order_id: Option<String>,
    pub amount: i64,
    pub state: TransactionState,
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway returned HTTP {0}")]
    Status(u16),

    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("unusable gateway response: {0}")]
    BadResponse(String),

    #[error("gateway configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::BadResponse(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout => AppError::new(ErrorCode::GatewayTimeout),
            GatewayError::UnknownTransaction(tid) => {
                AppError::with_message(ErrorCode::PaymentVerificationFailed, "Unknown transaction")
                    .with_detail("transactionId", tid)
            }
            GatewayError::BadResponse(msg) => {
                tracing::warn!(error = %msg, "Gateway response rejected");
                AppError::new(ErrorCode::GatewayBadResponse)
            }
            GatewayError::Config(msg) => {
                tracing::error!(error = %msg, "Gateway misconfigured");
                AppError::new(ErrorCode::ConfigError)
            }
            other => {
                tracing::warn!(error = %other, "Gateway unavailable");
                AppError::new(ErrorCode::GatewayUnavailable)
            }
        }
    }
}

/// External payment processor
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask the processor what actually happened to `tid`
    async fn verify_by_transaction_id(&self, tid: &str) -> Result<VerifiedTransaction, GatewayError>;
}

/// Merchant credentials and endpoint
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub mid: String,
    pub api_key: String,
    pub sign_key: String,
    pub webhook_secret: String,
    pub base_url: String,
    pub timeout_secs: u64,
}
