//! Gateway webhook payload
//!
//! The gateway posts a form-encoded notice. Every field is optional on the
//! wire; [`WebhookForm::into_notice`] decides whether the notice is usable.

use serde::Deserialize;

use super::signature;

/// Result code the gateway uses for an approved payment
pub const APPROVED_STATUS: &str = "00";

/// Raw form fields as delivered
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "P_STATUS")]
    pub status: Option<String>,
    #[serde(rename = "P_TID")]
    pub tid: Option<String>,
    #[serde(rename = "P_OID")]
    pub order_id: Option<String>,
    #[serde(rename = "P_AMT")]
    pub amount: Option<String>,
    #[serde(rename = "P_RMESG1")]
    pub message: Option<String>,
    #[serde(rename = "P_MID")]
    pub mid: Option<String>,
    #[serde(rename = "P_SIGN")]
    pub sign: Option<String>,
}

/// Why a notice was dropped without touching any order
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookReject {
    #[error("missing order id or transaction id")]
    MissingIds,
    #[error("missing signature")]
    MissingSignature,
    #[error("signature check failed: {0}")]
    BadSignature(&'static str),
    #[error("merchant id mismatch: {0}")]
    ForeignMerchant(String),
}

/// A signature-checked gateway notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotice {
    pub status: String,
    pub tid: String,
    pub order_id: String,
    /// `None` when the amount field is absent or not an integer
    pub amount: Option<i64>,
    pub message: Option<String>,
}

impl WebhookNotice {
    pub fn is_approved(&self) -> bool {
        self.status == APPROVED_STATUS
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl WebhookForm {
    /// Validate ids, merchant and signature
    ///
    /// `expected_mid` is skipped when empty.
    pub fn into_notice(
        self,
        webhook_secret: &str,
        expected_mid: &str,
    ) -> Result<WebhookNotice, WebhookReject> {
        let (Some(order_id), Some(tid)) = (present(&self.order_id), present(&self.tid)) else {
            return Err(WebhookReject::MissingIds);
        };
        let status = self.status.as_deref().unwrap_or("").trim();
        let raw_amount = self.amount.as_deref().unwrap_or("").trim();

        let sign = present(&self.sign).ok_or(WebhookReject::MissingSignature)?;
        let payload = signature::webhook_payload(status, tid, order_id, raw_amount);
        signature::verify(webhook_secret, &payload, sign).map_err(WebhookReject::BadSignature)?;

        match present(&self.mid) {
            Some(mid) if !expected_mid.is_empty() && mid != expected_mid => {
                return Err(WebhookReject::ForeignMerchant(mid.to_string()));
            }
            _ => {}
        }

        Ok(WebhookNotice {
            status: status.to_string(),
            tid: tid.to_string(),
            order_id: order_id.to_string(),
            amount: raw_amount.parse().ok(),
            message: present(&self.message).map(str::to_string),
        })
    }
}
