//! reqwest-backed gateway client

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{GatewayConfig, GatewayError, PaymentGateway, TransactionState, VerifiedTransaction};

/// Transaction inquiry response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InquiryResponse {
    #[serde(default)]
    result_code: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tid: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    amount: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Gateway client over HTTPS
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn inquiry_url(&self) -> String {
        format!(
            "{}/v1/transactions/inquiry",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn verify_by_transaction_id(&self, tid: &str) -> Result<VerifiedTransaction, GatewayError> {
        let resp = self
            .client
            .post(self.inquiry_url())
            .basic_auth(&self.config.api_key, None::<&str>)
            .form(&[("mid", self.config.mid.as_str()), ("tid", tid)])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::UnknownTransaction(tid.to_string()));
        }
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body: InquiryResponse = resp.json().await?;
        parse_inquiry(tid, body)
    }
}

fn parse_inquiry(tid: &str, body: InquiryResponse) -> Result<VerifiedTransaction, GatewayError> {
    if let Some(reported) = body.tid.as_deref() {
        if reported != tid {
            return Err(GatewayError::BadResponse(format!(
                "asked for {tid}, gateway answered for {reported}"
            )));
        }
    }

    // amount arrives either as a number or a numeric string
    let amount = match body.amount {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| GatewayError::BadResponse("missing or non-integer amount".into()))?;

    let raw_state = body
        .status
        .or(body.result_code)
        .ok_or_else(|| GatewayError::BadResponse("missing status".into()))?;

    Ok(VerifiedTransaction {
        tid: tid.to_string(),
        order_id: body.order_id.filter(|s| !s.is_empty()),
        amount,
        state: TransactionState::from_gateway(&raw_state),
        message: body.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> InquiryResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_paid() {
        let txn = parse_inquiry(
            "T1",
            body(serde_json::json!({
                "resultCode": "00", "tid": "T1", "orderId": "O1", "amount": "4000"
            })),
        )
        .unwrap();
        assert_eq!(txn.state, TransactionState::Paid);
        assert_eq!(txn.amount, 4000);
        assert_eq!(txn.order_id.as_deref(), Some("O1"));
    }

    #[test]
    fn test_status_wins_over_result_code() {
        let txn = parse_inquiry(
            "T1",
            body(serde_json::json!({"resultCode": "00", "status": "CANCELED", "amount": 10})),
        )
        .unwrap();
        assert_eq!(txn.state, TransactionState::Canceled);
    }

    #[test]
    fn test_rejects_foreign_tid_and_missing_amount() {
        let err = parse_inquiry("T1", body(serde_json::json!({"tid": "T2", "status": "PAID", "amount": 1})))
            .unwrap_err();
        assert!(matches!(err, GatewayError::BadResponse(_)));

        let err = parse_inquiry("T1", body(serde_json::json!({"status": "PAID"}))).unwrap_err();
        assert!(matches!(err, GatewayError::BadResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let gateway = HttpGateway::new(GatewayConfig {
            mid: "MID".into(),
            api_key: "key".into(),
            sign_key: "sign".into(),
            webhook_secret: "whsec".into(),
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
        })
        .unwrap();
        let err = gateway.verify_by_transaction_id("T1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_) | GatewayError::Timeout));
    }
}
