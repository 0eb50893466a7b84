//! HMAC-SHA256 signatures for gateway traffic
//!
//! Inbound webhooks sign `"{P_STATUS}|{P_TID}|{P_OID}|{P_AMT}"`; outbound
//! checkout parameters sign `"oid=..&price=..&timestamp=.."`. Both are
//! lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Canonical string covered by a webhook signature
pub fn webhook_payload(status: &str, tid: &str, order_id: &str, amount: &str) -> String {
    format!("{status}|{tid}|{order_id}|{amount}")
}

/// Canonical string covered by a checkout signature
pub fn checkout_payload(order_id: &str, amount: i64, timestamp: i64) -> String {
    format!("oid={order_id}&price={amount}&timestamp={timestamp}")
}

/// Hex HMAC-SHA256 of `payload`
pub fn sign(secret: &str, payload: &str) -> Result<String, &'static str> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature against `payload`
pub fn verify(secret: &str, payload: &str, signature_hex: &str) -> Result<(), &'static str> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload.as_bytes());

    let sig_bytes = hex::decode(signature_hex.trim()).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Signature mismatch")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify() {
        let payload = webhook_payload("00", "T1", "O1", "4000");
        assert_eq!(payload, "00|T1|O1|4000");

        let sig = sign("whsec", &payload).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify("whsec", &payload, &sig).is_ok());
        assert!(verify("whsec", &payload, &sig.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let sig = sign("whsec", &webhook_payload("00", "T1", "O1", "4000")).unwrap();
        assert_eq!(
            verify("whsec", &webhook_payload("00", "T1", "O1", "1"), &sig),
            Err("Signature mismatch")
        );
        assert_eq!(
            verify("other", &webhook_payload("00", "T1", "O1", "4000"), &sig),
            Err("Signature mismatch")
        );
        assert_eq!(
            verify("whsec", "x", "not-hex"),
            Err("Invalid signature hex")
        );
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let sig = sign("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_checkout_payload_format() {
        assert_eq!(
            checkout_payload("O1", 4000, 1700000000000),
            "oid=O1&price=4000&timestamp=1700000000000"
        );
    }
}
