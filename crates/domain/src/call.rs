//! `CallIdentity` and `IdentificationContext` — created at webhook time,
//! carried through the carrier's base64 custom parameters, and consumed
//! when the media socket opens. See §3 and §8 (P8, round-trip preservation).

use serde::{Deserialize, Serialize};

use crate::order::OrderSummary;

/// Immutable for the call's life. Created by the webhook handler, passed to
/// the mediator via the media-stream's custom parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallIdentity {
    pub call_id: String,
    pub caller_number: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Produced by the order backend client before the media socket opens.
/// Serialized as base64-encoded JSON and carried through the carrier's
/// session-start parameters so the mediator can reconstruct it without a
/// second backend round-trip.
///
/// If the backend lookup fails, `found=false, error=true` and a neutral
/// greeting is used — this is never fatal to the call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentificationContext {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub greeting_hint: String,
    #[serde(default)]
    pub orders: Vec<OrderSummary>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl IdentificationContext {
    /// The neutral context used when identification could not be performed
    /// (backend down, refresh failure, etc). Never fatal to the call.
    pub fn unidentified_error() -> Self {
        Self {
            found: false,
            customer_name: None,
            greeting_hint: "お電話ありがとうございます。お名前をお伺いできますか。".to_string(),
            orders: Vec::new(),
            error: true,
        }
    }

    /// The context used when the phone number simply matched no customer.
    pub fn not_found() -> Self {
        Self {
            found: false,
            customer_name: None,
            greeting_hint: "お電話ありがとうございます。お名前をお伺いできますか。".to_string(),
            orders: Vec::new(),
            error: false,
        }
    }

    pub fn latest_order(&self) -> Option<&OrderSummary> {
        self.orders.first()
    }

    /// Base64(JSON) — the wire form carried through the carrier's custom
    /// stream parameters.
    pub fn to_base64(&self) -> crate::error::Result<String> {
        use base64::Engine;
        let json = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    pub fn from_base64(encoded: &str) -> crate::error::Result<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| crate::error::Error::Other(format!("invalid base64 context: {e}")))?;
        let ctx: Self = serde_json::from_slice(&bytes)?;
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_all_fields_p8() {
        let ctx = IdentificationContext {
            found: true,
            customer_name: Some("田中 太郎".into()),
            greeting_hint: "お世話になっております、田中様。".into(),
            orders: vec![OrderSummary::sample_for_tests()],
            error: false,
        };
        let encoded = ctx.to_base64().unwrap();
        let decoded = IdentificationContext::from_base64(&encoded).unwrap();
        assert_eq!(decoded, ctx);
    }

    #[test]
    fn roundtrip_empty_orders() {
        let ctx = IdentificationContext::not_found();
        let encoded = ctx.to_base64().unwrap();
        let decoded = IdentificationContext::from_base64(&encoded).unwrap();
        assert_eq!(decoded, ctx);
    }

    #[test]
    fn base64_decode_rejects_garbage() {
        assert!(IdentificationContext::from_base64("not json at all!!").is_err());
    }
}
