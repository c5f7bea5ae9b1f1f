//! Webhook delivery body.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::WebhookEvent;

/// Errors from decoding a webhook body.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed webhook payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// One webhook delivery: a batch of events plus delivery metadata.
///
/// A delivery with no events is the platform's "intent to receive" probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
    #[serde(default)]
    pub first_event_sequence: Option<i64>,
    #[serde(default)]
    pub last_event_sequence: Option<i64>,
    #[serde(default)]
    pub entropy: Option<String>,
}

impl WebhookPayload {
    pub fn is_probe(&self) -> bool {
        self.events.is_empty()
    }
}

/// Parses a raw webhook body.
pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload, WebhookError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventCategory, EventType, ResourceId};

    const DELIVERY: &str = r#"{
        "events": [{
            "resourceUrl": "https://api.xero.com/api.xro/2.0/Invoices/243216c5-369e-4056-ac67-05388f86dc81",
            "resourceId": "243216c5-369e-4056-ac67-05388f86dc81",
            "eventDateUtc": "2017-06-21T01:15:39.902",
            "eventType": "UPDATE",
            "eventCategory": "INVOICE",
            "tenantId": "c2cc9b6e-9458-4c7d-93cc-f02b81b0594f",
            "tenantType": "ORGANISATION"
        }],
        "lastEventSequence": 1,
        "firstEventSequence": 1,
        "entropy": "S0m3r4Nd0mt3xt"
    }"#;

    #[test]
    fn parses_delivery() {
        let payload = parse_payload(DELIVERY.as_bytes()).unwrap();

        assert!(!payload.is_probe());
        assert_eq!(payload.first_event_sequence, Some(1));
        assert_eq!(payload.entropy.as_deref(), Some("S0m3r4Nd0mt3xt"));

        let event = &payload.events[0];
        assert_eq!(
            event.resource_id,
            ResourceId::new("243216c5-369e-4056-ac67-05388f86dc81")
        );
        assert_eq!(event.event_type, EventType::Update);
        assert_eq!(event.event_category, EventCategory::Invoice);
        assert_eq!(event.tenant_type.as_deref(), Some("ORGANISATION"));
        assert_eq!(
            event.entity_id().unwrap().as_str(),
            "243216c5-369e-4056-ac67-05388f86dc81"
        );
    }

    #[test]
    fn probe_delivery_has_no_events() {
        let payload = parse_payload(
            br#"{"events":[],"firstEventSequence":0,"lastEventSequence":0,"entropy":"x"}"#,
        )
        .unwrap();
        assert!(payload.is_probe());
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(parse_payload(b"not json").is_err());
        assert!(parse_payload(br#"{"events":[{"resourceId":"x"}]}"#).is_err());
    }
}
