use serde_json::Value;

use crate::subscription::SubscriptionId;

use super::error::TriggerError;

/// Body of a "subscription created" trigger.
pub struct TriggerPayload;

impl TriggerPayload {
    /// Resolves the subscription id from any of the accepted shapes:
    /// `subscriptionId` (string or `{"$oid": ...}`), `id`, or `subscription.id`.
    pub fn from_json(payload: &Value) -> Result<SubscriptionId, TriggerError> {
        let candidates = [
            payload.get("subscriptionId"),
            payload.get("subscriptionId").and_then(|id| id.get("$oid")),
            payload.get("id"),
            payload.pointer("/subscription/id"),
        ];

        candidates
            .into_iter()
            .flatten()
            .find_map(as_id)
            .ok_or(TriggerError::MissingPayload)
    }

    pub fn parse(line: &str) -> Result<SubscriptionId, TriggerError> {
        let payload: Value = serde_json::from_str(line)
            .map_err(|e| TriggerError::Common(anyhow::Error::new(e)))?;
        Self::from_json(&payload)
    }
}

fn as_id(value: &Value) -> Option<SubscriptionId> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_every_supported_shape() {
        let payloads = [
            json!({ "subscriptionId": "abc" }),
            json!({ "subscriptionId": { "$oid": "abc" } }),
            json!({ "id": "abc" }),
            json!({ "subscription": { "id": "abc", "name": "Streaming" } }),
        ];

        for payload in payloads {
            assert_eq!(
                TriggerPayload::from_json(&payload).unwrap(),
                "abc",
                "payload = {payload}"
            );
        }
    }

    #[test]
    fn missing_or_blank_id_is_rejected() {
        for payload in [json!({}), json!({ "subscriptionId": "  " }), json!(null)] {
            assert!(matches!(
                TriggerPayload::from_json(&payload),
                Err(TriggerError::MissingPayload)
            ));
        }
    }

    #[test]
    fn parse_reports_malformed_json() {
        assert!(matches!(
            TriggerPayload::parse("{not json"),
            Err(TriggerError::Common(_))
        ));
        assert_eq!(
            TriggerPayload::parse(r#"{"subscriptionId":"sub-1"}"#).unwrap(),
            "sub-1"
        );
    }
}
