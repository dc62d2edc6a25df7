use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Unsaved form input, kept so a reload or crash does not lose it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FormDraft {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub owner_id: ObjectId,
    pub flow_name: String,
    pub data: serde_json::Value,
    pub saved_at: DateTime,
}

impl FormDraft {
    /// A draft older than `ttl_hours` is treated as gone.
    pub fn is_expired(&self, now: DateTime, ttl_hours: i64) -> bool {
        let age_ms = now.timestamp_millis() - self.saved_at.timestamp_millis();
        age_ms > ttl_hours.saturating_mul(3_600_000)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveDraftDto {
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(saved_at: DateTime) -> FormDraft {
        FormDraft {
            id: None,
            owner_id: ObjectId::new(),
            flow_name: "seller-verification".to_string(),
            data: serde_json::json!({ "gstin": "29A" }),
            saved_at,
        }
    }

    #[test]
    fn drafts_expire_after_ttl() {
        let now = DateTime::from_millis(10 * 3_600_000);
        assert!(!draft(DateTime::from_millis(0)).is_expired(now, 24));
        assert!(draft(DateTime::from_millis(0)).is_expired(now, 9));
        assert!(!draft(now).is_expired(now, 0));
    }
}
