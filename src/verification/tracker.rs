//! Per-field verification status, kept alongside the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::path;
use super::rules::{self, AutoVerifyRule, FieldMetadata, RuleOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldVerificationStatus {
    #[default]
    Unverified,
    Verifying,
    Verified,
    Invalid,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryOutcome {
    Confirmed,
    Rejected,
    Unreachable,
}

/// Result of asking the authoritative registry about a well-formed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfirmation {
    pub outcome: RegistryOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldVerification {
    pub status: FieldVerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FieldMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfirmation>,
}

/// A format check that has started but not yet settled.
#[derive(Debug)]
pub struct PendingCheck {
    rule: &'static AutoVerifyRule,
    value: String,
}

#[derive(Debug, Clone, Default)]
pub struct FieldTracker {
    statuses: BTreeMap<String, FieldVerification>,
    /// Fields whose status changed since the last `clear_touched`.
    touched: BTreeSet<String>,
}

impl FieldTracker {
    pub fn from_statuses(statuses: BTreeMap<String, FieldVerification>) -> Self {
        FieldTracker { statuses, touched: BTreeSet::new() }
    }

    pub fn statuses(&self) -> &BTreeMap<String, FieldVerification> {
        &self.statuses
    }

    /// Statuses this instance re-checked or confirmed. Only these belong in
    /// a write; the rest may be stale next to a concurrent request.
    pub fn touched_statuses(&self) -> BTreeMap<String, FieldVerification> {
        self.touched
            .iter()
            .filter_map(|field| self.statuses.get(field).map(|status| (field.clone(), status.clone())))
            .collect()
    }

    pub fn clear_touched(&mut self) {
        self.touched.clear();
    }

    pub fn get(&self, field: &str) -> Option<&FieldVerification> {
        self.statuses.get(field)
    }

    pub fn status(&self, field: &str) -> FieldVerificationStatus {
        self.get(field).map(|v| v.status).unwrap_or_default()
    }

    /// Drops everything known about a field, registry confirmation included.
    pub fn reset(&mut self, field: &str) {
        if rules::rule_for(field).is_some() {
            self.statuses.insert(field.to_string(), FieldVerification::default());
            self.touched.insert(field.to_string());
        }
    }

    /// Moves a field to `verifying` once it is long enough to check.
    /// Returns `None` while the field stays `unverified`.
    pub fn begin_check(&mut self, field: &str, record: &Value) -> Option<PendingCheck> {
        let rule = rules::rule_for(field)?;
        self.touched.insert(rule.field.to_string());
        let entry = self.statuses.entry(field.to_string()).or_default();

        let value = match path::get(record, field) {
            None | Some(Value::Null) => {
                entry.status = FieldVerificationStatus::Unverified;
                return None;
            }
            Some(Value::String(value)) => value.clone(),
            Some(_) => {
                entry.status = FieldVerificationStatus::Error;
                entry.hint = Some(format!("{} must be text", field));
                return None;
            }
        };

        if rule.kind.normalize(&value).chars().count() < rule.min_length {
            entry.status = FieldVerificationStatus::Unverified;
            entry.hint = None;
            return None;
        }

        entry.status = FieldVerificationStatus::Verifying;
        Some(PendingCheck { rule, value })
    }

    pub fn settle(&mut self, check: PendingCheck, record: &Value, now: DateTime<Utc>) -> &FieldVerification {
        self.touched.insert(check.rule.field.to_string());
        let entry = self.statuses.entry(check.rule.field.to_string()).or_default();
        match check.rule.validate_format(&check.value, record) {
            RuleOutcome::TooShort => {
                entry.status = FieldVerificationStatus::Unverified;
                entry.hint = None;
                entry.metadata = None;
            }
            RuleOutcome::Passed(metadata) => {
                entry.status = FieldVerificationStatus::Verified;
                entry.hint = None;
                entry.metadata = metadata;
            }
            RuleOutcome::Failed(hint) => {
                entry.status = FieldVerificationStatus::Invalid;
                entry.hint = Some(hint);
                entry.metadata = None;
            }
        }
        entry.checked_at = Some(now);
        entry
    }

    /// Runs the format check for a field without resetting it first.
    pub fn verify(&mut self, field: &str, record: &Value, now: DateTime<Utc>) -> FieldVerificationStatus {
        match self.begin_check(field, record) {
            Some(check) => self.settle(check, record, now).status,
            None => self.status(field),
        }
    }

    /// An edited field starts over; fields whose cross-field check reads it
    /// are re-checked but keep their registry confirmation.
    pub fn on_edit(&mut self, field: &str, record: &Value, now: DateTime<Utc>) {
        if rules::rule_for(field).is_some() {
            self.reset(field);
            self.verify(field, record, now);
        }

        for dependent in rules::dependents_of(field) {
            if self.statuses.contains_key(dependent.field) {
                self.verify(dependent.field, record, now);
            }
        }
    }

    pub fn record_registry(&mut self, field: &str, confirmation: RegistryConfirmation) {
        self.touched.insert(field.to_string());
        self.statuses.entry(field.to_string()).or_default().registry = Some(confirmation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn editing_a_verified_pan_resets_it_before_checking() {
        let mut tracker = FieldTracker::default();
        let mut record = json!({ "panNumber": "AAGCB7383J" });
        tracker.on_edit("panNumber", &record, now());
        assert_eq!(tracker.status("panNumber"), FieldVerificationStatus::Verified);

        record["panNumber"] = json!("AAG");
        tracker.reset("panNumber");
        assert_eq!(tracker.status("panNumber"), FieldVerificationStatus::Unverified);
        assert_eq!(tracker.get("panNumber").unwrap().metadata, None);

        tracker.verify("panNumber", &record, now());
        let status = tracker.get("panNumber").unwrap();
        assert_eq!(status.status, FieldVerificationStatus::Unverified);
        assert_eq!(status.hint, None);
    }

    #[test]
    fn check_passes_through_verifying() {
        let mut tracker = FieldTracker::default();
        let record = json!({ "ifscCode": "SBIN0005943" });
        let check = tracker.begin_check("ifscCode", &record).unwrap();
        assert_eq!(tracker.status("ifscCode"), FieldVerificationStatus::Verifying);

        let settled = tracker.settle(check, &record, now());
        assert_eq!(settled.status, FieldVerificationStatus::Verified);
        assert_eq!(
            settled.metadata,
            Some(FieldMetadata::Bank { bank_name: "State Bank of India".to_string() })
        );
    }

    #[test]
    fn three_characters_of_a_tax_id_never_show_an_error() {
        let mut tracker = FieldTracker::default();
        let record = json!({ "gstin": "29A" });
        tracker.on_edit("gstin", &record, now());
        assert_eq!(tracker.status("gstin"), FieldVerificationStatus::Unverified);
        assert_eq!(tracker.get("gstin").unwrap().hint, None);
    }

    #[test]
    fn malformed_value_is_invalid_with_hint() {
        let mut tracker = FieldTracker::default();
        let record = json!({ "accountNumber": "12345ABCDE" });
        tracker.on_edit("accountNumber", &record, now());
        let status = tracker.get("accountNumber").unwrap();
        assert_eq!(status.status, FieldVerificationStatus::Invalid);
        assert!(status.hint.is_some());
    }

    #[test]
    fn non_text_value_is_an_error() {
        let mut tracker = FieldTracker::default();
        let record = json!({ "panNumber": 1234567890 });
        tracker.on_edit("panNumber", &record, now());
        assert_eq!(tracker.status("panNumber"), FieldVerificationStatus::Error);
    }

    #[test]
    fn pan_edit_rechecks_gstin() {
        let mut tracker = FieldTracker::default();
        let mut record = json!({ "panNumber": "AAGCB7383J", "gstin": "29AAGCB7383J1Z4" });
        tracker.on_edit("panNumber", &record, now());
        tracker.on_edit("gstin", &record, now());
        assert_eq!(tracker.status("gstin"), FieldVerificationStatus::Verified);

        record["panNumber"] = json!("AAPFU0939F");
        tracker.on_edit("panNumber", &record, now());
        assert_eq!(tracker.status("panNumber"), FieldVerificationStatus::Verified);
        assert_eq!(tracker.status("gstin"), FieldVerificationStatus::Invalid);
    }

    #[test]
    fn edits_clear_registry_confirmation() {
        let mut tracker = FieldTracker::default();
        let record = json!({ "panNumber": "AAGCB7383J" });
        tracker.on_edit("panNumber", &record, now());
        tracker.record_registry(
            "panNumber",
            RegistryConfirmation { outcome: RegistryOutcome::Confirmed, message: None, checked_at: now() },
        );
        tracker.on_edit("panNumber", &record, now());
        assert_eq!(tracker.get("panNumber").unwrap().registry, None);
    }

    #[test]
    fn fields_without_rules_are_not_tracked() {
        let mut tracker = FieldTracker::default();
        tracker.on_edit("businessName", &json!({ "businessName": "Sahyadri" }), now());
        assert!(tracker.statuses().is_empty());
    }

    #[test]
    fn only_rechecked_fields_are_touched() {
        let mut stored = BTreeMap::new();
        stored.insert(
            "panNumber".to_string(),
            FieldVerification { status: FieldVerificationStatus::Verified, ..Default::default() },
        );
        let mut tracker = FieldTracker::from_statuses(stored);
        assert!(tracker.touched_statuses().is_empty());

        tracker.on_edit("ifscCode", &json!({ "ifscCode": "SBIN0005943" }), now());
        let touched = tracker.touched_statuses();
        assert_eq!(touched.keys().collect::<Vec<_>>(), vec!["ifscCode"]);

        tracker.clear_touched();
        assert!(tracker.touched_statuses().is_empty());
        assert_eq!(tracker.status("panNumber"), FieldVerificationStatus::Verified);
    }
}
