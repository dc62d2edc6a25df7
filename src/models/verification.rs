use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::verification::{FieldVerification, Flow};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Draft,
    Submitted,
}

/// One onboarding record per (owner, flow). Never deleted; edits supersede.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub owner_id: ObjectId,
    pub flow: Flow,
    pub data: serde_json::Value,
    #[serde(default)]
    pub changed_fields: Vec<String>,
    #[serde(default)]
    pub verified_documents: Vec<String>,
    #[serde(default)]
    pub field_statuses: BTreeMap<String, FieldVerification>,
    pub current_step: u8,
    pub status: RecordStatus,
    pub submitted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl VerificationRecord {
    pub fn new(owner_id: ObjectId, flow: Flow) -> Self {
        VerificationRecord {
            id: None,
            owner_id,
            flow,
            data: serde_json::json!({}),
            changed_fields: Vec::new(),
            verified_documents: Vec::new(),
            field_statuses: BTreeMap::new(),
            current_step: 1,
            status: RecordStatus::Draft,
            submitted_at: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.status, RecordStatus::Submitted)
    }
}

/// Street-level location used by the logistics and shipping sections.
#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostalLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Every field a seller can send. Omitted fields are left untouched; an
/// empty string clears a value.
#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SellerVerification {
    // business identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_registration_certificate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan_card_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst_certificate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_proof_url: Option<String>,

    // tax & export
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iec_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_markets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_export_experience: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_holder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifsc_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iec_certificate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_cheque_url: Option<String>,

    // food safety
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fssai_license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fssai_expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_haccp_certification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fssai_license_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lab_report_url: Option<String>,

    // logistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_address: Option<PostalLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_lead_time_days: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_carriers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_lease_url: Option<String>,

    // shipment capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_cold_chain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ships_internationally: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_shipment_weight_kg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packaging_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transit_insurance_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuyerVerification {
    // company identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cin_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhaar_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incorporation_certificate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signatory_id_url: Option<String>,

    // tax registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan_card_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst_certificate_url: Option<String>,

    // bank details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_holder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifsc_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_cheque_url: Option<String>,

    // shipping preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<PostalLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_incoterms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving_hours: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_cold_chain: Option<bool>,
}

/// Runs a raw section payload through the flow's typed shape: unknown
/// fields are rejected and `null`s are dropped.
pub fn normalize_payload(flow: Flow, payload: serde_json::Value) -> Result<serde_json::Value, serde_json::Error> {
    match flow {
        Flow::Seller => serde_json::to_value(serde_json::from_value::<SellerVerification>(payload)?),
        Flow::Buyer => serde_json::to_value(serde_json::from_value::<BuyerVerification>(payload)?),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NextStepDto {
    /// What the form currently shows for this step; compared with storage.
    pub pending: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckFieldDto {
    pub value: String,
    /// Other record fields a cross-field check may read, e.g. `panNumber`.
    #[serde(default)]
    pub related: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarkReviewedDto {
    pub section: Option<String>,
    pub fields: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::path;
    use serde_json::json;

    fn filled(flow: Flow) -> serde_json::Value {
        let mut record = json!({});
        for schema in flow.sections() {
            for field in schema.fields {
                let value = match field.presence {
                    crate::verification::schema::Presence::Text => json!("x"),
                    crate::verification::schema::Presence::List => json!(["x"]),
                    crate::verification::schema::Presence::Flag => json!(true),
                };
                path::set(&mut record, field.path, value).unwrap();
            }
            for document in schema.documents {
                path::set(&mut record, document.url_path, json!("https://files/x.pdf")).unwrap();
            }
        }
        record
    }

    #[test]
    fn typed_payloads_accept_every_schema_path() {
        for flow in [Flow::Seller, Flow::Buyer] {
            let record = filled(flow);
            let normalized = normalize_payload(flow, record.clone()).unwrap();
            assert_eq!(normalized, record);
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(normalize_payload(Flow::Buyer, json!({ "fssaiLicenseNumber": "1" })).is_err());
        assert!(normalize_payload(Flow::Seller, json!({ "warehouseAddress": { "zip": "1" } })).is_err());
    }

    #[test]
    fn nulls_are_dropped() {
        let normalized = normalize_payload(Flow::Seller, json!({ "gstin": null, "panNumber": "" })).unwrap();
        assert_eq!(normalized, json!({ "panNumber": "" }));
    }
}
