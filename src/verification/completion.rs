use serde_json::Value;
use std::collections::BTreeSet;

use super::path;
use super::schema::{Flow, Presence, SectionSchema};

pub fn is_present(value: Option<&Value>, presence: Presence) -> bool {
    match (presence, value) {
        (Presence::Text, Some(Value::String(text))) => !text.trim().is_empty(),
        (Presence::List, Some(Value::Array(items))) => !items.is_empty(),
        (Presence::Flag, Some(Value::Bool(flag))) => *flag,
        _ => false,
    }
}

/// `round(100 * completed / total)`. An empty denominator reads as 0.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u8
}

fn completed_in(schema: &SectionSchema, record: &Value) -> usize {
    let fields = schema
        .fields
        .iter()
        .filter(|field| is_present(path::get(record, field.path), field.presence))
        .count();
    let documents = schema
        .documents
        .iter()
        .filter(|document| is_present(path::get(record, document.url_path), Presence::Text))
        .count();
    fields + documents
}

pub fn section_completion(schema: &SectionSchema, record: &Value) -> u8 {
    percentage(completed_in(schema, record), schema.total())
}

/// Completion across every requirement of the flow, documents included.
pub fn overall_completion(flow: Flow, record: &Value) -> u8 {
    let (completed, total) = flow
        .sections()
        .iter()
        .fold((0, 0), |(completed, total), schema| {
            (completed + completed_in(schema, record), total + schema.total())
        });
    percentage(completed, total)
}

/// Share of the flow's document URLs that are filled in.
pub fn document_completion(flow: Flow, record: &Value) -> u8 {
    let total = flow.documents().count();
    let uploaded = flow
        .documents()
        .filter(|document| is_present(path::get(record, document.url_path), Presence::Text))
        .count();
    percentage(uploaded, total)
}

/// A section earns the badge only when every document has a URL *and* its
/// name is in the verified set. Sections without documents never do.
pub fn all_documents_verified(
    schema: &SectionSchema,
    record: &Value,
    verified: &BTreeSet<String>,
) -> bool {
    !schema.documents.is_empty()
        && schema.documents.iter().all(|document| {
            is_present(path::get(record, document.url_path), Presence::Text)
                && verified.contains(document.name)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::schema::Section;
    use serde_json::json;

    fn business_identity() -> &'static SectionSchema {
        Flow::Seller.section(Section::BusinessIdentity).unwrap()
    }

    fn identity_documents() -> Value {
        json!({
            "businessRegistrationCertificateUrl": "https://files/brc.pdf",
            "panCardUrl": "https://files/pan.pdf",
            "gstCertificateUrl": "https://files/gst.pdf",
            "addressProofUrl": "https://files/address.pdf"
        })
    }

    fn verified_identity() -> BTreeSet<String> {
        ["businessRegistrationCertificate", "panCard", "gstCertificate", "addressProof"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn empty_seller_record_scores_zero_everywhere() {
        let record = json!({});
        assert_eq!(document_completion(Flow::Seller, &record), 0);
        assert_eq!(overall_completion(Flow::Seller, &record), 0);
        for schema in Flow::Seller.sections() {
            assert_eq!(section_completion(schema, &record), 0);
            assert!(!all_documents_verified(schema, &record, &BTreeSet::new()));
        }
    }

    #[test]
    fn presence_rules_follow_value_kind() {
        assert!(!is_present(Some(&json!("   ")), Presence::Text));
        assert!(is_present(Some(&json!(" x ")), Presence::Text));
        assert!(!is_present(Some(&json!([])), Presence::List));
        assert!(is_present(Some(&json!(["UAE"])), Presence::List));
        assert!(!is_present(Some(&json!(false)), Presence::Flag));
        assert!(is_present(Some(&json!(true)), Presence::Flag));
        assert!(!is_present(Some(&json!("true")), Presence::Flag));
        assert!(!is_present(None, Presence::Text));
    }

    #[test]
    fn full_section_reaches_one_hundred() {
        let schema = Flow::Buyer.section(Section::TaxRegistration).unwrap();
        let record = json!({
            "panNumber": "AAGCB7383J",
            "gstin": "29AAGCB7383J1Z4",
            "panCardUrl": "https://files/pan.pdf",
            "gstCertificateUrl": "https://files/gst.pdf"
        });
        assert_eq!(section_completion(schema, &record), 100);
    }

    #[test]
    fn completion_never_decreases_as_fields_fill_in() {
        let schema = business_identity();
        let mut record = json!({});
        let mut last = section_completion(schema, &record);
        let filled = schema
            .fields
            .iter()
            .map(|field| (field.path, field.presence))
            .chain(schema.documents.iter().map(|d| (d.url_path, Presence::Text)));
        for (field, presence) in filled {
            let value = match presence {
                Presence::Text => json!("filled"),
                Presence::List => json!(["filled"]),
                Presence::Flag => json!(true),
            };
            path::set(&mut record, field, value).unwrap();
            let now = section_completion(schema, &record);
            assert!(now >= last);
            assert!(now <= 100);
            last = now;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn rounding_uses_nearest_integer() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(199, 200), 100);
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn badge_shows_when_all_identity_documents_are_verified() {
        let record = identity_documents();
        assert!(all_documents_verified(business_identity(), &record, &verified_identity()));
    }

    #[test]
    fn clearing_a_url_hides_the_badge_without_touching_the_verified_set() {
        let mut record = identity_documents();
        let verified = verified_identity();
        record["gstCertificateUrl"] = json!("");
        assert!(!all_documents_verified(business_identity(), &record, &verified));
        assert_eq!(verified.len(), 4);
    }

    #[test]
    fn badge_needs_every_name_in_the_verified_set() {
        let record = identity_documents();
        let mut verified = verified_identity();
        verified.remove("panCard");
        assert!(!all_documents_verified(business_identity(), &record, &verified));
    }

    #[test]
    fn document_completion_counts_urls_only() {
        let record = identity_documents();
        // 4 of the seller's 10 document slots
        assert_eq!(document_completion(Flow::Seller, &record), 40);
    }
}
