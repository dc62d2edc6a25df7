//! Declarative field-requirement tables for each onboarding flow.
//!
//! Every section lists the record paths that count towards its completion
//! and the document URLs that feed its "all documents verified" badge.
//! The lists follow the onboarding questionnaire rather than the payload
//! types, so adding an optional payload field does not move progress bars.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Seller,
    Buyer,
}

impl Flow {
    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Seller => "seller",
            Flow::Buyer => "buyer",
        }
    }

    pub fn sections(self) -> &'static [SectionSchema] {
        match self {
            Flow::Seller => SELLER_SECTIONS,
            Flow::Buyer => BUYER_SECTIONS,
        }
    }

    /// One wizard step per section.
    pub fn total_steps(self) -> u8 {
        self.sections().len() as u8
    }

    /// The seller flow has a clickable step indicator; buyers walk linearly.
    pub fn allows_jump(self) -> bool {
        matches!(self, Flow::Seller)
    }

    pub fn section_for_step(self, step: u8) -> Option<&'static SectionSchema> {
        let index = usize::from(step).checked_sub(1)?;
        self.sections().get(index)
    }

    pub fn section(self, section: Section) -> Option<&'static SectionSchema> {
        self.sections().iter().find(|schema| schema.section == section)
    }

    pub fn documents(self) -> impl Iterator<Item = &'static DocumentField> {
        self.sections().iter().flat_map(|schema| schema.documents.iter())
    }

    pub fn document(self, name: &str) -> Option<&'static DocumentField> {
        self.documents().find(|document| document.name == name)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seller" => Ok(Flow::Seller),
            "buyer" => Ok(Flow::Buyer),
            other => Err(format!("Unknown onboarding flow '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    // seller
    BusinessIdentity,
    TaxExport,
    FoodSafety,
    Logistics,
    ShipmentCapability,
    // buyer
    CompanyIdentity,
    TaxRegistration,
    BankDetails,
    ShippingPreferences,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::BusinessIdentity => "businessIdentity",
            Section::TaxExport => "taxExport",
            Section::FoodSafety => "foodSafety",
            Section::Logistics => "logistics",
            Section::ShipmentCapability => "shipmentCapability",
            Section::CompanyIdentity => "companyIdentity",
            Section::TaxRegistration => "taxRegistration",
            Section::BankDetails => "bankDetails",
            Section::ShippingPreferences => "shippingPreferences",
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SELLER_SECTIONS
            .iter()
            .chain(BUYER_SECTIONS)
            .map(|schema| schema.section)
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("Unknown section '{}'", s))
    }
}

/// How a field proves it has been filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Trimmed string is non-empty.
    Text,
    /// Array has at least one element.
    List,
    /// Boolean is `true`.
    Flag,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRequirement {
    pub path: &'static str,
    pub presence: Presence,
}

/// A document upload. `name` is what admins put in the verified set.
#[derive(Debug, Clone, Copy)]
pub struct DocumentField {
    pub name: &'static str,
    pub url_path: &'static str,
}

#[derive(Debug)]
pub struct SectionSchema {
    pub section: Section,
    pub title: &'static str,
    pub fields: &'static [FieldRequirement],
    pub documents: &'static [DocumentField],
}

impl SectionSchema {
    /// Every path the section owns, documents included.
    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .map(|field| field.path)
            .chain(self.documents.iter().map(|document| document.url_path))
    }

    pub fn total(&self) -> usize {
        self.fields.len() + self.documents.len()
    }
}

const fn text(path: &'static str) -> FieldRequirement {
    FieldRequirement { path, presence: Presence::Text }
}

const fn list(path: &'static str) -> FieldRequirement {
    FieldRequirement { path, presence: Presence::List }
}

const fn flag(path: &'static str) -> FieldRequirement {
    FieldRequirement { path, presence: Presence::Flag }
}

const fn doc(name: &'static str, url_path: &'static str) -> DocumentField {
    DocumentField { name, url_path }
}

pub static SELLER_SECTIONS: &[SectionSchema] = &[
    SectionSchema {
        section: Section::BusinessIdentity,
        title: "Business Identity",
        fields: &[
            text("businessName"),
            text("businessType"),
            text("fullName"),
            text("contactPhone"),
            text("panNumber"),
            text("gstin"),
            text("registeredAddress"),
        ],
        documents: &[
            doc("businessRegistrationCertificate", "businessRegistrationCertificateUrl"),
            doc("panCard", "panCardUrl"),
            doc("gstCertificate", "gstCertificateUrl"),
            doc("addressProof", "addressProofUrl"),
        ],
    },
    SectionSchema {
        section: Section::TaxExport,
        title: "Tax & Export Eligibility",
        fields: &[
            text("iecCode"),
            list("exportMarkets"),
            flag("hasExportExperience"),
            text("accountHolderName"),
            text("accountNumber"),
            text("confirmAccountNumber"),
            text("ifscCode"),
        ],
        documents: &[
            doc("iecCertificate", "iecCertificateUrl"),
            doc("cancelledCheque", "cancelledChequeUrl"),
        ],
    },
    SectionSchema {
        section: Section::FoodSafety,
        title: "Food Safety",
        fields: &[
            text("fssaiLicenseNumber"),
            text("fssaiExpiryDate"),
            list("productCategories"),
            flag("hasHaccpCertification"),
        ],
        documents: &[
            doc("fssaiLicense", "fssaiLicenseUrl"),
            doc("labReport", "labReportUrl"),
        ],
    },
    SectionSchema {
        section: Section::Logistics,
        title: "Logistics",
        fields: &[
            text("warehouseAddress.street"),
            text("warehouseAddress.city"),
            text("warehouseAddress.state"),
            text("warehouseAddress.postalCode"),
            text("dispatchLeadTimeDays"),
            list("preferredCarriers"),
        ],
        documents: &[doc("warehouseLease", "warehouseLeaseUrl")],
    },
    SectionSchema {
        section: Section::ShipmentCapability,
        title: "Shipment Capability",
        fields: &[
            flag("supportsColdChain"),
            flag("shipsInternationally"),
            text("maxShipmentWeightKg"),
            list("packagingTypes"),
        ],
        documents: &[doc("transitInsurance", "transitInsuranceUrl")],
    },
];

pub static BUYER_SECTIONS: &[SectionSchema] = &[
    SectionSchema {
        section: Section::CompanyIdentity,
        title: "Company Identity",
        fields: &[
            text("companyName"),
            text("fullName"),
            text("designation"),
            text("cinNumber"),
            text("aadhaarNumber"),
        ],
        documents: &[
            doc("incorporationCertificate", "incorporationCertificateUrl"),
            doc("signatoryId", "signatoryIdUrl"),
        ],
    },
    SectionSchema {
        section: Section::TaxRegistration,
        title: "Tax Registration",
        fields: &[text("panNumber"), text("gstin")],
        documents: &[
            doc("panCard", "panCardUrl"),
            doc("gstCertificate", "gstCertificateUrl"),
        ],
    },
    SectionSchema {
        section: Section::BankDetails,
        title: "Bank Details",
        fields: &[
            text("accountHolderName"),
            text("accountNumber"),
            text("confirmAccountNumber"),
            text("ifscCode"),
        ],
        documents: &[doc("cancelledCheque", "cancelledChequeUrl")],
    },
    SectionSchema {
        section: Section::ShippingPreferences,
        title: "Shipping Preferences",
        fields: &[
            text("deliveryAddress.street"),
            text("deliveryAddress.city"),
            text("deliveryAddress.state"),
            text("deliveryAddress.postalCode"),
            text("deliveryAddress.country"),
            list("preferredIncoterms"),
            text("receivingHours"),
            flag("requiresColdChain"),
        ],
        documents: &[],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_counts_match_flows() {
        assert_eq!(Flow::Seller.total_steps(), 5);
        assert_eq!(Flow::Buyer.total_steps(), 4);
    }

    #[test]
    fn steps_map_to_sections_in_order() {
        assert_eq!(
            Flow::Seller.section_for_step(1).map(|s| s.section),
            Some(Section::BusinessIdentity)
        );
        assert_eq!(
            Flow::Buyer.section_for_step(4).map(|s| s.section),
            Some(Section::ShippingPreferences)
        );
        assert!(Flow::Buyer.section_for_step(0).is_none());
        assert!(Flow::Buyer.section_for_step(5).is_none());
    }

    #[test]
    fn business_identity_has_four_documents() {
        let schema = Flow::Seller.section(Section::BusinessIdentity).unwrap();
        assert_eq!(schema.documents.len(), 4);
    }

    #[test]
    fn flow_and_section_parse_from_path_segments() {
        assert_eq!("Seller".parse::<Flow>(), Ok(Flow::Seller));
        assert!("admin".parse::<Flow>().is_err());
        assert_eq!("bankDetails".parse::<Section>(), Ok(Section::BankDetails));
        assert!("bank".parse::<Section>().is_err());
    }

    #[test]
    fn document_names_resolve_per_flow() {
        assert!(Flow::Buyer.document("cancelledCheque").is_some());
        assert!(Flow::Buyer.document("labReport").is_none());
        assert_eq!(
            Flow::Seller.document("labReport").map(|d| d.url_path),
            Some("labReportUrl")
        );
    }
}
