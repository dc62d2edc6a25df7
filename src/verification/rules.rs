//! Format rules for the identifiers collected during onboarding.
//!
//! These checks are local and purely syntactic (length, shape, check
//! digits). Whether an identifier is actually registered is a separate
//! question answered by the registry service.

use chrono::Datelike;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::path;

static PAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());
static GSTIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").unwrap()
});
static IEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Z]{5}[0-9]{4}[A-Z]|[0-9]{10})$").unwrap());
static FSSAI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{14}$").unwrap());
static IFSC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{4}0[A-Z0-9]{6}$").unwrap());
static ACCOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{9,18}$").unwrap());
static AADHAAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[2-9][0-9]{11}$").unwrap());
static CIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([LU])([0-9]{5})([A-Z]{2})([0-9]{4})([A-Z]{3})([0-9]{6})$").unwrap()
});

const GST_CHARSET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

const CIN_OWNERSHIP: &[&str] = &[
    "PLC", "PTC", "GOI", "SGC", "FLC", "FTC", "NPL", "GAP", "GAT", "ULL", "ULT", "OPC",
];

const IFSC_BANKS: &[(&str, &str)] = &[
    ("SBIN", "State Bank of India"),
    ("HDFC", "HDFC Bank"),
    ("ICIC", "ICICI Bank"),
    ("UTIB", "Axis Bank"),
    ("PUNB", "Punjab National Bank"),
    ("BARB", "Bank of Baroda"),
    ("KKBK", "Kotak Mahindra Bank"),
    ("CNRB", "Canara Bank"),
    ("UBIN", "Union Bank of India"),
    ("IDIB", "Indian Bank"),
    ("YESB", "Yes Bank"),
    ("INDB", "IndusInd Bank"),
    ("IDFB", "IDFC First Bank"),
    ("BKID", "Bank of India"),
    ("MAHB", "Bank of Maharashtra"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Pan,
    Gstin,
    Iec,
    Fssai,
    Ifsc,
    BankAccount,
    Aadhaar,
    Cin,
}

impl IdentifierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierKind::Pan => "pan",
            IdentifierKind::Gstin => "gstin",
            IdentifierKind::Iec => "iec",
            IdentifierKind::Fssai => "fssai",
            IdentifierKind::Ifsc => "ifsc",
            IdentifierKind::BankAccount => "bank_account",
            IdentifierKind::Aadhaar => "aadhaar",
            IdentifierKind::Cin => "cin",
        }
    }

    /// Uppercases and drops the separators people type into long numbers.
    pub fn normalize(self, raw: &str) -> String {
        let trimmed = raw.trim().to_uppercase();
        match self {
            IdentifierKind::Aadhaar | IdentifierKind::BankAccount => trimmed
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect(),
            _ => trimmed,
        }
    }

    /// Checks the shape of an already normalized value.
    pub fn check(self, value: &str) -> Result<Option<FieldMetadata>, String> {
        match self {
            IdentifierKind::Pan => check_pan(value),
            IdentifierKind::Gstin => check_gstin(value),
            IdentifierKind::Iec => check_iec(value),
            IdentifierKind::Fssai => check_fssai(value),
            IdentifierKind::Ifsc => check_ifsc(value),
            IdentifierKind::BankAccount => check_account(value),
            IdentifierKind::Aadhaar => check_aadhaar(value),
            IdentifierKind::Cin => check_cin(value),
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pan" => Ok(IdentifierKind::Pan),
            "gstin" => Ok(IdentifierKind::Gstin),
            "iec" => Ok(IdentifierKind::Iec),
            "fssai" => Ok(IdentifierKind::Fssai),
            "ifsc" => Ok(IdentifierKind::Ifsc),
            "bank_account" => Ok(IdentifierKind::BankAccount),
            "aadhaar" => Ok(IdentifierKind::Aadhaar),
            "cin" => Ok(IdentifierKind::Cin),
            other => Err(format!("Unknown identifier kind '{}'", other)),
        }
    }
}

/// Details recovered from a well-formed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldMetadata {
    PanHolder { holder_type: String },
    GstRegistration { state_code: u8, pan: String },
    Bank { bank_name: String },
    FoodLicense { category: String },
    Company { listed: bool, incorporation_year: u16, state: String },
}

/// A check that involves a second field of the same record.
#[derive(Debug, Clone, Copy)]
pub struct CrossField {
    pub other: &'static str,
    /// Receives (this value, other value), both normalized and well-formed.
    pub check: fn(&str, &str) -> Result<(), String>,
}

#[derive(Debug, Clone, Copy)]
pub struct AutoVerifyRule {
    pub field: &'static str,
    pub kind: IdentifierKind,
    pub min_length: usize,
    pub cross_field: Option<CrossField>,
}

pub static RULES: &[AutoVerifyRule] = &[
    AutoVerifyRule { field: "panNumber", kind: IdentifierKind::Pan, min_length: 10, cross_field: None },
    AutoVerifyRule {
        field: "gstin",
        kind: IdentifierKind::Gstin,
        min_length: 15,
        cross_field: Some(CrossField { other: "panNumber", check: gstin_embeds_pan }),
    },
    AutoVerifyRule {
        field: "iecCode",
        kind: IdentifierKind::Iec,
        min_length: 10,
        cross_field: Some(CrossField { other: "panNumber", check: iec_matches_pan }),
    },
    AutoVerifyRule { field: "fssaiLicenseNumber", kind: IdentifierKind::Fssai, min_length: 14, cross_field: None },
    AutoVerifyRule { field: "ifscCode", kind: IdentifierKind::Ifsc, min_length: 11, cross_field: None },
    AutoVerifyRule { field: "accountNumber", kind: IdentifierKind::BankAccount, min_length: 9, cross_field: None },
    AutoVerifyRule {
        field: "confirmAccountNumber",
        kind: IdentifierKind::BankAccount,
        min_length: 9,
        cross_field: Some(CrossField { other: "accountNumber", check: same_account }),
    },
    AutoVerifyRule { field: "aadhaarNumber", kind: IdentifierKind::Aadhaar, min_length: 12, cross_field: None },
    AutoVerifyRule { field: "cinNumber", kind: IdentifierKind::Cin, min_length: 21, cross_field: None },
];

pub fn rule_for(field: &str) -> Option<&'static AutoVerifyRule> {
    RULES.iter().find(|rule| rule.field == field)
}

/// Rules whose cross-field check reads `field`.
pub fn dependents_of(field: &str) -> impl Iterator<Item = &'static AutoVerifyRule> + '_ {
    RULES
        .iter()
        .filter(move |rule| rule.cross_field.is_some_and(|cross| cross.other == field))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Fewer than `min_length` characters so far; say nothing yet.
    TooShort,
    Passed(Option<FieldMetadata>),
    Failed(String),
}

impl AutoVerifyRule {
    pub fn validate_format(&self, raw: &str, record: &Value) -> RuleOutcome {
        let value = self.kind.normalize(raw);
        if value.chars().count() < self.min_length {
            return RuleOutcome::TooShort;
        }

        let metadata = match self.kind.check(&value) {
            Ok(metadata) => metadata,
            Err(hint) => return RuleOutcome::Failed(hint),
        };

        if let Some(cross) = self.cross_field {
            if let Some(other) = well_formed(cross.other, record) {
                if let Err(hint) = (cross.check)(&value, &other) {
                    return RuleOutcome::Failed(hint);
                }
            }
        }

        RuleOutcome::Passed(metadata)
    }
}

/// The other side of a cross-field check, only when it passes on its own.
fn well_formed(field: &str, record: &Value) -> Option<String> {
    let rule = rule_for(field)?;
    let raw = path::get(record, field)?.as_str()?;
    let value = rule.kind.normalize(raw);
    if value.chars().count() < rule.min_length {
        return None;
    }
    rule.kind.check(&value).ok().map(|_| value)
}

fn check_pan(value: &str) -> Result<Option<FieldMetadata>, String> {
    if !PAN.is_match(value) {
        return Err("PAN must be 5 letters, 4 digits and a letter (e.g. ABCDE1234F)".to_string());
    }
    let holder_type = match value.as_bytes()[3] {
        b'P' => "Individual",
        b'C' => "Company",
        b'H' => "Hindu Undivided Family",
        b'F' => "Firm",
        b'A' => "Association of Persons",
        b'T' => "Trust",
        b'B' => "Body of Individuals",
        b'L' => "Local Authority",
        b'J' => "Artificial Juridical Person",
        b'G' => "Government",
        _ => return Err("The 4th character of a PAN must be a valid holder type".to_string()),
    };
    Ok(Some(FieldMetadata::PanHolder { holder_type: holder_type.to_string() }))
}

fn gst_check_char(body: &[u8]) -> Option<u8> {
    let mut sum = 0usize;
    for (i, c) in body.iter().enumerate() {
        let value = GST_CHARSET.iter().position(|x| x == c)?;
        let product = value * if i % 2 == 0 { 1 } else { 2 };
        sum += product / 36 + product % 36;
    }
    Some(GST_CHARSET[(36 - sum % 36) % 36])
}

fn check_gstin(value: &str) -> Result<Option<FieldMetadata>, String> {
    if !GSTIN.is_match(value) {
        return Err("GSTIN must be 15 characters: state code, PAN, entity number, 'Z' and a check character".to_string());
    }
    let state_code: u8 = value[..2]
        .parse()
        .map_err(|_| "GSTIN must start with a two-digit state code".to_string())?;
    if !matches!(state_code, 1..=38 | 97) {
        return Err(format!("{:02} is not a GST state code", state_code));
    }
    let pan = &value[2..12];
    check_pan(pan).map_err(|_| "GSTIN does not embed a valid PAN".to_string())?;

    let bytes = value.as_bytes();
    if gst_check_char(&bytes[..14]) != Some(bytes[14]) {
        return Err("GSTIN check character does not match".to_string());
    }
    Ok(Some(FieldMetadata::GstRegistration { state_code, pan: pan.to_string() }))
}

fn check_iec(value: &str) -> Result<Option<FieldMetadata>, String> {
    if IEC.is_match(value) {
        Ok(None)
    } else {
        Err("IEC must be 10 characters: your PAN, or a legacy 10-digit code".to_string())
    }
}

fn check_fssai(value: &str) -> Result<Option<FieldMetadata>, String> {
    if !FSSAI.is_match(value) {
        return Err("FSSAI licence numbers are 14 digits".to_string());
    }
    let category = match value.as_bytes()[0] {
        b'1' => "Central License",
        b'2' => "State License",
        b'4' => "Registration",
        _ => {
            return Err(
                "FSSAI numbers start with 1 (central), 2 (state) or 4 (registration)".to_string(),
            );
        }
    };
    Ok(Some(FieldMetadata::FoodLicense { category: category.to_string() }))
}

fn check_ifsc(value: &str) -> Result<Option<FieldMetadata>, String> {
    if !IFSC.is_match(value) {
        return Err("IFSC must be 4 letters, a zero and 6 letters or digits (e.g. HDFC0001234)".to_string());
    }
    let prefix = &value[..4];
    Ok(IFSC_BANKS
        .iter()
        .find(|(code, _)| *code == prefix)
        .map(|(_, bank)| FieldMetadata::Bank { bank_name: bank.to_string() }))
}

fn check_account(value: &str) -> Result<Option<FieldMetadata>, String> {
    if ACCOUNT.is_match(value) {
        Ok(None)
    } else {
        Err("Account numbers are 9 to 18 digits".to_string())
    }
}

const VERHOEFF_D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const VERHOEFF_P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

fn verhoeff_valid(digits: &str) -> bool {
    let mut check = 0usize;
    for (i, c) in digits.bytes().rev().enumerate() {
        let digit = usize::from(c - b'0');
        check = usize::from(VERHOEFF_D[check][usize::from(VERHOEFF_P[i % 8][digit])]);
    }
    check == 0
}

fn check_aadhaar(value: &str) -> Result<Option<FieldMetadata>, String> {
    if !AADHAAR.is_match(value) {
        return Err("Aadhaar numbers are 12 digits and never start with 0 or 1".to_string());
    }
    if !verhoeff_valid(value) {
        return Err("Aadhaar number failed its checksum; please re-check the digits".to_string());
    }
    Ok(None)
}

fn check_cin(value: &str) -> Result<Option<FieldMetadata>, String> {
    let hint = "CIN must look like L17110MH1973PLC019786";
    let captures = CIN.captures(value).ok_or_else(|| hint.to_string())?;

    let year: u16 = captures[4].parse().map_err(|_| hint.to_string())?;
    let current_year = chrono::Utc::now().year();
    if year < 1850 || i32::from(year) > current_year {
        return Err(format!("{} is not a plausible year of incorporation", year));
    }
    if !CIN_OWNERSHIP.contains(&&captures[5]) {
        return Err(format!("{} is not a known company ownership code", &captures[5]));
    }

    Ok(Some(FieldMetadata::Company {
        listed: &captures[1] == "L",
        incorporation_year: year,
        state: captures[3].to_string(),
    }))
}

fn gstin_embeds_pan(gstin: &str, pan: &str) -> Result<(), String> {
    if gstin.get(2..12) == Some(pan) {
        Ok(())
    } else {
        Err("GSTIN does not contain the PAN entered above".to_string())
    }
}

fn iec_matches_pan(iec: &str, pan: &str) -> Result<(), String> {
    if !PAN.is_match(iec) || iec == pan {
        Ok(())
    } else {
        Err("A PAN-based IEC must match the PAN entered above".to_string())
    }
}

fn same_account(confirm: &str, account: &str) -> Result<(), String> {
    if confirm == account {
        Ok(())
    } else {
        Err("Account numbers do not match".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(field: &str, raw: &str, record: Value) -> RuleOutcome {
        rule_for(field).unwrap().validate_format(raw, &record)
    }

    #[test]
    fn pan_reports_holder_type() {
        assert_eq!(
            outcome("panNumber", "aagcb7383j", json!({})),
            RuleOutcome::Passed(Some(FieldMetadata::PanHolder { holder_type: "Company".to_string() }))
        );
        assert!(matches!(outcome("panNumber", "AAGXB7383J", json!({})), RuleOutcome::Failed(_)));
        assert!(matches!(outcome("panNumber", "AAGCB73830", json!({})), RuleOutcome::Failed(_)));
    }

    #[test]
    fn short_input_never_reports_invalid() {
        assert_eq!(outcome("panNumber", "ABC", json!({})), RuleOutcome::TooShort);
        assert_eq!(outcome("gstin", "27A", json!({})), RuleOutcome::TooShort);
        assert_eq!(outcome("ifscCode", "!!!!", json!({})), RuleOutcome::TooShort);
        assert_eq!(outcome("aadhaarNumber", "2345 6789", json!({})), RuleOutcome::TooShort);
    }

    #[test]
    fn gstin_checksum_and_state_code() {
        assert_eq!(
            outcome("gstin", "27AAPFU0939F1ZV", json!({})),
            RuleOutcome::Passed(Some(FieldMetadata::GstRegistration {
                state_code: 27,
                pan: "AAPFU0939F".to_string()
            }))
        );
        assert!(matches!(outcome("gstin", "27AAPFU0939F1ZA", json!({})), RuleOutcome::Failed(_)));
        assert!(matches!(outcome("gstin", "45AAPFU0939F1ZV", json!({})), RuleOutcome::Failed(_)));
        assert_eq!(
            outcome("gstin", "99AAPFU0939F1ZV", json!({})),
            RuleOutcome::Failed("99 is not a GST state code".to_string())
        );
    }

    #[test]
    fn gstin_must_embed_the_entered_pan() {
        let matching = json!({ "panNumber": "AAGCB7383J" });
        assert!(matches!(outcome("gstin", "29AAGCB7383J1Z4", matching), RuleOutcome::Passed(_)));

        let other = json!({ "panNumber": "AAPFU0939F" });
        assert_eq!(
            outcome("gstin", "29AAGCB7383J1Z4", other),
            RuleOutcome::Failed("GSTIN does not contain the PAN entered above".to_string())
        );
    }

    #[test]
    fn cross_field_waits_for_the_other_field_to_be_valid() {
        let partial = json!({ "panNumber": "AAPF" });
        assert!(matches!(outcome("gstin", "29AAGCB7383J1Z4", partial), RuleOutcome::Passed(_)));

        let malformed = json!({ "panNumber": "AAPFU09399" });
        assert!(matches!(outcome("gstin", "29AAGCB7383J1Z4", malformed), RuleOutcome::Passed(_)));
    }

    #[test]
    fn ifsc_resolves_bank_name() {
        assert_eq!(
            outcome("ifscCode", "HDFC0001234", json!({})),
            RuleOutcome::Passed(Some(FieldMetadata::Bank { bank_name: "HDFC Bank".to_string() }))
        );
        assert_eq!(outcome("ifscCode", "ZZZZ0001234", json!({})), RuleOutcome::Passed(None));
        assert!(matches!(outcome("ifscCode", "HDFC1001234", json!({})), RuleOutcome::Failed(_)));
    }

    #[test]
    fn fssai_prefix_selects_category() {
        assert_eq!(
            outcome("fssaiLicenseNumber", "10012345678901", json!({})),
            RuleOutcome::Passed(Some(FieldMetadata::FoodLicense { category: "Central License".to_string() }))
        );
        assert!(matches!(
            outcome("fssaiLicenseNumber", "30012345678901", json!({})),
            RuleOutcome::Failed(_)
        ));
    }

    #[test]
    fn aadhaar_uses_verhoeff() {
        assert_eq!(outcome("aadhaarNumber", "2345 6789 0124", json!({})), RuleOutcome::Passed(None));
        assert_eq!(outcome("aadhaarNumber", "499112345677", json!({})), RuleOutcome::Passed(None));
        assert!(matches!(outcome("aadhaarNumber", "499112345678", json!({})), RuleOutcome::Failed(_)));
        assert!(matches!(outcome("aadhaarNumber", "123456789012", json!({})), RuleOutcome::Failed(_)));
    }

    #[test]
    fn confirm_account_must_match() {
        let record = json!({ "accountNumber": "50100123456789" });
        assert_eq!(outcome("confirmAccountNumber", "50100123456789", record.clone()), RuleOutcome::Passed(None));
        assert!(matches!(
            outcome("confirmAccountNumber", "50100123456780", record),
            RuleOutcome::Failed(_)
        ));
    }

    #[test]
    fn pan_based_iec_must_match_pan() {
        let record = json!({ "panNumber": "AAGCB7383J" });
        assert_eq!(outcome("iecCode", "AAGCB7383J", record.clone()), RuleOutcome::Passed(None));
        assert_eq!(outcome("iecCode", "0512345678", record.clone()), RuleOutcome::Passed(None));
        assert!(matches!(outcome("iecCode", "AAPFU0939F", record), RuleOutcome::Failed(_)));
    }

    #[test]
    fn cin_reports_listing_and_year() {
        assert_eq!(
            outcome("cinNumber", "L17110MH1973PLC019786", json!({})),
            RuleOutcome::Passed(Some(FieldMetadata::Company {
                listed: true,
                incorporation_year: 1973,
                state: "MH".to_string()
            }))
        );
        assert!(matches!(outcome("cinNumber", "L17110MH1973XYZ019786", json!({})), RuleOutcome::Failed(_)));
    }

    #[test]
    fn pan_edits_reach_dependent_rules() {
        let mut fields: Vec<&str> = dependents_of("panNumber").map(|rule| rule.field).collect();
        fields.sort();
        assert_eq!(fields, vec!["gstin", "iecCode"]);
    }
}
