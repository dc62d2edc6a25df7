use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::utils::validation::{validate_mobile, validate_pincode};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Address {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub owner_id: ObjectId,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub apartment: Option<String>,
    pub company: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub is_default: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[validate(schema(function = "validate_indian_address", skip_on_field_errors = false))]
pub struct AddressDto {
    #[validate(length(min = 1, max = 60, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 60, message = "last name is required"))]
    pub last_name: String,
    #[validate(length(min = 3, max = 200, message = "street must be 3-200 characters"))]
    pub street: String,
    #[validate(length(max = 100))]
    pub apartment: Option<String>,
    #[validate(length(max = 100))]
    pub company: Option<String>,
    #[validate(length(min = 2, max = 80, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 2, max = 80, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 3, max = 12, message = "postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 60, message = "country is required"))]
    pub country: String,
    #[validate(length(min = 7, max = 15, message = "phone is required"))]
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressDto {
    pub fn is_india(&self) -> bool {
        is_india(&self.country)
    }
}

fn is_india(country: &str) -> bool {
    matches!(country.trim().to_ascii_lowercase().as_str(), "india" | "in" | "ind")
}

/// Indian addresses carry a six-digit pincode and a ten-digit mobile.
fn validate_indian_address(dto: &AddressDto) -> Result<(), ValidationError> {
    if !dto.is_india() {
        return Ok(());
    }
    if !validate_pincode(dto.postal_code.trim()) {
        let mut err = ValidationError::new("pincode");
        err.message = Some("postal code must be a 6 digit pincode".into());
        return Err(err);
    }
    let phone = dto.phone.trim().trim_start_matches("+91").trim();
    if !validate_mobile(phone) {
        let mut err = ValidationError::new("mobile");
        err.message = Some("phone must be a 10 digit Indian mobile number".into());
        return Err(err);
    }
    Ok(())
}

impl Address {
    pub fn from_dto(owner_id: ObjectId, dto: AddressDto, is_default: bool) -> Self {
        Address {
            id: None,
            owner_id,
            first_name: dto.first_name.trim().to_string(),
            last_name: dto.last_name.trim().to_string(),
            street: dto.street.trim().to_string(),
            apartment: dto.apartment.filter(|s| !s.trim().is_empty()),
            company: dto.company.filter(|s| !s.trim().is_empty()),
            city: dto.city.trim().to_string(),
            state: dto.state.trim().to_string(),
            postal_code: dto.postal_code.trim().to_string(),
            country: dto.country.trim().to_string(),
            phone: dto.phone.trim().to_string(),
            is_default,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub apartment: Option<String>,
    pub company: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub is_default: bool,
}

impl From<Address> for AddressResponse {
    fn from(address: Address) -> Self {
        AddressResponse {
            id: address.id.map(|id| id.to_hex()).unwrap_or_default(),
            first_name: address.first_name,
            last_name: address.last_name,
            street: address.street,
            apartment: address.apartment,
            company: address.company,
            city: address.city,
            state: address.state,
            postal_code: address.postal_code,
            country: address.country,
            phone: address.phone,
            is_default: address.is_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(country: &str, postal_code: &str, phone: &str) -> AddressDto {
        AddressDto {
            first_name: "Asha".to_string(),
            last_name: "Patil".to_string(),
            street: "14 MG Road".to_string(),
            apartment: None,
            company: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            postal_code: postal_code.to_string(),
            country: country.to_string(),
            phone: phone.to_string(),
            is_default: false,
        }
    }

    #[test]
    fn indian_address_needs_pincode_and_mobile() {
        assert!(dto("India", "411001", "9876543210").validate().is_ok());
        assert!(dto("IN", "411001", "+91 9876543210").validate().is_ok());
        assert!(dto("India", "4110", "9876543210").validate().is_err());
        assert!(dto("India", "411001", "1234567890").validate().is_err());
    }

    #[test]
    fn other_countries_skip_indian_checks() {
        assert!(dto("Germany", "10115", "+4930123456").validate().is_ok());
    }

    #[test]
    fn missing_required_fields_fail() {
        let mut bad = dto("India", "411001", "9876543210");
        bad.first_name = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn blank_optional_lines_are_dropped() {
        let mut input = dto("India", "411001", "9876543210");
        input.apartment = Some("  ".to_string());
        let address = Address::from_dto(ObjectId::new(), input, true);
        assert_eq!(address.apartment, None);
        assert!(address.is_default);
    }
}
