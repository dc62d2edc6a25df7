use regex::Regex;
use std::sync::LazyLock;

static MOBILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[6-9]\d{9}$").unwrap());
static PINCODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9]\d{5}$").unwrap());
static FLOW_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,63}$").unwrap());

pub fn validate_mobile(mobile: &str) -> bool {
    MOBILE.is_match(mobile)
}

pub fn validate_pincode(pincode: &str) -> bool {
    PINCODE.is_match(pincode)
}

/// Draft keys: lowercase slugs such as `seller-verification`.
pub fn validate_flow_name(name: &str) -> bool {
    FLOW_NAME.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobiles() {
        assert!(validate_mobile("9876543210"));
        assert!(!validate_mobile("5876543210"));
        assert!(!validate_mobile("98765"));
    }

    #[test]
    fn pincodes() {
        assert!(validate_pincode("411001"));
        assert!(!validate_pincode("011001"));
        assert!(!validate_pincode("41100"));
    }

    #[test]
    fn flow_names_are_slugs() {
        assert!(validate_flow_name("seller-verification"));
        assert!(validate_flow_name("checkout"));
        assert!(!validate_flow_name("Seller"));
        assert!(!validate_flow_name("../etc"));
        assert!(!validate_flow_name(""));
    }
}
