use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::verification::Flow;

/// Role carried in the access token. Users are owned by the identity
/// service; this crate only reads the claim.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Role {
    /// Admins may open either flow; everyone else only their own.
    pub fn can_open(self, flow: Flow) -> bool {
        match self {
            Role::Admin => true,
            Role::Seller => flow == Flow::Seller,
            Role::Buyer => flow == Flow::Buyer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_map_to_their_flow() {
        assert!(Role::Seller.can_open(Flow::Seller));
        assert!(!Role::Seller.can_open(Flow::Buyer));
        assert!(Role::Buyer.can_open(Flow::Buyer));
        assert!(Role::Admin.can_open(Flow::Seller));
    }
}
