use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Owner ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Tokens are minted by the identity service; issuing here is for tooling
/// and tests that need a bearer token signed with the shared secret.
pub struct JwtService;

impl JwtService {
    pub fn generate_access_token(owner_id: &ObjectId, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let expiry = crate::config::Config::jwt_expiry();
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            sub: owner_id.to_hex(),
            role,
            exp: now + expiry,
            iat: now,
        };

        let secret = crate::config::Config::jwt_secret();
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = crate::config::Config::jwt_secret();

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_carry_owner_and_role() {
        let owner = ObjectId::new();
        let token = JwtService::generate_access_token(&owner, Role::Seller).unwrap();
        let claims = JwtService::verify_token(&token).unwrap();
        assert_eq!(claims.sub, owner.to_hex());
        assert_eq!(claims.role, Role::Seller);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let token = JwtService::generate_access_token(&ObjectId::new(), Role::Admin).unwrap();
        assert!(JwtService::verify_token(&format!("{}x", token)).is_err());
    }
}
