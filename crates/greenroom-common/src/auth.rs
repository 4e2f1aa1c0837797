//! Shared JWT authentication utilities.
//!
//! The identity provider mints access tokens; the signaling layer only ever
//! validates them. Claims live here so any crate can decode a token without
//! pulling in the HTTP identity gate.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims embedded in access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as string)
    pub sub: String,
    /// Email of the user, if the provider includes it
    #[serde(default)]
    pub email: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Validate and decode a JWT token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(secret: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "user-1".into(),
            email: Some("host@example.com".into()),
            iat: now,
            exp: now + exp_offset,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("should encode token")
    }

    #[test]
    fn test_validate_round_trip() {
        let token = mint("secret", 3600);
        let claims = validate_token(&token, "secret").expect("should validate");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("host@example.com"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = mint("secret", 3600);
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = mint("secret", -3600);
        assert!(validate_token(&token, "secret").is_err());
    }
}
