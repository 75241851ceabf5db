//! HS256 access tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::config::JwtConfig;
use crate::domain::value_objects::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Option<Role>,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys derived from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(config.ttl_hours),
        }
    }

    /// Issue a token for a user with their current role.
    pub fn issue(&self, user_id: Uuid, role: Option<Role>) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = Claims { sub: user_id, role, iat: now.timestamp(), exp: (now + self.ttl).timestamp() };
        self.sign(&claims).map(|token| IssuedToken { token, token_type: "Bearer", expires_in: self.ttl.num_seconds() })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|_| AuthError::TokenCreation)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn keys(secret: &str) -> TokenKeys {
        TokenKeys::new(&JwtConfig { secret: SecretString::from(secret.to_string()), ttl_hours: 1 })
    }

    #[test]
    fn test_round_trip() {
        let keys = keys("0123456789abcdef0123456789abcdef");
        let user = Uuid::new_v4();
        let issued = keys.issue(user, Some(Role::Seller)).unwrap();
        assert_eq!(issued.expires_in, 3600);
        let claims = keys.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Some(Role::Seller));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = keys("0123456789abcdef0123456789abcdef").issue(Uuid::new_v4(), None).unwrap();
        assert!(matches!(keys("fedcba9876543210fedcba9876543210").verify(&issued.token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_rejected() {
        let keys = keys("0123456789abcdef0123456789abcdef");
        let past = Utc::now() - Duration::hours(2);
        let token = keys
            .sign(&Claims { sub: Uuid::new_v4(), role: None, iat: past.timestamp(), exp: (past + Duration::minutes(5)).timestamp() })
            .unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken)));
    }
}
