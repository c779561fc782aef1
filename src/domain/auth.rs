use crate::domain::user::{Actor, Role};
use crate::error::{AppError, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Claims of the bearer tokens issued by the main backend.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn new(actor: Actor, ttl_secs: i64) -> Self {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + ttl_secs;
        Self { sub: actor.id, role: actor.role, exp }
    }

    /// Signs the claims with HS256.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if encoding fails.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes())).map_err(|_| AppError::Internal)
    }

    /// Verifies signature and expiry.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` if the token is malformed, forged or expired.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        let token_data = decode::<Self>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
            .map_err(|_| AppError::AuthError)?;

        Ok(token_data.claims)
    }

    #[must_use]
    pub const fn actor(&self) -> Actor {
        Actor { id: self.sub, role: self.role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_carries_actor() {
        let token = Claims::new(Actor::admin(9), 60).encode("secret").unwrap();
        let claims = Claims::decode(&token, "secret").unwrap();
        assert_eq!(claims.actor(), Actor::admin(9));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = Claims::new(Actor::user(5), 60).encode("secret").unwrap();
        assert!(matches!(Claims::decode(&token, "other"), Err(AppError::AuthError)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = Claims::new(Actor::user(5), -3600).encode("secret").unwrap();
        assert!(matches!(Claims::decode(&token, "secret"), Err(AppError::AuthError)));
    }
}
