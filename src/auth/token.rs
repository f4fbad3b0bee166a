use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;

/// JWT payload: `id` is the user the token was issued to
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("JWT generation error: {0}")]
    Generation(String),
}

/// Identity carried by a token that passed signature and expiry checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: Uuid,
    pub issued_at: i64,
}

/// Issues and verifies HS256 session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl TokenService {
    pub fn new(security: &SecurityConfig) -> Result<Self, TokenError> {
        let secret = security.jwt_secret.trim();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::hours(security.jwt_expiry_hours as i64),
        })
    }

    pub fn issue(&self, subject: Uuid) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    fn issue_at(&self, subject: Uuid, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            id: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;

        let subject = Uuid::parse_str(&data.claims.id)
            .map_err(|_| TokenError::Invalid(format!("malformed subject: {}", data.claims.id)))?;

        Ok(VerifiedToken {
            subject,
            issued_at: data.claims.iat,
        })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("expiry_hours", &self.expiry.num_hours())
            .finish_non_exhaustive()
    }
}

/// True when the password changed after the token was issued (whole seconds)
pub fn changed_password_after(last_change: Option<DateTime<Utc>>, issued_at: i64) -> bool {
    match last_change {
        Some(changed_at) => changed_at.timestamp() > issued_at,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn service() -> TokenService {
        TokenService::new(&AppConfig::testing().security).unwrap()
    }

    #[test]
    fn issued_token_verifies_to_same_subject() {
        let service = service();
        let id = Uuid::new_v4();
        let token = service.issue(id).unwrap();
        let verified = service.verify(&token).unwrap();
        assert_eq!(verified.subject, id);
        assert!(verified.issued_at <= Utc::now().timestamp());
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let service = service();
        let long_ago = Utc::now() - Duration::days(400);
        let token = service.issue_at(Uuid::new_v4(), long_ago).unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let service = service();
        let mut token = service.issue(Uuid::new_v4()).unwrap();
        token.push('x');
        assert!(matches!(service.verify(&token), Err(TokenError::Invalid(_))));
        assert!(matches!(service.verify("not-a-jwt"), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn token_from_other_secret_is_invalid() {
        let mut other = AppConfig::testing();
        other.security.jwt_secret = "another-secret-entirely-for-this-test".into();
        let foreign = TokenService::new(&other.security).unwrap();
        let token = foreign.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(service().verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn missing_secret_is_refused() {
        let mut config = AppConfig::testing();
        config.security.jwt_secret = "  ".into();
        assert!(matches!(TokenService::new(&config.security), Err(TokenError::MissingSecret)));
    }

    #[test]
    fn password_change_comparison_is_strict_in_seconds() {
        let issued = Utc::now().timestamp();
        let same_second = DateTime::from_timestamp(issued, 900_000_000).unwrap();
        let later = DateTime::from_timestamp(issued + 1, 0).unwrap();
        let earlier = DateTime::from_timestamp(issued - 1, 0).unwrap();

        assert!(!changed_password_after(None, issued));
        assert!(!changed_password_after(Some(same_second), issued));
        assert!(!changed_password_after(Some(earlier), issued));
        assert!(changed_password_after(Some(later), issued));
    }
}
