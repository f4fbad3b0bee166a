use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A freshly minted password reset token. Only `hashed` is persisted; `plain`
/// goes out in the reset mail.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub plain: String,
    pub hashed: String,
    pub expires_at: DateTime<Utc>,
}

pub fn create_reset_token(ttl_minutes: i64) -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);

    ResetToken {
        hashed: hash_reset_token(&plain),
        plain,
        expires_at: Utc::now() + Duration::minutes(ttl_minutes),
    }
}

pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}
