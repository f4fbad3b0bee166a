use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// Compare a candidate against a stored bcrypt hash
pub fn verify_password(candidate: &str, hash: &str) -> Result<bool, PasswordError> {
    Ok(bcrypt::verify(candidate, hash)?)
}
