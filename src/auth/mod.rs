// Credential primitives: session tokens, password hashing, reset tokens and the session cookie
pub mod cookie;
pub mod password;
pub mod reset_token;
pub mod token;

pub use cookie::{extract_cookie, CookieConfig, SameSite, LOGGED_OUT, SESSION_COOKIE};
pub use password::{hash_password, verify_password, PasswordError};
pub use reset_token::{create_reset_token, hash_reset_token, ResetToken};
pub use token::{changed_password_after, Claims, TokenError, TokenService, VerifiedToken};
