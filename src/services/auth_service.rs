use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{create_reset_token, hash_reset_token, verify_password, TokenService};
use crate::config::SecurityConfig;
use crate::database::models::User;
use crate::database::schema::{format_timestamp, parse_timestamp, Document};
use crate::database::Repository;
use crate::error::{ApiError, ApiResult};
use crate::services::mailer::{password_reset_email, welcome_email, Mailer};

/// Fields a visitor may supply when signing up; role and flags are never taken from input
const SIGNUP_FIELDS: &[&str] = &["name", "email", "password", "passwordConfirm"];

/// Fields `updateMe` applies; everything else in the body is ignored
const PROFILE_FIELDS: &[&str] = &["name", "email"];

/// A stored user together with a freshly issued session token
#[derive(Debug, Clone)]
pub struct Session {
    pub user: Document,
    pub token: String,
}

/// Credential flows on top of the users repository
pub struct AuthService {
    users: Repository<User>,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(users: Repository<User>, tokens: TokenService, mailer: Arc<dyn Mailer>, security: SecurityConfig) -> Self {
        Self {
            users,
            tokens,
            mailer,
            security,
        }
    }

    pub async fn signup(&self, input: Document) -> ApiResult<Session> {
        let fields = pick(input, SIGNUP_FIELDS);
        let user = self.users.insert(fields).await?;
        tracing::info!("New user signed up: {}", user_id(&user)?);

        let (name, email) = (str_field(&user, "name"), str_field(&user, "email"));
        if let Err(e) = self.mailer.send(welcome_email(name, email)).await {
            tracing::warn!("Welcome mail to {} not sent: {}", email, e);
        }

        self.session(user)
    }

    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> ApiResult<Session> {
        let (email, password) = match (email, password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => (email, password),
            _ => return Err(ApiError::bad_request("Please provide email and password")),
        };

        let user = self.users.find_one(json!({ "email": email.trim().to_lowercase() })).await?;
        match user {
            Some(user) if check_password(password, &user).await? => self.session(user),
            _ => Err(ApiError::unauthorized("Incorrect email or password")),
        }
    }

    /// Store a hashed reset token and mail the plain one. If the mail cannot
    /// be sent the token is withdrawn again.
    pub async fn forgot_password(&self, email: Option<&str>, reset_base_url: &str) -> ApiResult<()> {
        let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
        let user = self
            .users
            .find_one(json!({ "email": email }))
            .await?
            .ok_or_else(|| ApiError::not_found("There is no user with that email address."))?;
        let id = user_id(&user)?;

        let reset = create_reset_token(self.security.reset_token_ttl_minutes);
        self.users
            .update(
                id,
                document(json!({
                    "passwordResetToken": reset.hashed,
                    "passwordResetExpires": format_timestamp(reset.expires_at),
                })),
            )
            .await?;

        let url = format!("{}/{}", reset_base_url.trim_end_matches('/'), reset.plain);
        let mail = password_reset_email(str_field(&user, "name"), &email, &url, self.security.reset_token_ttl_minutes);
        if let Err(e) = self.mailer.send(mail).await {
            tracing::error!("Reset mail to {} failed: {}", email, e);
            if let Err(e) = self.users.update(id, clear_reset_token()).await {
                tracing::warn!("Could not withdraw reset token for {}: {}", id, e);
            }
            return Err(ApiError::internal_server_error(
                "There was an error sending the email. Try again later!",
            ));
        }
        Ok(())
    }

    /// Set a new password from a mailed token; the token is consumed
    pub async fn reset_password(&self, plain_token: &str, body: &Document) -> ApiResult<Session> {
        let hashed = hash_reset_token(plain_token);
        let user = self
            .users
            .find_one(json!({ "passwordResetToken": hashed }))
            .await?
            .filter(|user| {
                user.get("passwordResetExpires")
                    .and_then(parse_timestamp)
                    .map(|expires| expires > Utc::now())
                    .unwrap_or(false)
            })
            .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired."))?;

        let mut changes = password_changes(body);
        changes.extend(clear_reset_token());
        let user = self.users.update(user_id(&user)?, changes).await?;
        self.session(user)
    }

    /// Change the caller's password after re-checking the current one
    pub async fn update_password(&self, id: Uuid, body: &Document) -> ApiResult<Session> {
        let user = self
            .users
            .find_active(id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("The user belonging to this token no longer exist."))?;

        let current = body.get("passwordCurrent").and_then(Value::as_str).unwrap_or_default();
        if !check_password(current, &user).await? {
            return Err(ApiError::unauthorized("Incorrect password"));
        }

        let user = self.users.update(id, password_changes(body)).await?;
        self.session(user)
    }

    /// Profile edits only; passwords have dedicated routes
    pub async fn update_me(&self, id: Uuid, body: Document) -> ApiResult<Document> {
        if body.contains_key("password") || body.contains_key("passwordConfirm") {
            return Err(ApiError::bad_request(
                "This route is not for password updates. Please use /updateMyPassword.",
            ));
        }
        self.users.update(id, pick(body, PROFILE_FIELDS)).await
    }

    /// Deactivate; the document stays but every read skips it
    pub async fn delete_me(&self, id: Uuid) -> ApiResult<()> {
        self.users.update(id, document(json!({ "active": false }))).await?;
        tracing::info!("User {} deactivated their account", id);
        Ok(())
    }

    fn session(&self, user: Document) -> ApiResult<Session> {
        let token = self.tokens.issue(user_id(&user)?)?;
        Ok(Session { user, token })
    }
}

async fn check_password(candidate: &str, user: &Document) -> ApiResult<bool> {
    let hash = match user.get("password").and_then(Value::as_str) {
        Some(hash) => hash.to_string(),
        None => return Ok(false),
    };
    let candidate = candidate.to_string();

    tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
        .await
        .map_err(ApiError::unexpected)?
        .map_err(ApiError::from)
}

fn password_changes(body: &Document) -> Document {
    let mut changes = Document::new();
    for key in ["password", "passwordConfirm"] {
        changes.insert(key.to_string(), body.get(key).cloned().unwrap_or(Value::Null));
    }
    changes
}

fn clear_reset_token() -> Document {
    document(json!({ "passwordResetToken": null, "passwordResetExpires": null }))
}

fn pick(input: Document, keys: &[&str]) -> Document {
    input.into_iter().filter(|(key, _)| keys.contains(&key.as_str())).collect()
}

fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn str_field<'a>(doc: &'a Document, key: &str) -> &'a str {
    doc.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn user_id(doc: &Document) -> ApiResult<Uuid> {
    crate::database::store::document_id(doc).map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::ErrorKind;
    use crate::services::mailer::{Email, MailerError};
    use crate::testing::{seeded_store, standard_pipeline};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Mailer for Outbox {
        async fn send(&self, email: Email) -> Result<(), MailerError> {
            if self.fail {
                return Err(MailerError::Delivery("smtp down".into()));
            }
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }

    async fn service(outbox: Arc<Outbox>) -> (AuthService, Repository<User>) {
        let config = AppConfig::testing();
        let users = Repository::new(seeded_store().await, standard_pipeline());
        let tokens = TokenService::new(&config.security).unwrap();
        (AuthService::new(users.clone(), tokens, outbox, config.security), users)
    }

    fn signup_body(email: &str) -> Document {
        document(json!({
            "name": "Lou Ellis",
            "email": email,
            "password": "pass1234",
            "passwordConfirm": "pass1234",
            "role": "admin"
        }))
    }

    #[tokio::test]
    async fn signup_ignores_role_and_sends_welcome() {
        let outbox = Arc::new(Outbox::default());
        let (auth, _) = service(outbox.clone()).await;

        let session = auth.signup(signup_body("LOU@example.io")).await.unwrap();
        assert_eq!(session.user["role"], json!("user"));
        assert_eq!(session.user["email"], json!("lou@example.io"));
        assert_eq!(outbox.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_messages() {
        let (auth, _) = service(Arc::new(Outbox::default())).await;
        auth.signup(signup_body("lou@example.io")).await.unwrap();

        let err = auth.login(Some("lou@example.io"), None).await.unwrap_err();
        assert_eq!(err.message(), "Please provide email and password");

        let err = auth.login(Some("lou@example.io"), Some("wrongpass")).await.unwrap_err();
        assert_eq!((err.kind(), err.message()), (ErrorKind::Unauthorized, "Incorrect email or password"));

        let err = auth.login(Some("nobody@example.io"), Some("pass1234")).await.unwrap_err();
        assert_eq!(err.message(), "Incorrect email or password");

        assert!(auth.login(Some(" Lou@Example.io "), Some("pass1234")).await.is_ok());
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let outbox = Arc::new(Outbox::default());
        let (auth, _) = service(outbox.clone()).await;
        auth.signup(signup_body("lou@example.io")).await.unwrap();

        auth.forgot_password(Some("lou@example.io"), "http://localhost/api/v1/users/resetPassword")
            .await
            .unwrap();
        let mail = outbox.sent.lock().unwrap().last().cloned().unwrap();
        let plain = mail.body.split("/resetPassword/").nth(1).unwrap().split_whitespace().next().unwrap().to_string();

        let body = document(json!({ "password": "newpass123", "passwordConfirm": "newpass123" }));
        let session = auth.reset_password(&plain, &body).await.unwrap();
        assert!(session.user.get("passwordResetToken").is_none());
        assert!(session.user.get("passwordChangedAt").is_some());
        assert!(auth.login(Some("lou@example.io"), Some("newpass123")).await.is_ok());

        let err = auth.reset_password(&plain, &body).await.unwrap_err();
        assert_eq!(err.message(), "Token is invalid or has expired.");
    }

    #[tokio::test]
    async fn failed_reset_mail_withdraws_the_token() {
        let (auth, users) = service(Arc::new(Outbox { fail: true, ..Default::default() })).await;
        let session = auth.signup(signup_body("lou@example.io")).await.unwrap();

        let err = auth.forgot_password(Some("lou@example.io"), "http://h/reset").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "There was an error sending the email. Try again later!");

        let stored = users.find_active(user_id(&session.user).unwrap()).await.unwrap().unwrap();
        assert!(stored.get("passwordResetToken").is_none());
        assert!(stored.get("passwordResetExpires").is_none());

        let err = auth.forgot_password(Some("ghost@example.io"), "http://h/reset").await.unwrap_err();
        assert_eq!(err.message(), "There is no user with that email address.");
    }

    #[tokio::test]
    async fn update_password_checks_the_current_one() {
        let (auth, _) = service(Arc::new(Outbox::default())).await;
        let session = auth.signup(signup_body("lou@example.io")).await.unwrap();
        let id = user_id(&session.user).unwrap();

        let body = document(json!({ "passwordCurrent": "nope", "password": "newpass123", "passwordConfirm": "newpass123" }));
        assert_eq!(auth.update_password(id, &body).await.unwrap_err().message(), "Incorrect password");

        let body = document(json!({ "passwordCurrent": "pass1234", "password": "newpass123", "passwordConfirm": "other123" }));
        assert_eq!(auth.update_password(id, &body).await.unwrap_err().kind(), ErrorKind::ValidationError);

        let body = document(json!({ "passwordCurrent": "pass1234", "password": "newpass123", "passwordConfirm": "newpass123" }));
        assert!(auth.update_password(id, &body).await.is_ok());
    }

    #[tokio::test]
    async fn update_me_refuses_passwords_and_filters_fields() {
        let (auth, _) = service(Arc::new(Outbox::default())).await;
        let session = auth.signup(signup_body("lou@example.io")).await.unwrap();
        let id = user_id(&session.user).unwrap();

        let err = auth.update_me(id, document(json!({ "password": "x" }))).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let updated = auth.update_me(id, document(json!({ "name": "Lou E.", "role": "admin" }))).await.unwrap();
        assert_eq!(updated["name"], json!("Lou E."));
        assert_eq!(updated["role"], json!("user"));

        auth.delete_me(id).await.unwrap();
        let err = auth.login(Some("lou@example.io"), Some("pass1234")).await.unwrap_err();
        assert_eq!(err.message(), "Incorrect email or password");
    }
}
