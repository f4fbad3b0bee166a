use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{changed_password_after, extract_cookie, LOGGED_OUT, SESSION_COOKIE};
use crate::database::models::User;
use crate::error::{ApiError, ApiResult};

/// Authenticated caller, attached to request extensions by `protect` and `is_logged_in`
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("You are not logged in. Please log in to get access."))
    }
}

/// Require a valid session: Bearer header first, then the `jwt` cookie
pub async fn protect(State(state): State<AppState>, mut request: Request, next: Next) -> ApiResult<Response> {
    let token = bearer_token(request.headers())
        .or_else(|| session_cookie(request.headers()))
        .ok_or_else(|| ApiError::unauthorized("You are not logged in. Please log in to get access."))?;

    let user = authenticate(&state, &token).await?;
    tracing::debug!("Authenticated {} ({})", user.id, user.role);

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Attach the caller when the session cookie is valid; never rejects
pub async fn is_logged_in(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = session_cookie(request.headers()) {
        match authenticate(&state, &token).await {
            Ok(user) => {
                request.extensions_mut().insert(CurrentUser(user));
            }
            Err(e) => tracing::debug!("Ignoring session cookie: {}", e),
        }
    }
    next.run(request).await
}

/// Verify the token, load the active user and reject tokens older than the last password change
pub async fn authenticate(state: &AppState, token: &str) -> ApiResult<User> {
    let verified = state.tokens.verify(token)?;

    let doc = state
        .users()
        .find_active(verified.subject)
        .await?
        .ok_or_else(|| ApiError::unauthorized("The user belonging to this token no longer exist."))?;
    let user = User::from_document(&doc)?;

    if changed_password_after(user.password_changed_at, verified.issued_at) {
        return Err(ApiError::unauthorized("User recently changed password! Please log in again."));
    }
    Ok(user)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, SESSION_COOKIE).filter(|value| !value.is_empty() && value != LOGGED_OUT)
}
