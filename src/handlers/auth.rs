use axum::{
    extract::State,
    http::{header, HeaderMap},
};
use serde_json::{json, Value};

use super::extract::{ApiJson, ApiPath};
use crate::app::AppState;
use crate::auth::{CookieConfig, LOGGED_OUT};
use crate::database::models::USER_SCHEMA;
use crate::database::schema::Document;
use crate::error::ApiResult;
use crate::middleware::{ApiResponse, CurrentUser};
use crate::services::Session;

/// Token in the body and in the `jwt` cookie, public user under `data.user`
fn send_token(state: &AppState, session: Session, respond: fn(Value) -> ApiResponse) -> ApiResponse {
    let cookie = CookieConfig::session(&state.config.security).header_value(&session.token);
    let user = USER_SCHEMA.to_public(session.user);

    respond(json!({ "user": user }))
        .token(session.token)
        .cookie(cookie)
}

fn body_str<'a>(body: &'a Document, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

/// POST /users/signup
pub async fn signup(State(state): State<AppState>, ApiJson(body): ApiJson<Document>) -> ApiResult<ApiResponse> {
    let session = state.auth().signup(body).await?;
    Ok(send_token(&state, session, ApiResponse::created))
}

/// POST /users/login
pub async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<Document>) -> ApiResult<ApiResponse> {
    let session = state
        .auth()
        .login(body_str(&body, "email"), body_str(&body, "password"))
        .await?;
    Ok(send_token(&state, session, ApiResponse::success))
}

/// GET /users/logout
pub async fn logout(State(state): State<AppState>) -> ApiResponse {
    ApiResponse::ok().cookie(CookieConfig::logout(&state.config.security).header_value(LOGGED_OUT))
}

/// POST /users/forgotPassword
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = if state.config.security.secure_cookies { "https" } else { "http" };
    let reset_url = format!("{}://{}/api/v1/users/resetPassword", scheme, host);

    state.auth().forgot_password(body_str(&body, "email"), &reset_url).await?;
    Ok(ApiResponse::message("Token sent to email!"))
}

/// PATCH /users/resetPassword/:token
pub async fn reset_password(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    let session = state.auth().reset_password(&token, &body).await?;
    Ok(send_token(&state, session, ApiResponse::success))
}

/// PATCH /users/updateMyPassword
pub async fn update_my_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    let session = state.auth().update_password(user.id, &body).await?;
    Ok(send_token(&state, session, ApiResponse::success))
}
