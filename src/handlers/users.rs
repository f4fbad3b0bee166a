use axum::extract::State;
use serde_json::json;

use super::extract::ApiJson;
use super::factory::find_document;
use crate::app::AppState;
use crate::database::models::{User, USER_SCHEMA};
use crate::database::schema::Document;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{ApiResponse, CurrentUser};

/// GET /users/me
pub async fn get_me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<ApiResponse> {
    let document = find_document::<User>(&state, &user.id.to_string()).await?;
    Ok(ApiResponse::success(json!({ "document": document })))
}

/// PATCH /users/updateMe
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    let updated = state.auth().update_me(user.id, body).await?;
    Ok(ApiResponse::message("User data updated successfully").data(json!({ "user": USER_SCHEMA.to_public(updated) })))
}

/// DELETE /users/deleteMe
pub async fn delete_me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<ApiResponse> {
    state.auth().delete_me(user.id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /users; accounts are only created through signup
pub async fn create_user() -> ApiError {
    ApiError::internal_server_error("This route is not defined! Please use /signup instead")
}
