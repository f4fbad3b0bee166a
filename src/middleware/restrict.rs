use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::CurrentUser;
use crate::database::models::Role;
use crate::error::{ApiError, ApiResult};

pub const ADMIN: &[Role] = &[Role::Admin];
pub const ADMIN_OR_LEAD_GUIDE: &[Role] = &[Role::Admin, Role::LeadGuide];
pub const REVIEWER: &[Role] = &[Role::User];
pub const REVIEW_EDITOR: &[Role] = &[Role::User, Role::Admin];

pub fn authorize(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

/// Role gate; must run after `protect`
pub async fn restrict_to(allowed: &'static [Role], request: Request, next: Next) -> ApiResult<Response> {
    let CurrentUser(user) = request
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("You are not logged in. Please log in to get access."))?;

    if !authorize(user.role, allowed) {
        tracing::debug!("Role {} denied; needs one of {:?}", user.role, allowed);
        return Err(ApiError::forbidden("You do not have permission to perform this action."));
    }
    Ok(next.run(request).await)
}
