use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::Tour;
use crate::error::{ApiError, ApiResult};
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, CurrentUser};

/// GET / - every tour, plus the visitor when a session cookie is valid
pub async fn overview(State(state): State<AppState>, user: Option<CurrentUser>) -> ApiResult<ApiResponse> {
    let repo = state.repo::<Tour>();
    let filter = FilterData {
        order: Some(json!("-createdAt,id")),
        ..Default::default()
    };
    let tours: Vec<Value> = repo
        .find(&filter)
        .await?
        .into_iter()
        .map(|doc| Value::Object(repo.schema().to_public(doc)))
        .collect();

    let mut data = json!({ "tours": tours });
    if let Some(CurrentUser(user)) = user {
        data["user"] = serde_json::to_value(&user)?;
    }
    Ok(ApiResponse::success(data))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "store": backend,
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed on {} store: {}", backend, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "store unavailable",
                    "data": { "status": "degraded", "timestamp": now, "store": backend }
                })),
            )
                .into_response()
        }
    }
}

pub async fn not_found(uri: Uri) -> ApiError {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or_else(|| uri.path());
    ApiError::not_found(format!("Can't find {} on this server", path))
}

