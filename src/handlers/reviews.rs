use axum::extract::State;
use serde_json::{json, Map, Value};

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::factory::{create_document, list_documents};
use crate::app::AppState;
use crate::database::models::Review;
use crate::database::schema::Document;
use crate::database::store::parse_id;
use crate::error::ApiResult;
use crate::middleware::{ApiResponse, CurrentUser};

/// POST /reviews
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    create(&state, body, None, &user.id.to_string()).await
}

/// POST /tours/:id/reviews
pub async fn create_tour_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(tour_id): ApiPath<String>,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    let tour_id = parse_id(&tour_id)?.to_string();
    create(&state, body, Some(tour_id), &user.id.to_string()).await
}

/// GET /tours/:id/reviews
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    ApiPath(tour_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<ApiResponse> {
    let mut parent = Map::new();
    parent.insert("tour".to_string(), Value::String(parse_id(&tour_id)?.to_string()));
    list_documents::<Review>(&state, &query, Some(parent)).await
}

/// Missing `tour` comes from the route, missing `user` is the caller
async fn create(state: &AppState, mut body: Document, tour: Option<String>, user: &str) -> ApiResult<ApiResponse> {
    if let Some(tour) = tour {
        fill_if_absent(&mut body, "tour", tour);
    }
    fill_if_absent(&mut body, "user", user.to_string());

    let document = create_document::<Review>(state, body).await?;
    Ok(ApiResponse::created(json!({ "document": document })))
}

fn fill_if_absent(body: &mut Document, key: &str, value: String) {
    let absent = body.get(key).map(Value::is_null).unwrap_or(true);
    if absent {
        body.insert(key.to_string(), Value::String(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_values_win_over_route_and_caller() {
        let mut body = Document::new();
        body.insert("tour".into(), json!("from-body"));
        body.insert("user".into(), Value::Null);

        fill_if_absent(&mut body, "tour", "from-route".into());
        fill_if_absent(&mut body, "user", "caller".into());

        assert_eq!(body["tour"], json!("from-body"));
        assert_eq!(body["user"], json!("caller"));
    }
}
