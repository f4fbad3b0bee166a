// Generic CRUD handlers, instantiated once per resource in the router
use axum::extract::State;
use serde_json::{json, Map, Value};

use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::app::AppState;
use crate::database::schema::Document;
use crate::database::Resource;
use crate::error::ApiResult;
use crate::filter::FilterQuery;
use crate::middleware::ApiResponse;

/// POST /<resource>
pub async fn create_one<E: Resource>(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    let document = create_document::<E>(&state, body).await?;
    Ok(ApiResponse::created(json!({ "document": document })))
}

/// GET /<resource>/:id
pub async fn get_one<E: Resource>(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<ApiResponse> {
    let document = find_document::<E>(&state, &id).await?;
    Ok(ApiResponse::success(json!({ "document": document })))
}

/// GET /<resource>
pub async fn get_all<E: Resource>(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<ApiResponse> {
    list_documents::<E>(&state, &query, None).await
}

/// PATCH /<resource>/:id
pub async fn update_one<E: Resource>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<Document>,
) -> ApiResult<ApiResponse> {
    let repo = state.repo::<E>();
    let schema = repo.schema();
    let updated = repo.update_by_id(&id, schema.accept_input(body)).await?;
    Ok(ApiResponse::success(json!({ "document": schema.to_public(updated) })))
}

/// DELETE /<resource>/:id
pub async fn delete_one<E: Resource>(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<ApiResponse> {
    state.repo::<E>().delete_by_id(&id).await?;
    Ok(ApiResponse::no_content())
}

/// Insert client input restricted to the writable fields
pub async fn create_document<E: Resource>(state: &AppState, body: Document) -> ApiResult<Document> {
    let repo = state.repo::<E>();
    let schema = repo.schema();
    let created = repo.insert(schema.accept_input(body)).await?;
    tracing::debug!("Created {} document", E::COLLECTION);
    Ok(schema.to_public(created))
}

pub async fn find_document<E: Resource>(state: &AppState, id: &str) -> ApiResult<Document> {
    let repo = state.repo::<E>();
    let found = repo.find_by_id(id).await?;
    Ok(repo.schema().to_public(found))
}

/// List through the query pipeline: filter, sort, fields, paginate. `parent`
/// holds equality predicates fixed by a nested route.
pub async fn list_documents<E: Resource>(
    state: &AppState,
    query: &[(String, String)],
    parent: Option<Map<String, Value>>,
) -> ApiResult<ApiResponse> {
    let repo = state.repo::<E>();
    let schema = repo.schema();
    let filter = FilterQuery::new(schema, &state.config.filter).parse(query, parent)?;

    let documents: Vec<Value> = repo
        .find(&filter)
        .await?
        .into_iter()
        .map(|doc| Value::Object(schema.to_public(doc)))
        .collect();

    let results = documents.len();
    Ok(ApiResponse::success(json!({ "documents": documents })).results(results))
}
