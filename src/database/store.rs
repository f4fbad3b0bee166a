use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::schema::{Document, Schema};
use crate::filter::FilterData;

/// Count and mean of one numeric field over a set of documents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub count: u64,
    pub average: Option<f64>,
}

/// Document storage. Every document carries its own `id` (UUID string);
/// unique indexes declared by a collection's schema are enforced by the store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Create the collection and its unique indexes if missing
    async fn ensure_collection(&self, schema: &Schema) -> Result<(), DatabaseError>;

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, DatabaseError>;

    async fn select(&self, collection: &str, filter: &FilterData) -> Result<Vec<Document>, DatabaseError>;

    /// Raw lookup by id; ignores soft-delete markers
    async fn select_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DatabaseError>;

    /// Merge `set` into the stored document and drop `unset` fields in one step
    async fn update_id(
        &self,
        collection: &str,
        id: Uuid,
        set: Document,
        unset: Vec<String>,
    ) -> Result<Option<Document>, DatabaseError>;

    async fn delete_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DatabaseError>;

    async fn stats(&self, collection: &str, filter: &FilterData, field: &str) -> Result<FieldStats, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Parse a path or body id; anything but a UUID is a client error
pub fn parse_id(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw.trim()).map_err(|_| DatabaseError::InvalidId(raw.to_string()))
}

pub fn document_id(doc: &Document) -> Result<Uuid, DatabaseError> {
    let raw = doc
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| DatabaseError::QueryError("document has no id".to_string()))?;
    parse_id(raw)
}

/// Render the values behind a unique index violation for the client message
pub fn duplicate_value(doc: &Document, fields: &[&str]) -> String {
    if let [field] = fields {
        return doc.get(*field).map(Value::to_string).unwrap_or_default();
    }
    fields
        .iter()
        .map(|field| format!("{}: {}", field, doc.get(*field).map(Value::to_string).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(", ")
}
