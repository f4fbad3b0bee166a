// Fixtures shared by unit tests
use std::sync::Arc;

use serde_json::Value;

use crate::config::AppConfig;
use crate::database::memory::MemoryStore;
use crate::database::models::all_schemas;
use crate::database::schema::Document;
use crate::database::DocumentStore;
use crate::observer::ObserverPipeline;

/// JSON object literal as a document
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// In-memory store with every collection and unique index in place
pub async fn seeded_store() -> Arc<dyn DocumentStore> {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    for schema in all_schemas() {
        store.ensure_collection(schema).await.expect("memory collections");
    }
    store
}

/// The production observer set with a cheap bcrypt cost
pub fn standard_pipeline() -> Arc<ObserverPipeline> {
    Arc::new(ObserverPipeline::standard(&AppConfig::testing().security))
}
