// Ring 5: Store Executor - the single place a write reaches the document store
use async_trait::async_trait;

use crate::database::record::Record;
use crate::database::schema::Document;
use crate::database::store::DocumentStore;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{DatabaseObserver, Observer, ObserverRing};
use crate::types::Operation;

#[derive(Default)]
pub struct StoreExecutor;

impl Observer for StoreExecutor {
    fn name(&self) -> &'static str {
        "StoreExecutor"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Database
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update | Operation::Delete)
    }

    fn applies_to_collection(&self, _collection: &str) -> bool {
        true
    }
}

#[async_trait]
impl DatabaseObserver for StoreExecutor {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let mut results = Vec::with_capacity(ctx.records.len());

        for record in &ctx.records {
            let stored = Self::execute_record(ctx.store.as_ref(), ctx.collection(), record).await?;
            results.push(stored);
        }

        tracing::debug!("{:?} stored {} records in {}", ctx.operation, results.len(), ctx.collection());
        ctx.result = Some(results);
        Ok(())
    }
}

impl StoreExecutor {
    async fn execute_record(store: &dyn DocumentStore, collection: &str, record: &Record) -> Result<Document, ObserverError> {
        if record.is_new() {
            return Ok(store.insert(collection, record.fields().clone()).await?);
        }

        let id = record
            .id()
            .ok_or_else(|| ObserverError::BadRequest(format!("{:?} requires a document id", record.operation())))?;

        let stored = match record.operation() {
            Operation::Delete => store.delete_id(collection, id).await?,
            _ => {
                let (set, unset) = record.patch();
                store.update_id(collection, id, set, unset).await?
            }
        };

        // Removed between preparation and execution
        stored.ok_or_else(|| ObserverError::NotFound(format!("{} {} not found", collection, id)))
    }
}
