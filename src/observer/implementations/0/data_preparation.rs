// Ring 0: Data Preparation - loads the stored document and merges updates
use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{DataPreparationObserver, Observer, ObserverRing};
use crate::types::Operation;

#[derive(Default)]
pub struct DataPreparation;

impl Observer for DataPreparation {
    fn name(&self) -> &'static str {
        "DataPreparation"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::DataPreparation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        // Only operations that address an existing document
        matches!(op, Operation::Update | Operation::Delete)
    }

    fn applies_to_collection(&self, _collection: &str) -> bool {
        true
    }
}

#[async_trait]
impl DataPreparationObserver for DataPreparation {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let store = ctx.store.clone();
        let schema = ctx.schema;
        let operation = ctx.operation;
        let mut prepared = 0;

        for record in &mut ctx.records {
            if record.original().is_some() {
                continue;
            }

            let id = record
                .id()
                .ok_or_else(|| ObserverError::BadRequest(format!("{:?} requires a document id", operation)))?;

            // Soft-deleted documents are invisible to updates and deletes too
            match store.select_id(schema.collection, id).await? {
                Some(original) if !schema.is_inactive(&original) => {
                    record.inject(original);
                    prepared += 1;
                }
                _ => return Err(ObserverError::NotFound(format!("{} {} not found", schema.collection, id))),
            }
        }

        tracing::debug!("Prepared {}/{} records in {}", prepared, ctx.records.len(), schema.collection);
        Ok(())
    }
}
