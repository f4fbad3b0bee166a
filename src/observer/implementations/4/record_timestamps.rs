// Ring 4: Record Timestamps - id, createdAt/updatedAt and the version marker
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::database::schema::{format_timestamp, VERSION_FIELD};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{EnrichmentObserver, Observer, ObserverRing};
use crate::types::Operation;

#[derive(Default)]
pub struct RecordTimestamps;

impl Observer for RecordTimestamps {
    fn name(&self) -> &'static str {
        "RecordTimestamps"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, _collection: &str) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        90
    }
}

#[async_trait]
impl EnrichmentObserver for RecordTimestamps {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let now = format_timestamp(Utc::now());

        for record in &mut ctx.records {
            if record.is_new() {
                record.set_if_empty("id", Uuid::new_v4().to_string());
                record.set("createdAt", now.clone());
                record.set("updatedAt", now.clone());
                record.set(VERSION_FIELD, 0);
            } else {
                let version = record.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0);
                record.set("updatedAt", now.clone());
                record.set(VERSION_FIELD, version + 1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::TOUR_SCHEMA;
    use crate::database::record::Record;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_stamps_and_update_bumps_version() {
        let store = Arc::new(MemoryStore::new());
        let mut ctx = ObserverContext::new(Operation::Create, &TOUR_SCHEMA, store.clone(), vec![Record::create(Default::default())]);
        RecordTimestamps.execute(&mut ctx).await.unwrap();

        let created = ctx.records[0].fields().clone();
        assert!(Uuid::parse_str(created["id"].as_str().unwrap()).is_ok());
        assert_eq!(created["createdAt"], created["updatedAt"]);
        assert_eq!(created[VERSION_FIELD], json!(0));

        let id = Uuid::parse_str(created["id"].as_str().unwrap()).unwrap();
        let mut record = Record::update(id, Default::default());
        record.inject(created.clone());
        let mut ctx = ObserverContext::new(Operation::Update, &TOUR_SCHEMA, store, vec![record]);
        RecordTimestamps.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.records[0].get(VERSION_FIELD), Some(&json!(1)));
        assert_eq!(ctx.records[0].get("createdAt"), created.get("createdAt"));
    }
}
