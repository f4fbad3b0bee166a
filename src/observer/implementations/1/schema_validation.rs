// Ring 1: Schema Validation - normalizes input and checks the merged document
use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{InputValidationObserver, Observer, ObserverRing};
use crate::types::Operation;

#[derive(Default)]
pub struct SchemaValidation;

impl Observer for SchemaValidation {
    fn name(&self) -> &'static str {
        "SchemaValidation"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, _collection: &str) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        10
    }
}

#[async_trait]
impl InputValidationObserver for SchemaValidation {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let schema = ctx.schema;
        let mut messages = Vec::new();

        for record in &mut ctx.records {
            schema.normalize(record.fields_mut());
            if record.is_new() {
                schema.apply_defaults(record.fields_mut());
            }
            messages.extend(schema.validate(record.fields()));
        }

        for message in messages {
            ctx.add_error(ObserverError::ValidationError(message));
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
    async fn collects_one_error_per_message() {
        let doc = json!({ "name": "  Tiny  ", "difficulty": "hard" }).as_object().cloned().unwrap();
        let mut ctx = ObserverContext::new(
            Operation::Create,
            &TOUR_SCHEMA,
            Arc::new(MemoryStore::new()),
            vec![Record::create(doc)],
        );

        SchemaValidation.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.records[0].get_str("name"), Some("Tiny"));
        assert_eq!(ctx.records[0].get("ratingsAverage"), Some(&json!(4.5)));
        let messages: Vec<String> = ctx.errors.iter().map(|e| e.to_string()).collect();
        assert!(messages.contains(&"Validation error: A tour must have a duration".to_string()));
        assert!(messages.contains(&"Validation error: Difficulty is either: easy, medium, difficult".to_string()));
    }
}
