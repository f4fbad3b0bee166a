// Ring 4: Password Hashing - bcrypt before anything reaches the store
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::auth::hash_password;
use crate::database::schema::format_timestamp;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{EnrichmentObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct PasswordHashing {
    cost: u32,
}

impl PasswordHashing {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Observer for PasswordHashing {
    fn name(&self) -> &'static str {
        "PasswordHashing"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == "users"
    }

    fn priority(&self) -> u8 {
        10
    }
}

#[async_trait]
impl EnrichmentObserver for PasswordHashing {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        for record in &mut ctx.records {
            // Input only, never stored
            record.remove("passwordConfirm");

            if !record.changed("password") {
                continue;
            }
            let plain = match record.get_str("password") {
                Some(plain) => plain.to_string(),
                None => continue,
            };

            let cost = self.cost;
            let hashed = tokio::task::spawn_blocking(move || hash_password(&plain, cost))
                .await
                .map_err(|e| ObserverError::SystemError(format!("password hashing task failed: {}", e)))??;
            record.set("password", hashed);

            // Backdated so a token issued in the same second stays valid
            if !record.is_new() {
                record.set("passwordChangedAt", format_timestamp(Utc::now() - Duration::seconds(1)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::database::memory::MemoryStore;
    use crate::database::models::USER_SCHEMA;
    use crate::database::record::Record;
    use serde_json::json;
    use std::sync::Arc;

    fn context(operation: Operation, record: Record) -> ObserverContext {
        ObserverContext::new(operation, &USER_SCHEMA, Arc::new(MemoryStore::new()), vec![record])
    }

    #[tokio::test]
    async fn hashes_new_passwords_without_change_marker() {
        let record = Record::create(
            json!({ "password": "pass1234", "passwordConfirm": "pass1234" }).as_object().cloned().unwrap(),
        );
        let mut ctx = context(Operation::Create, record);
        PasswordHashing::new(4).execute(&mut ctx).await.unwrap();

        let record = &ctx.records[0];
        let hash = record.get_str("password").unwrap();
        assert_ne!(hash, "pass1234");
        assert!(verify_password("pass1234", hash).unwrap());
        assert!(record.get("passwordConfirm").is_none());
        assert!(record.get("passwordChangedAt").is_none());
    }

    #[tokio::test]
    async fn password_change_on_existing_user_is_backdated() {
        let id = uuid::Uuid::new_v4();
        let mut record = Record::update(
            id,
            json!({ "password": "newpass123", "passwordConfirm": "newpass123" }).as_object().cloned().unwrap(),
        );
        record.inject(json!({ "id": id.to_string(), "password": "old-hash" }).as_object().cloned().unwrap());

        let before = Utc::now();
        let mut ctx = context(Operation::Update, record);
        PasswordHashing::new(4).execute(&mut ctx).await.unwrap();

        let changed_at = crate::database::schema::parse_timestamp(ctx.records[0].get("passwordChangedAt").unwrap()).unwrap();
        assert!(changed_at < before);
        assert!(changed_at > before - Duration::seconds(3));
    }
}
