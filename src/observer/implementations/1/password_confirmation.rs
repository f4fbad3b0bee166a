// Ring 1: Password Confirmation - a changed password must be confirmed
use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{InputValidationObserver, Observer, ObserverRing};
use crate::types::Operation;

#[derive(Default)]
pub struct PasswordConfirmation;

impl Observer for PasswordConfirmation {
    fn name(&self) -> &'static str {
        "PasswordConfirmation"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == "users"
    }

    fn priority(&self) -> u8 {
        60
    }
}

#[async_trait]
impl InputValidationObserver for PasswordConfirmation {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let mut messages = Vec::new();

        for record in ctx.records.iter().filter(|r| r.changed("password")) {
            match (record.get("password"), record.get("passwordConfirm")) {
                (_, None) | (_, Some(serde_json::Value::Null)) => messages.push("Confirm your password"),
                (password, confirm) if password != confirm => messages.push("Passwords must match"),
                _ => {}
            }
        }

        for message in messages {
            ctx.add_error(ObserverError::ValidationError(message.to_string()));
        }
        Ok(())
    }
}
