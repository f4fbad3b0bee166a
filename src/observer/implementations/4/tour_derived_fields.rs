// Ring 4: Tour Derived Fields - slug from name
use async_trait::async_trait;

use crate::database::models::tour::slugify;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{EnrichmentObserver, Observer, ObserverRing};
use crate::types::Operation;

#[derive(Default)]
pub struct TourDerivedFields;

impl Observer for TourDerivedFields {
    fn name(&self) -> &'static str {
        "TourDerivedFields"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == "tours"
    }
}

#[async_trait]
impl EnrichmentObserver for TourDerivedFields {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        for record in &mut ctx.records {
            if record.changed("name") || record.get("slug").is_none() {
                if let Some(name) = record.get_str("name") {
                    let slug = slugify(name);
                    record.set("slug", slug);
                }
            }
        }
        Ok(())
    }
}
