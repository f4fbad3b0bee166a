// Ring 6: Rating Aggregate - keeps tour rating statistics in step with reviews
use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::schema::Document;
use crate::database::store::DocumentStore;
use crate::filter::FilterData;
use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::{Observer, ObserverRing, PostDatabaseObserver};
use crate::types::Operation;

/// Rating average of a tour without reviews
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(Default)]
pub struct RatingAggregate;

impl Observer for RatingAggregate {
    fn name(&self) -> &'static str {
        "RatingAggregate"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update | Operation::Delete)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == "reviews"
    }
}

#[async_trait]
impl PostDatabaseObserver for RatingAggregate {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        // A review moved to another tour changes both tours
        let mut tours = BTreeSet::new();
        for record in &ctx.records {
            tours.extend(record.original_value("tour").and_then(Value::as_str).map(str::to_string));
        }
        if ctx.operation != Operation::Delete {
            for doc in ctx.result.iter().flatten() {
                tours.extend(doc.get("tour").and_then(Value::as_str).map(str::to_string));
            }
        }

        for tour in tours {
            let outcome = match Uuid::parse_str(&tour) {
                Ok(id) => recalculate_tour_rating(ctx.store.as_ref(), id).await.map(|_| ()),
                Err(_) => Err(DatabaseError::InvalidId(tour.clone())),
            };

            // The review write already happened; never fail it from here
            if let Err(error) = outcome {
                tracing::warn!("Rating recalculation failed for tour {}: {}", tour, error);
                ctx.add_warning(ObserverWarning::new(
                    self.name(),
                    self.ring(),
                    format!("rating recalculation failed for tour {}", tour),
                ));
            }
        }
        Ok(())
    }
}

/// Recompute `ratingsQuantity` and `ratingsAverage` of one tour from its reviews
pub async fn recalculate_tour_rating(store: &dyn DocumentStore, tour: Uuid) -> Result<(u64, f64), DatabaseError> {
    let filter = FilterData {
        where_clause: Some(json!({ "tour": tour.to_string() })),
        ..Default::default()
    };
    let stats = store.stats("reviews", &filter, "rating").await?;

    let (quantity, average) = match (stats.count, stats.average) {
        (0, _) | (_, None) => (0, DEFAULT_RATINGS_AVERAGE),
        (count, Some(average)) => (count, average),
    };

    let mut set = Document::new();
    set.insert("ratingsQuantity".to_string(), json!(quantity));
    set.insert("ratingsAverage".to_string(), json!(average));

    if store.update_id("tours", tour, set, vec![]).await?.is_none() {
        tracing::debug!("Tour {} no longer exists; rating not stored", tour);
    }
    Ok((quantity, average))
}
