use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;

use crate::database::record::Record;
use crate::database::schema::Schema;
use crate::database::store::DocumentStore;
use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverResult};
use crate::observer::traits::{ObserverBox, ObserverRing};
use crate::types::Operation;

/// Executes registered observers in ring order for every write
pub struct ObserverPipeline {
    observers: HashMap<ObserverRing, Vec<ObserverBox>>,
}

impl ObserverPipeline {
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
        }
    }

    /// Register an observer; within a ring, lower priority runs first
    pub fn register_observer(&mut self, observer: ObserverBox) {
        let ring = observer.ring();
        let name = observer.name();
        let observers = self.observers.entry(ring).or_default();
        observers.push(observer);
        observers.sort_by_key(ObserverBox::priority);

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.values().map(Vec::len).sum()
    }

    /// Run `records` through every ring that applies to `operation`.
    /// Returns the stored documents, or every error collected before the
    /// pipeline stopped.
    pub async fn execute(
        &self,
        operation: Operation,
        schema: &'static Schema,
        store: Arc<dyn DocumentStore>,
        records: Vec<Record>,
    ) -> Result<ObserverResult, Vec<ObserverError>> {
        let mut ctx = ObserverContext::new(operation, schema, store, records);
        let relevant_rings = ObserverRing::for_operation(&operation);

        tracing::debug!(
            "Observer pipeline starting: operation={:?}, collection={}, records={}",
            operation,
            schema.collection,
            ctx.records.len()
        );

        let mut rings_executed = Vec::new();
        for &ring in &relevant_rings {
            ctx.current_ring = Some(ring);
            rings_executed.push(ring);

            if !self.execute_ring(ring, &mut ctx).await {
                tracing::warn!("Observer pipeline stopped at ring {:?} due to errors", ring);
                return Err(ctx.errors);
            }
        }

        let execution_time = ctx.execution_time();
        tracing::debug!(
            "Observer pipeline finished: operation={:?}, collection={} in {:?}",
            operation,
            schema.collection,
            execution_time
        );

        let records = match ctx.result {
            Some(result) => result,
            None => ctx.records.into_iter().map(Record::into_fields).collect(),
        };

        Ok(ObserverResult {
            records,
            warnings: ctx.warnings,
            execution_time,
            rings_executed,
        })
    }

    /// Execute observers in one ring; false when the pipeline must stop
    async fn execute_ring(&self, ring: ObserverRing, ctx: &mut ObserverContext) -> bool {
        let observers = match self.observers.get(&ring) {
            Some(observers) => observers,
            None => return true,
        };

        for observer in observers {
            if !observer.applies_to_operation(ctx.operation) || !observer.applies_to_collection(ctx.collection()) {
                tracing::trace!("Observer {} skipped for {:?} on {}", observer.name(), ctx.operation, ctx.collection());
                continue;
            }

            let observer_start = Instant::now();
            let result = timeout(observer.timeout(), observer.execute(ctx)).await;
            let execution_time = observer_start.elapsed();

            match result {
                Ok(Ok(())) => {
                    tracing::debug!("Observer: {} completed in {:?}", observer.name(), execution_time);
                }
                Ok(Err(error)) => {
                    tracing::debug!("Observer: {} failed in {:?}: {}", observer.name(), execution_time, error);
                    ctx.add_error(error);
                }
                Err(_elapsed) => {
                    tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
                    ctx.add_error(ObserverError::TimeoutError(format!(
                        "Observer {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    )));
                }
            }
        }

        !(ctx.has_errors() && ring.stops_on_error())
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}
