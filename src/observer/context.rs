use std::sync::Arc;
use std::time::Instant;

use crate::database::record::Record;
use crate::database::schema::{Document, Schema};
use crate::database::store::DocumentStore;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::ObserverRing;
use crate::types::Operation;

/// The data that flows through the observer pipeline for one write
pub struct ObserverContext {
    pub operation: Operation,
    pub schema: &'static Schema,
    pub store: Arc<dyn DocumentStore>,

    pub records: Vec<Record>,

    /// Stored documents as returned by ring 5
    pub result: Option<Vec<Document>>,

    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,

    pub errors: Vec<ObserverError>,
    pub warnings: Vec<ObserverWarning>,
}

impl ObserverContext {
    pub fn new(operation: Operation, schema: &'static Schema, store: Arc<dyn DocumentStore>, records: Vec<Record>) -> Self {
        Self {
            operation,
            schema,
            store,
            records,
            result: None,
            start_time: Instant::now(),
            current_ring: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn collection(&self) -> &'static str {
        self.schema.collection
    }

    pub fn add_error(&mut self, error: ObserverError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ObserverWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
