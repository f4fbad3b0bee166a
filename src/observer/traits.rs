use std::time::Duration;

use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::types::Operation;

/// Observer rings, executed in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    DataPreparation = 0, // Load the stored document, merge changes
    InputValidation = 1, // Schema validation, cross-field rules
    Enrichment = 4,      // Derived fields, hashing, timestamps
    Database = 5,        // Store execution
    PostDatabase = 6,    // Follow-up writes after the store answered
}

impl ObserverRing {
    /// Rings that run for an operation
    pub fn for_operation(operation: &Operation) -> Vec<Self> {
        use ObserverRing::*;

        match operation {
            Operation::Create | Operation::Update => {
                vec![DataPreparation, InputValidation, Enrichment, Database, PostDatabase]
            }
            Operation::Delete => vec![DataPreparation, Database, PostDatabase],
            Operation::Select => vec![],
        }
    }

    /// Errors raised up to and including the store call abort the pipeline
    pub fn stops_on_error(&self) -> bool {
        (*self as u8) <= 5
    }
}

/// Base trait for all observers with metadata and applicability checks
pub trait Observer: Send + Sync {
    fn name(&self) -> &'static str;

    fn ring(&self) -> ObserverRing;

    fn applies_to_operation(&self, op: Operation) -> bool;

    fn applies_to_collection(&self, collection: &str) -> bool;

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Priority within ring (lower numbers execute first)
    fn priority(&self) -> u8 {
        50
    }
}

/// Ring 0: Data Preparation
#[async_trait]
pub trait DataPreparationObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 1: Input Validation
#[async_trait]
pub trait InputValidationObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 4: Enrichment
#[async_trait]
pub trait EnrichmentObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 5: Database
#[async_trait]
pub trait DatabaseObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 6: Post-Database
#[async_trait]
pub trait PostDatabaseObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Concrete observer types for dynamic dispatch
pub enum ObserverBox {
    DataPreparation(Box<dyn DataPreparationObserver>),
    InputValidation(Box<dyn InputValidationObserver>),
    Enrichment(Box<dyn EnrichmentObserver>),
    Database(Box<dyn DatabaseObserver>),
    PostDatabase(Box<dyn PostDatabaseObserver>),
}

/// Forward a metadata call to whichever observer the box holds
macro_rules! dispatch {
    ($self:ident, $o:ident => $call:expr) => {
        match $self {
            ObserverBox::DataPreparation($o) => $call,
            ObserverBox::InputValidation($o) => $call,
            ObserverBox::Enrichment($o) => $call,
            ObserverBox::Database($o) => $call,
            ObserverBox::PostDatabase($o) => $call,
        }
    };
}

impl ObserverBox {
    pub fn name(&self) -> &'static str {
        dispatch!(self, o => o.name())
    }

    pub fn ring(&self) -> ObserverRing {
        dispatch!(self, o => o.ring())
    }

    pub fn applies_to_operation(&self, op: Operation) -> bool {
        dispatch!(self, o => o.applies_to_operation(op))
    }

    pub fn applies_to_collection(&self, collection: &str) -> bool {
        dispatch!(self, o => o.applies_to_collection(collection))
    }

    pub fn timeout(&self) -> Duration {
        dispatch!(self, o => o.timeout())
    }

    pub fn priority(&self) -> u8 {
        dispatch!(self, o => o.priority())
    }

    pub async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        dispatch!(self, o => o.execute(ctx).await)
    }
}
