// Observer implementations organized by rings

// Ring 0: Data Preparation
#[path = "0/data_preparation.rs"]
pub mod data_preparation;

// Ring 1: Input Validation
#[path = "1/password_confirmation.rs"]
pub mod password_confirmation;
#[path = "1/schema_validation.rs"]
pub mod schema_validation;

// Ring 4: Enrichment
#[path = "4/password_hashing.rs"]
pub mod password_hashing;
#[path = "4/record_timestamps.rs"]
pub mod record_timestamps;
#[path = "4/tour_derived_fields.rs"]
pub mod tour_derived_fields;

// Ring 5: Database
#[path = "5/store_executor.rs"]
pub mod store_executor;

// Ring 6: Post-Database
#[path = "6/rating_aggregate.rs"]
pub mod rating_aggregate;

pub use data_preparation::DataPreparation;
pub use password_confirmation::PasswordConfirmation;
pub use password_hashing::PasswordHashing;
pub use rating_aggregate::{recalculate_tour_rating, RatingAggregate};
pub use record_timestamps::RecordTimestamps;
pub use schema_validation::SchemaValidation;
pub use store_executor::StoreExecutor;
pub use tour_derived_fields::TourDerivedFields;

use crate::config::SecurityConfig;
use crate::observer::pipeline::ObserverPipeline;
use crate::observer::traits::ObserverBox;

/// Register every observer the API relies on
pub fn register_all_observers(pipeline: &mut ObserverPipeline, security: &SecurityConfig) {
    pipeline.register_observer(ObserverBox::DataPreparation(Box::new(DataPreparation)));
    pipeline.register_observer(ObserverBox::InputValidation(Box::new(SchemaValidation)));
    pipeline.register_observer(ObserverBox::InputValidation(Box::new(PasswordConfirmation)));
    pipeline.register_observer(ObserverBox::Enrichment(Box::new(PasswordHashing::new(security.bcrypt_cost))));
    pipeline.register_observer(ObserverBox::Enrichment(Box::new(TourDerivedFields)));
    pipeline.register_observer(ObserverBox::Enrichment(Box::new(RecordTimestamps)));
    pipeline.register_observer(ObserverBox::Database(Box::new(StoreExecutor)));
    pipeline.register_observer(ObserverBox::PostDatabase(Box::new(RatingAggregate)));
}

impl ObserverPipeline {
    /// Pipeline with every observer registered
    pub fn standard(security: &SecurityConfig) -> Self {
        let mut pipeline = Self::new();
        register_all_observers(&mut pipeline, security);
        pipeline
    }
}
