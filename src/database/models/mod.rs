pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::{Booking, BOOKING_SCHEMA};
pub use review::{Review, REVIEW_SCHEMA};
pub use tour::{Tour, TOUR_SCHEMA};
pub use user::{Role, User, USER_SCHEMA};

use crate::database::schema::Schema;

/// Every collection served by the API
pub fn all_schemas() -> [&'static Schema; 4] {
    [&USER_SCHEMA, &TOUR_SCHEMA, &REVIEW_SCHEMA, &BOOKING_SCHEMA]
}

pub fn schema_for(collection: &str) -> Option<&'static Schema> {
    all_schemas().into_iter().find(|schema| schema.collection == collection)
}
