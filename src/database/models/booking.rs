use once_cell::sync::Lazy;

use crate::database::repository::Resource;
use crate::database::schema::{FieldSpec, Populate, Schema};

pub static BOOKING_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        "bookings",
        vec![
            FieldSpec::id("tour").required("Booking must belong to a Tour!"),
            FieldSpec::id("user").required("Booking must belong to a User!"),
            FieldSpec::number("price").required("Booking must have a price."),
            FieldSpec::boolean("paid").default(true),
        ],
    )
    .populate(Populate::Reference {
        field: "user",
        collection: "users",
        select: &["name", "email", "photo"],
    })
    .populate(Populate::Reference {
        field: "tour",
        collection: "tours",
        select: &["name"],
    })
});

pub struct Booking;

impl Resource for Booking {
    const COLLECTION: &'static str = "bookings";

    fn schema() -> &'static Schema {
        &BOOKING_SCHEMA
    }
}
