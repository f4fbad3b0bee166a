use once_cell::sync::Lazy;

use crate::database::repository::Resource;
use crate::database::schema::{FieldSpec, Populate, Schema};

pub static REVIEW_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        "reviews",
        vec![
            FieldSpec::string("review").required("Review can not be empty!"),
            FieldSpec::number("rating")
                .min(1.0, "Rating must be above 1.0")
                .max(5.0, "Rating must be below 5.0"),
            FieldSpec::id("tour").required("Review must belong to a tour."),
            FieldSpec::id("user").required("Review must belong to a user."),
        ],
    )
    .unique(&["tour", "user"])
    .populate(Populate::Reference {
        field: "user",
        collection: "users",
        select: &["name", "photo"],
    })
});

pub struct Review;

impl Resource for Review {
    const COLLECTION: &'static str = "reviews";

    fn schema() -> &'static Schema {
        &REVIEW_SCHEMA
    }
}
