use once_cell::sync::Lazy;
use serde_json::Value;

use crate::database::repository::Resource;
use crate::database::schema::{Document, FieldSpec, Populate, Schema};

fn below_price(value: &Value, doc: &Document) -> bool {
    match (value.as_f64(), doc.get("price").and_then(Value::as_f64)) {
        (Some(discount), Some(price)) => discount < price,
        _ => true,
    }
}

pub static TOUR_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        "tours",
        vec![
            FieldSpec::string("name")
                .required("A tour must have a name")
                .trim()
                .max_len(40, "A tour name must have less or equal then 40 characters")
                .min_len(10, "A tour name must have more or equal then 10 characters"),
            FieldSpec::string("slug").internal(),
            FieldSpec::number("duration")
                .required("A tour must have a duration")
                .min(1.0, "A tour duration must be at least 1 day"),
            FieldSpec::number("maxGroupSize")
                .required("A tour must have a group size")
                .min(1.0, "A tour group must have at least 1 person"),
            FieldSpec::string("difficulty")
                .required("A tour must have a difficulty")
                .one_of(&["easy", "medium", "difficult"], "Difficulty is either: easy, medium, difficult"),
            FieldSpec::number("ratingsAverage")
                .default(4.5)
                .min(1.0, "Rating must be above 1.0")
                .max(5.0, "Rating must be below 5.0"),
            FieldSpec::number("ratingsQuantity").default(0),
            FieldSpec::number("price")
                .required("A tour must have a price")
                .min(0.0, "A tour price can not be negative"),
            FieldSpec::number("priceDiscount")
                .check(below_price, "Discount price ({VALUE}) should be below regular price"),
            FieldSpec::string("summary").required("A tour must have a summary").trim(),
            FieldSpec::string("description").trim(),
            FieldSpec::string("imageCover"),
            FieldSpec::list("images"),
            FieldSpec::list("startDates"),
        ],
    )
    .unique(&["name"])
    .populate_one(Populate::Virtual {
        name: "reviews",
        collection: "reviews",
        foreign_field: "tour",
    })
});

/// URL slug: lowercase ascii words joined by dashes
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub struct Tour;

impl Resource for Tour {
    const COLLECTION: &'static str = "tours";

    fn schema() -> &'static Schema {
        &TOUR_SCHEMA
    }
}
