pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod record;
pub mod repository;
pub mod schema;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::Record;
pub use repository::{Repository, Resource};
pub use schema::{Document, Schema};
pub use store::{DocumentStore, FieldStats};
