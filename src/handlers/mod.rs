// Route handlers. Resource CRUD goes through `factory`; the other modules
// cover account flows and the routes with extra behaviour.
pub mod auth;
pub mod extract;
pub mod factory;
pub mod reviews;
pub mod root;
pub mod users;

pub use extract::{ApiJson, ApiPath, ApiQuery};
