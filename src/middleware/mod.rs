pub mod auth;
pub mod response;
pub mod restrict;

pub use auth::{is_logged_in, protect, CurrentUser};
pub use response::ApiResponse;
pub use restrict::{authorize, restrict_to};
