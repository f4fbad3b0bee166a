// Observer system: every write runs through ordered rings around the store call

pub mod context;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use traits::*;
