pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod filter_query;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use filter_query::FilterQuery;
