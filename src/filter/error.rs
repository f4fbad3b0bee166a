use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid collection name: {0}")]
    InvalidTableName(String),

    #[error("Invalid field: {0}")]
    InvalidColumn(String),

    #[error("Invalid filter: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator {operator} for field {field}")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidOperatorData { field: String, value: String },

    #[error("Invalid sort field: {0}")]
    InvalidSort(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),
}
