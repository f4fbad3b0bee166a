use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
    #[serde(rename = "$in")] In,
}

impl FilterOp {
    /// Operator named by a `field[op]=value` query key
    pub fn from_query_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "gte" => FilterOp::Gte,
            "gt" => FilterOp::Gt,
            "lte" => FilterOp::Lte,
            "lt" => FilterOp::Lt,
            "ne" => FilterOp::Ne,
            "eq" => FilterOp::Eq,
            _ => return None,
        })
    }

    pub fn as_key(&self) -> &'static str {
        match self {
            FilterOp::Eq => "$eq",
            FilterOp::Ne => "$ne",
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
            FilterOp::In => "$in",
        }
    }
}

/// Everything a store needs to answer a list query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    /// Projection; `None` returns whole documents
    pub select: Option<Vec<String>>,
    /// `{ field: value }` or `{ field: { "$gte": value } }`
    pub where_clause: Option<serde_json::Value>,
    pub order: Option<serde_json::Value>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    /// Boolean field whose `false` value hides a document from default reads
    pub soft_delete: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    pub soft_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<serde_json::Value>,
}
