use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, FilterWhereOptions, SqlResult};
use crate::database::schema::{Document, VERSION_FIELD};

/// SQL builder for one collection table (`id UUID`, `data JSONB`)
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    options: FilterWhereOptions,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            options: FilterWhereOptions::default(),
        })
    }

    pub fn assign(&mut self, data: &FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = &data.select { self.select(select.clone())?; }
        if let Some(where_clause) = &data.where_clause { self.where_clause(where_clause.clone())?; }
        if let Some(order) = &data.order { self.order(order)?; }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        self.options.soft_delete = data.soft_delete.clone();
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            Self::validate_column(column.strip_prefix('-').unwrap_or(column))?;
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_parts()?;
        let order_clause = FilterOrder::generate(&self.order_data)?;
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT \"data\"".to_string(),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params })
    }

    /// Count and mean of a numeric field over the matching documents
    pub fn to_stats_sql(&self, field: &str) -> Result<SqlResult, FilterError> {
        Self::validate_column(field)?;
        let (where_clause, params) = self.where_parts()?;
        let query = format!(
            "SELECT COUNT(*) AS count, AVG((\"data\"->>'{}')::float8) AS average FROM \"{}\" WHERE {}",
            field, self.table_name, where_clause
        );
        Ok(SqlResult { query, params })
    }

    fn where_parts(&self) -> Result<(String, Vec<Value>), FilterError> {
        Ok(match &self.where_data {
            Some(where_data) => FilterWhere::generate(where_data, 0, &self.options)?,
            None => FilterWhere::generate_empty(&self.options),
        })
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            _ => String::new(),
        }
    }

    /// Field access expression; callers validate the name first
    pub fn json_path(column: &str) -> String {
        format!("\"data\"->'{}'", column)
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    pub fn validate_column(column: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(column) {
            return Err(FilterError::InvalidColumn(column.to_string()));
        }
        Ok(())
    }

    fn is_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }

    /// Apply a `fields` projection. Plain names include (plus `id`), `-name`
    /// excludes; the version marker is always dropped.
    pub fn project(mut doc: Document, select: Option<&[String]>) -> Document {
        doc.remove(VERSION_FIELD);

        let select = match select {
            Some(select) if !select.is_empty() => select,
            _ => return doc,
        };

        let includes: Vec<&str> = select.iter().filter(|c| !c.starts_with('-')).map(String::as_str).collect();
        if includes.is_empty() {
            for column in select {
                if let Some(name) = column.strip_prefix('-') {
                    doc.remove(name);
                }
            }
            return doc;
        }

        doc.into_iter()
            .filter(|(key, _)| key == "id" || includes.contains(&key.as_str()))
            .collect()
    }
}
