// Query-string features for list endpoints: filter, sort, fields, paginate (in that order)
use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FilterData, FilterOp};
use crate::config::FilterConfig;
use crate::database::schema::Schema;

/// Query keys that drive the pipeline and never become filter predicates
pub const RESERVED_KEYS: &[&str] = &["page", "sort", "limit", "fields"];

pub const DEFAULT_SORT: &str = "-createdAt";

pub struct FilterQuery<'a> {
    schema: &'a Schema,
    config: &'a FilterConfig,
}

impl<'a> FilterQuery<'a> {
    pub fn new(schema: &'a Schema, config: &'a FilterConfig) -> Self {
        Self { schema, config }
    }

    /// Translate query pairs into `FilterData`. `parent` holds equality
    /// predicates from nested routes; they replace any client filter on
    /// the same field.
    pub fn parse(&self, pairs: &[(String, String)], parent: Option<Map<String, Value>>) -> Result<FilterData, FilterError> {
        let mut where_clause = self.filter(pairs)?;
        where_clause.extend(parent.unwrap_or_default());
        let order = self.sort(Self::reserved(pairs, "sort"))?;
        let select = self.fields(Self::reserved(pairs, "fields"))?;
        let (limit, offset) = self.paginate(Self::reserved(pairs, "page"), Self::reserved(pairs, "limit"))?;

        Ok(FilterData {
            select,
            where_clause: (!where_clause.is_empty()).then_some(Value::Object(where_clause)),
            order: Some(order),
            limit: Some(limit),
            offset: Some(offset),
            soft_delete: self.schema.soft_delete.map(str::to_string),
        })
    }

    fn reserved<'p>(pairs: &'p [(String, String)], key: &str) -> Option<&'p str> {
        pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn filter(&self, pairs: &[(String, String)]) -> Result<Map<String, Value>, FilterError> {
        let mut where_clause = Map::new();
        for (key, raw) in pairs {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }

            let (field, op) = Self::split_key(key)?;
            let kind = self
                .schema
                .filterable_kind(field)
                .ok_or_else(|| FilterError::InvalidColumn(field.to_string()))?;

            if !kind.allows(&op) {
                return Err(FilterError::UnsupportedOperator {
                    field: field.to_string(),
                    operator: op.as_key().trim_start_matches('$').to_string(),
                });
            }

            let value = kind.coerce(raw).ok_or_else(|| FilterError::InvalidOperatorData {
                field: field.to_string(),
                value: raw.clone(),
            })?;

            if op == FilterOp::Eq {
                where_clause.insert(field.to_string(), value);
                continue;
            }

            // Several operators on one field combine: price[gte]=100&price[lt]=500
            let entry = where_clause.entry(field.to_string()).or_insert_with(|| Value::Object(Map::new()));
            match entry {
                Value::Object(ops) => {
                    ops.insert(op.as_key().to_string(), value);
                }
                other => {
                    let equality = other.take();
                    let mut ops = Map::new();
                    ops.insert(FilterOp::Eq.as_key().to_string(), equality);
                    ops.insert(op.as_key().to_string(), value);
                    *other = Value::Object(ops);
                }
            }
        }

        Ok(where_clause)
    }

    /// `price[gte]` -> (`price`, Gte); `price` -> (`price`, Eq)
    fn split_key(key: &str) -> Result<(&str, FilterOp), FilterError> {
        match key.split_once('[') {
            None => Ok((key, FilterOp::Eq)),
            Some((field, rest)) => {
                let suffix = rest
                    .strip_suffix(']')
                    .ok_or_else(|| FilterError::InvalidWhereClause(key.to_string()))?;
                let op = FilterOp::from_query_suffix(suffix).ok_or_else(|| FilterError::UnsupportedOperator {
                    field: field.to_string(),
                    operator: suffix.to_string(),
                })?;
                Ok((field, op))
            }
        }
    }

    fn sort(&self, raw: Option<&str>) -> Result<Value, FilterError> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => DEFAULT_SORT,
        };

        let mut columns = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let name = part.strip_prefix('-').unwrap_or(part);
            if !self.schema.is_visible(name) {
                return Err(FilterError::InvalidSort(name.to_string()));
            }
            columns.push(part.to_string());
        }

        // Deterministic order for documents sharing every sort key
        if !columns.iter().any(|c| c.trim_start_matches('-') == "id") {
            columns.push("id".to_string());
        }

        Ok(Value::String(columns.join(",")))
    }

    fn fields(&self, raw: Option<&str>) -> Result<Option<Vec<String>>, FilterError> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };

        let mut columns = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let name = part.strip_prefix('-').unwrap_or(part);
            if !self.schema.is_visible(name) {
                return Err(FilterError::InvalidColumn(name.to_string()));
            }
            columns.push(part.to_string());
        }
        Ok(Some(columns))
    }

    fn paginate(&self, page: Option<&str>, limit: Option<&str>) -> Result<(i32, i32), FilterError> {
        let page = match page {
            None => 1,
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(FilterError::InvalidPage(raw.to_string())),
            },
        };

        let requested = match limit {
            None => self.config.default_limit as i32,
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(FilterError::InvalidLimit(raw.to_string())),
            },
        };

        // Apply max limit from config
        let max_limit = self.config.max_limit.map(|m| m as i32).unwrap_or(i32::MAX);
        let limit = if requested > max_limit {
            if self.config.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", requested, max_limit);
            }
            max_limit
        } else {
            requested
        };

        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| FilterError::InvalidPage(page.to_string()))?;
        Ok((limit, offset))
    }
}
