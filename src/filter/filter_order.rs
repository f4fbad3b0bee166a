use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::filter::Filter;
use super::types::{FilterOrderInfo, SortDirection};
use crate::database::schema::Document;

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // Expect array of strings like ["-createdAt", "name asc"]
                let mut out = Vec::new();
                for v in arr {
                    if let Value::String(s) = v {
                        out.extend(Self::parse_order_string(s));
                    }
                }
                out
            }
            Value::Object(obj) => {
                // { "createdAt": "desc", "name": "asc" }
                obj.iter()
                    .map(|(k, v)| FilterOrderInfo {
                        column: k.clone(),
                        sort: match v.as_str().unwrap_or("asc").to_ascii_lowercase().as_str() {
                            "desc" => SortDirection::Desc,
                            _ => SortDirection::Asc,
                        },
                    })
                    .collect()
            }
            _ => vec![],
        };

        for info in &infos {
            Filter::validate_column(&info.column)?;
        }
        Ok(infos)
    }

    /// `-price,ratingsAverage` or `price desc, name`
    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let (col, mut sort) = match col.strip_prefix('-') {
                    Some(stripped) => (stripped, SortDirection::Desc),
                    None => (col, SortDirection::Asc),
                };
                if let Some(dir) = it.next() {
                    if dir.eq_ignore_ascii_case("desc") {
                        sort = SortDirection::Desc;
                    }
                }
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        out
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{} {}", Filter::json_path(&i.column), i.sort.to_sql()))
            .collect();
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// Stable in-memory sort matching the SQL ordering
    pub fn sort_documents(docs: &mut [Document], infos: &[FilterOrderInfo]) {
        docs.sort_by(|a, b| {
            for info in infos {
                let ordering = sort_key_cmp(a.get(&info.column), b.get(&info.column));
                let ordering = match info.sort {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

/// Same-type comparison; `None` when the JSON types differ
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

// Follows jsonb ordering: null < string < number < boolean < array < object
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn sort_key_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}
