use serde_json::Value;

use super::error::FilterError;
use super::filter::Filter;
use super::filter_order::compare_values;
use super::types::{FilterOp, FilterWhereInfo, FilterWhereOptions};
use crate::database::schema::Document;

/// Builds WHERE clauses over the JSONB `data` column and evaluates the same
/// conditions against in-memory documents
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            conditions: vec![],
        }
    }

    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(where_data, options)
    }

    pub fn generate_empty(options: &FilterWhereOptions) -> (String, Vec<Value>) {
        let mut filter_where = Self::new(0);
        let conditions: Vec<String> = filter_where.soft_delete_condition(options).into_iter().collect();
        let where_clause = if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" AND ") };
        (where_clause, filter_where.param_values)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        if where_data.is_null() {
            return Ok(());
        }
        match where_data {
            Value::Object(_) => Self::parse(where_data).map(|_| ()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Flatten `{ field: value | { "$op": value } }` into conditions
    pub fn parse(where_data: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        let mut filter_where = Self::new(0);
        filter_where.parse_where_data(where_data)?;
        Ok(filter_where.conditions)
    }

    /// In-memory counterpart of the generated SQL
    pub fn matches(where_data: Option<&Value>, doc: &Document, options: &FilterWhereOptions) -> Result<bool, FilterError> {
        if let Some(field) = &options.soft_delete {
            if doc.get(field) == Some(&Value::Bool(false)) {
                return Ok(false);
            }
        }

        let conditions = match where_data {
            Some(data) if !data.is_null() => Self::parse(data)?,
            _ => return Ok(true),
        };

        Ok(conditions.iter().all(|condition| Self::evaluate(condition, doc)))
    }

    fn evaluate(condition: &FilterWhereInfo, doc: &Document) -> bool {
        let actual = doc.get(&condition.column).unwrap_or(&Value::Null);
        let expected = &condition.data;

        match condition.operator {
            FilterOp::Eq => actual == expected || Self::numbers_equal(actual, expected),
            FilterOp::Ne => !(actual == expected || Self::numbers_equal(actual, expected)),
            FilterOp::In => expected
                .as_array()
                .map(|values| values.iter().any(|v| actual == v || Self::numbers_equal(actual, v)))
                .unwrap_or(false),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                // Comparisons across JSON types never match
                match compare_values(actual, expected) {
                    Some(ordering) => match condition.operator {
                        FilterOp::Gt => ordering.is_gt(),
                        FilterOp::Gte => ordering.is_ge(),
                        FilterOp::Lt => ordering.is_lt(),
                        _ => ordering.is_le(),
                    },
                    None => false,
                }
            }
        }
    }

    fn numbers_equal(a: &Value, b: &Value) -> bool {
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
            _ => false,
        }
    }

    fn build(&mut self, where_data: &Value, options: &FilterWhereOptions) -> Result<(String, Vec<Value>), FilterError> {
        self.param_values.clear();
        self.conditions.clear();

        self.parse_where_data(where_data)?;

        let mut sql_conditions: Vec<String> = self.soft_delete_condition(options).into_iter().collect();
        let conditions_snapshot = self.conditions.clone();
        for condition in &conditions_snapshot {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, self.param_values.clone()))
    }

    fn soft_delete_condition(&mut self, options: &FilterWhereOptions) -> Option<String> {
        let field = options.soft_delete.as_ref()?;
        Some(format!("{} IS DISTINCT FROM 'false'::jsonb", Filter::json_path(field)))
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        return Err(FilterError::InvalidWhereClause(format!("unsupported logical operator {}", key)));
                    }
                    Filter::validate_column(key)?;
                    self.parse_field_condition(key, value)?;
                }
                Ok(())
            }
            Value::Null => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(field, op_key)?;
                self.conditions.push(FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() });
            }
        } else {
            // Implicit equality: { field: value }
            self.conditions.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() });
        }
        Ok(())
    }

    fn map_operator(field: &str, op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            other => {
                return Err(FilterError::UnsupportedOperator {
                    field: field.to_string(),
                    operator: other.to_string(),
                })
            }
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let path = Filter::json_path(&condition.column);
        let data = condition.data.clone();

        Ok(match condition.operator {
            FilterOp::Eq if data.is_null() => format!("({} IS NULL OR {} = 'null'::jsonb)", path, path),
            FilterOp::Eq => format!("{} = {}", path, self.param(data)),
            FilterOp::Ne => format!("{} IS DISTINCT FROM {}", path, self.param(data)),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let symbol = match condition.operator {
                    FilterOp::Gt => ">",
                    FilterOp::Gte => ">=",
                    FilterOp::Lt => "<",
                    _ => "<=",
                };
                let param = self.param(data);
                // jsonb orders across types; restrict to same-type comparisons
                format!("(jsonb_typeof({}) = jsonb_typeof({}) AND {} {} {})", path, param, path, symbol, param)
            }
            FilterOp::In => {
                let values = match data {
                    Value::Array(values) => values,
                    other => vec![other],
                };
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                format!("{} IN ({})", path, params.join(", "))
            }
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn generates_parameterized_jsonb_sql() {
        let (sql, params) = FilterWhere::generate(
            &json!({ "difficulty": "easy", "price": { "$gte": 500 } }),
            0,
            &FilterWhereOptions::default(),
        )
        .unwrap();
        assert_eq!(
            sql,
            "\"data\"->'difficulty' = $1 AND (jsonb_typeof(\"data\"->'price') = jsonb_typeof($2) AND \"data\"->'price' >= $2)"
        );
        assert_eq!(params, vec![json!("easy"), json!(500)]);
    }

    #[test]
    fn soft_delete_condition_is_prepended() {
        let options = FilterWhereOptions { soft_delete: Some("active".into()) };
        let (sql, params) = FilterWhere::generate_empty(&options);
        assert_eq!(sql, "\"data\"->'active' IS DISTINCT FROM 'false'::jsonb");
        assert!(params.is_empty());
    }

    #[test]
    fn rejects_logical_operators_and_bad_fields() {
        let options = FilterWhereOptions::default();
        assert!(FilterWhere::generate(&json!({ "$or": [] }), 0, &options).is_err());
        assert!(FilterWhere::generate(&json!({ "a'b": 1 }), 0, &options).is_err());
        assert!(FilterWhere::generate(&json!({ "a": { "$regex": "x" } }), 0, &options).is_err());
    }

    #[test]
    fn evaluates_ranges_in_memory() {
        let where_data = json!({ "price": { "$gte": 500.0, "$lt": 1000 } });
        let options = FilterWhereOptions::default();
        assert!(FilterWhere::matches(Some(&where_data), &doc(json!({ "price": 500 })), &options).unwrap());
        assert!(FilterWhere::matches(Some(&where_data), &doc(json!({ "price": 997 })), &options).unwrap());
        assert!(!FilterWhere::matches(Some(&where_data), &doc(json!({ "price": 1000 })), &options).unwrap());
        assert!(!FilterWhere::matches(Some(&where_data), &doc(json!({ "price": "900" })), &options).unwrap());
        assert!(!FilterWhere::matches(Some(&where_data), &doc(json!({})), &options).unwrap());
    }

    #[test]
    fn ne_matches_missing_fields() {
        let options = FilterWhereOptions::default();
        let where_data = json!({ "role": { "$ne": "admin" } });
        assert!(FilterWhere::matches(Some(&where_data), &doc(json!({})), &options).unwrap());
        assert!(!FilterWhere::matches(Some(&where_data), &doc(json!({ "role": "admin" })), &options).unwrap());
    }

    #[test]
    fn soft_deleted_documents_never_match() {
        let options = FilterWhereOptions { soft_delete: Some("active".into()) };
        assert!(!FilterWhere::matches(None, &doc(json!({ "active": false })), &options).unwrap());
        assert!(FilterWhere::matches(None, &doc(json!({ "active": true })), &options).unwrap());
        assert!(FilterWhere::matches(None, &doc(json!({})), &options).unwrap());
    }
}
