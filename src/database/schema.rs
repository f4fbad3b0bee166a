// Collection schemas: the explicit allow-list of fields a collection accepts,
// validates, filters on and hides from responses
use serde_json::{Map, Number, Value};

use crate::filter::FilterOp;

pub type Document = Map<String, Value>;

/// Fields the storage layer owns; never accepted from request bodies
pub const SYSTEM_FIELDS: &[&str] = &["id", "createdAt", "updatedAt", "__v"];

/// Internal version marker, bumped on every write and never returned
pub const VERSION_FIELD: &str = "__v";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// Reference to another document (UUID string)
    Id,
    /// RFC 3339 timestamp string
    Date,
    List,
}

impl FieldKind {
    /// Operators usable against this kind from the query string
    pub fn allows(&self, op: &FilterOp) -> bool {
        match self {
            FieldKind::Number | FieldKind::Date => true,
            FieldKind::String | FieldKind::Id | FieldKind::Boolean => {
                matches!(op, FilterOp::Eq | FilterOp::Ne)
            }
            FieldKind::List => false,
        }
    }

    /// Turn a raw query-string value into the JSON stored for this kind
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        match self {
            FieldKind::Number => {
                let n: f64 = raw.trim().parse().ok()?;
                Number::from_f64(n).map(Value::Number)
            }
            FieldKind::Boolean => match raw {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            FieldKind::Id => uuid::Uuid::parse_str(raw).ok().map(|id| Value::String(id.to_string())),
            FieldKind::Date => chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| Value::String(format_timestamp(dt.with_timezone(&chrono::Utc)))),
            FieldKind::String => Some(Value::String(raw.to_string())),
            FieldKind::List => None,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Number, Value::Number(_)) => true,
            (FieldKind::Boolean, Value::Bool(_)) => true,
            (FieldKind::Id, Value::String(s)) => uuid::Uuid::parse_str(s).is_ok(),
            (FieldKind::Date, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            (FieldKind::List, Value::Array(_)) => true,
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Id => "id",
            FieldKind::Date => "date",
            FieldKind::List => "list",
        }
    }
}

/// Timestamps are stored in one fixed format so string order equals time order
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &Value) -> Option<chrono::DateTime<chrono::Utc>> {
    value
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

/// Cross-field check run against the whole document
pub type DocumentCheck = fn(&Value, &Document) -> bool;

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: Option<&'static str>,
    pub hidden: bool,
    pub writable: bool,
    pub filterable: bool,
    pub trim: bool,
    pub lowercase: bool,
    pub default: Option<Value>,
    pub one_of: Option<(&'static [&'static str], &'static str)>,
    pub min: Option<(f64, &'static str)>,
    pub max: Option<(f64, &'static str)>,
    pub min_len: Option<(usize, &'static str)>,
    pub max_len: Option<(usize, &'static str)>,
    pub check: Option<(DocumentCheck, &'static str)>,
}

impl FieldSpec {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: None,
            hidden: false,
            writable: true,
            filterable: true,
            trim: false,
            lowercase: false,
            default: None,
            one_of: None,
            min: None,
            max: None,
            min_len: None,
            max_len: None,
            check: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn id(name: &'static str) -> Self {
        Self::new(name, FieldKind::Id)
    }

    pub fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn list(name: &'static str) -> Self {
        Self::new(name, FieldKind::List)
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    /// Never serialized in responses and never usable in queries
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self.filterable = false;
        self
    }

    /// Only set by server-side code, dropped from request bodies
    pub fn internal(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str], message: &'static str) -> Self {
        self.one_of = Some((values, message));
        self
    }

    pub fn min(mut self, min: f64, message: &'static str) -> Self {
        self.min = Some((min, message));
        self
    }

    pub fn max(mut self, max: f64, message: &'static str) -> Self {
        self.max = Some((max, message));
        self
    }

    pub fn min_len(mut self, len: usize, message: &'static str) -> Self {
        self.min_len = Some((len, message));
        self
    }

    pub fn max_len(mut self, len: usize, message: &'static str) -> Self {
        self.max_len = Some((len, message));
        self
    }

    pub fn check(mut self, check: DocumentCheck, message: &'static str) -> Self {
        self.check = Some((check, message));
        self
    }

    /// Validate one value; `doc` is the full document it belongs to
    fn validate(&self, value: Option<&Value>, doc: &Document, errors: &mut Vec<String>) {
        let value = match value {
            None | Some(Value::Null) => {
                if let Some(message) = self.required {
                    errors.push(message.to_string());
                }
                return;
            }
            Some(Value::String(s)) if s.is_empty() && self.required.is_some() => {
                errors.push(self.required.unwrap_or_default().to_string());
                return;
            }
            Some(value) => value,
        };

        if !self.kind.accepts(value) {
            errors.push(format!("{} must be a {}", self.name, self.kind.name()));
            return;
        }

        if let (Some((allowed, message)), Some(s)) = (self.one_of, value.as_str()) {
            if !allowed.contains(&s) {
                errors.push(message.to_string());
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some((min, message)) = self.min {
                if n < min {
                    errors.push(message.to_string());
                }
            }
            if let Some((max, message)) = self.max {
                if n > max {
                    errors.push(message.to_string());
                }
            }
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some((min, message)) = self.min_len {
                if len < min {
                    errors.push(message.to_string());
                }
            }
            if let Some((max, message)) = self.max_len {
                if len > max {
                    errors.push(message.to_string());
                }
            }
        }

        if let Some((check, message)) = self.check {
            if !check(value, doc) {
                errors.push(message.replace("{VALUE}", &display_value(value)));
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Related documents expanded into a read result
#[derive(Debug, Clone)]
pub enum Populate {
    /// Replace an id field with (a projection of) the referenced document
    Reference {
        field: &'static str,
        collection: &'static str,
        select: &'static [&'static str],
    },
    /// Attach the documents of another collection that point back at this one
    Virtual {
        name: &'static str,
        collection: &'static str,
        foreign_field: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub collection: &'static str,
    pub fields: Vec<FieldSpec>,
    /// Each entry is one unique index over the listed fields
    pub unique: Vec<&'static [&'static str]>,
    /// Boolean field that marks a document inactive when `false`
    pub soft_delete: Option<&'static str>,
    /// Expansions applied on every read
    pub populate: Vec<Populate>,
    /// Extra expansions applied only when reading a single document
    pub populate_one: Vec<Populate>,
}

impl Schema {
    pub fn new(collection: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            collection,
            fields,
            unique: Vec::new(),
            soft_delete: None,
            populate: Vec::new(),
            populate_one: Vec::new(),
        }
    }

    pub fn unique(mut self, fields: &'static [&'static str]) -> Self {
        self.unique.push(fields);
        self
    }

    pub fn soft_delete(mut self, field: &'static str) -> Self {
        self.soft_delete = Some(field);
        self
    }

    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    pub fn populate_one(mut self, populate: Populate) -> Self {
        self.populate_one.push(populate);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Kind of a field usable in queries, including the system timestamps
    pub fn filterable_kind(&self, name: &str) -> Option<FieldKind> {
        match name {
            "id" => Some(FieldKind::Id),
            "createdAt" | "updatedAt" => Some(FieldKind::Date),
            _ => self.field(name).filter(|f| f.filterable).map(|f| f.kind),
        }
    }

    /// Fields a client may name in `sort` or `fields`
    pub fn is_visible(&self, name: &str) -> bool {
        matches!(name, "id" | "createdAt" | "updatedAt")
            || self.field(name).map(|f| !f.hidden).unwrap_or(false)
            || self.populate_name(name)
    }

    fn populate_name(&self, name: &str) -> bool {
        self.populate.iter().chain(self.populate_one.iter()).any(|p| match p {
            Populate::Reference { field, .. } => *field == name,
            Populate::Virtual { name: virtual_name, .. } => *virtual_name == name,
        })
    }

    /// Keep only declared, client-writable fields of a request body
    pub fn accept_input(&self, input: Document) -> Document {
        input
            .into_iter()
            .filter(|(key, _)| {
                !SYSTEM_FIELDS.contains(&key.as_str())
                    && self.field(key).map(|f| f.writable).unwrap_or(false)
            })
            .collect()
    }

    /// Fill defaults for absent fields (create only)
    pub fn apply_defaults(&self, doc: &mut Document) {
        for field in &self.fields {
            if let Some(default) = &field.default {
                if doc.get(field.name).map(Value::is_null).unwrap_or(true) {
                    doc.insert(field.name.to_string(), default.clone());
                }
            }
        }
    }

    /// Trim and lowercase string fields as declared
    pub fn normalize(&self, doc: &mut Document) {
        for field in self.fields.iter().filter(|f| f.trim || f.lowercase) {
            if let Some(Value::String(s)) = doc.get_mut(field.name) {
                if field.trim {
                    *s = s.trim().to_string();
                }
                if field.lowercase {
                    *s = s.to_lowercase();
                }
            }
        }
    }

    /// Validate a complete document; returns one message per failure
    pub fn validate(&self, doc: &Document) -> Vec<String> {
        let mut errors = Vec::new();
        for field in &self.fields {
            field.validate(doc.get(field.name), doc, &mut errors);
        }
        errors
    }

    /// Strip hidden fields and the version marker for a response
    pub fn to_public(&self, mut doc: Document) -> Document {
        doc.remove(VERSION_FIELD);
        for field in self.fields.iter().filter(|f| f.hidden) {
            doc.remove(field.name);
        }
        doc
    }

    /// Whether a stored document is excluded from default reads
    pub fn is_inactive(&self, doc: &Document) -> bool {
        match self.soft_delete {
            Some(field) => doc.get(field) == Some(&Value::Bool(false)),
            None => false,
        }
    }
}

/// Basic email shape check: one `@`, non-empty parts, a dotted domain, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return false;
    }

    let domain = parts[1];
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Schema {
        Schema::new(
            "things",
            vec![
                FieldSpec::string("name").required("A thing must have a name").trim().max_len(5, "Name too long"),
                FieldSpec::string("email").lowercase().check(|v, _| v.as_str().map(is_valid_email).unwrap_or(false), "Provide a valid email"),
                FieldSpec::number("rating").min(1.0, "Rating must be above 1.0").max(5.0, "Rating must be below 5.0").default(4.5),
                FieldSpec::string("kind").one_of(&["a", "b"], "Kind is either: a, b"),
                FieldSpec::string("secret").hidden().internal(),
            ],
        )
        .soft_delete("active")
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn reports_every_failed_field() {
        let errors = sample().validate(&doc(json!({ "rating": 9, "kind": "c" })));
        assert_eq!(
            errors,
            vec!["A thing must have a name", "Rating must be below 5.0", "Kind is either: a, b"]
        );
    }

    #[test]
    fn rejects_wrong_kinds() {
        let errors = sample().validate(&doc(json!({ "name": "x", "rating": "high" })));
        assert_eq!(errors, vec!["rating must be a number"]);
    }

    #[test]
    fn normalizes_and_defaults() {
        let schema = sample();
        let mut d = doc(json!({ "name": "  abc ", "email": "A@B.IO" }));
        schema.normalize(&mut d);
        schema.apply_defaults(&mut d);
        assert_eq!(d["name"], "abc");
        assert_eq!(d["email"], "a@b.io");
        assert_eq!(d["rating"], 4.5);
        assert!(schema.validate(&d).is_empty());
    }

    #[test]
    fn input_drops_unknown_system_and_internal_fields() {
        let accepted = sample().accept_input(doc(json!({
            "name": "abc", "id": "x", "__v": 3, "secret": "s", "bogus": true
        })));
        assert_eq!(Value::Object(accepted), json!({ "name": "abc" }));
    }

    #[test]
    fn public_view_hides_fields() {
        let public = sample().to_public(doc(json!({ "name": "abc", "secret": "s", "__v": 2 })));
        assert_eq!(Value::Object(public), json!({ "name": "abc" }));
    }

    #[test]
    fn hidden_fields_are_not_filterable() {
        let schema = sample();
        assert_eq!(schema.filterable_kind("rating"), Some(FieldKind::Number));
        assert_eq!(schema.filterable_kind("createdAt"), Some(FieldKind::Date));
        assert_eq!(schema.filterable_kind("secret"), None);
        assert_eq!(schema.filterable_kind("nope"), None);
    }

    #[test]
    fn coerces_query_values() {
        assert_eq!(FieldKind::Number.coerce("500"), Some(json!(500.0)));
        assert_eq!(FieldKind::Number.coerce("abc"), None);
        assert_eq!(FieldKind::Boolean.coerce("false"), Some(json!(false)));
        assert_eq!(FieldKind::Id.coerce("nope"), None);
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("jonas@example.com"));
        assert!(!is_valid_email("jonas@example"));
        assert!(!is_valid_email("jonas example@x.io"));
        assert!(!is_valid_email("@x.io"));
        assert!(!is_valid_email("a@b@c.io"));
    }

    #[test]
    fn soft_delete_marker() {
        let schema = sample();
        assert!(schema.is_inactive(&doc(json!({ "active": false }))));
        assert!(!schema.is_inactive(&doc(json!({ "active": true }))));
        assert!(!schema.is_inactive(&doc(json!({}))));
    }
}
