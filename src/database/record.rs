use serde_json::Value;
use uuid::Uuid;

use crate::database::schema::Document;
use crate::types::Operation;

/// A document moving through the write pipeline, with change tracking
/// against the stored version
#[derive(Debug, Clone)]
pub struct Record {
    /// Stored state (None for CREATE operations until the store answers)
    original: Option<Document>,
    /// Current field values; for updates, the stored state merged with changes
    fields: Document,
    /// Id addressed by UPDATE and DELETE before the original is loaded
    target: Option<Uuid>,
    operation: Operation,
}

impl Record {
    /// New document from already-accepted input
    pub fn create(fields: Document) -> Self {
        Self {
            original: None,
            fields,
            target: None,
            operation: Operation::Create,
        }
    }

    /// Partial update of an existing document; changes are merged once the
    /// original is injected
    pub fn update(id: Uuid, changes: Document) -> Self {
        Self {
            original: None,
            fields: changes,
            target: Some(id),
            operation: Operation::Update,
        }
    }

    pub fn delete(id: Uuid) -> Self {
        Self {
            original: None,
            fields: Document::new(),
            target: Some(id),
            operation: Operation::Delete,
        }
    }

    /// Inject the stored document; pending changes are layered on top and
    /// a `null` change removes the field
    pub fn inject(&mut self, original: Document) -> &mut Self {
        let changes = std::mem::take(&mut self.fields);
        let mut merged = original.clone();
        for (key, value) in changes {
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
        self.fields = merged;
        self.original = Some(original);
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn is_new(&self) -> bool {
        self.operation == Operation::Create
    }

    pub fn id(&self) -> Option<Uuid> {
        self.target.or_else(|| {
            self.fields
                .get("id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set field only if it's currently empty/null
    pub fn set_if_empty(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if self.fields.get(&key).map(Value::is_null).unwrap_or(true) {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn original(&self) -> Option<&Document> {
        self.original.as_ref()
    }

    pub fn original_value(&self, key: &str) -> Option<&Value> {
        self.original.as_ref().and_then(|o| o.get(key))
    }

    pub fn fields(&self) -> &Document {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Document {
        &mut self.fields
    }

    pub fn into_fields(self) -> Document {
        self.fields
    }

    /// Check if a specific field has been changed
    pub fn changed(&self, key: &str) -> bool {
        match (&self.original, self.fields.get(key)) {
            (Some(original), Some(current)) => original.get(key) != Some(current),
            (Some(original), None) => original.contains_key(key),
            (None, Some(_)) => true, // New field on create
            (None, None) => false,
        }
    }

    /// Fields to write and fields to drop relative to the stored document
    pub fn patch(&self) -> (Document, Vec<String>) {
        let original = match &self.original {
            Some(original) => original,
            None => return (self.fields.clone(), Vec::new()),
        };

        let set = self
            .fields
            .iter()
            .filter(|(key, value)| original.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let unset = original
            .keys()
            .filter(|key| !self.fields.contains_key(*key))
            .cloned()
            .collect();

        (set, unset)
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(id: {:?}, operation: {:?}, fields: {})",
            self.id(),
            self.operation,
            self.fields.len()
        )
    }
}
