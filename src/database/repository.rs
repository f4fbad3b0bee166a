use std::collections::{BTreeSet, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::schema_for;
use crate::database::record::Record;
use crate::database::schema::{Document, Populate, Schema};
use crate::database::store::{parse_id, DocumentStore};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Filter, FilterData};
use crate::observer::ObserverPipeline;
use crate::types::Operation;

/// An entity served by the generic handlers
pub trait Resource: Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn schema() -> &'static Schema;
}

/// Typed access to one collection. Writes run through the observer pipeline;
/// reads go straight to the store and hide soft-deleted documents.
pub struct Repository<E: Resource> {
    store: Arc<dyn DocumentStore>,
    pipeline: Arc<ObserverPipeline>,
    _resource: PhantomData<fn() -> E>,
}

impl<E: Resource> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone(), self.pipeline.clone())
    }
}

impl<E: Resource> Repository<E> {
    pub fn new(store: Arc<dyn DocumentStore>, pipeline: Arc<ObserverPipeline>) -> Self {
        Self {
            store,
            pipeline,
            _resource: PhantomData,
        }
    }

    pub fn schema(&self) -> &'static Schema {
        E::schema()
    }

    pub async fn insert(&self, fields: Document) -> ApiResult<Document> {
        let mut docs = self.run(Operation::Create, Record::create(fields)).await?;
        docs.pop().ok_or_else(|| ApiError::unexpected("store returned no document"))
    }

    /// Single document with every reference and virtual expanded
    pub async fn find_by_id(&self, raw_id: &str) -> ApiResult<Document> {
        let id = parse_id(raw_id)?;
        let doc = self.find_active(id).await?.ok_or_else(ApiError::no_document)?;

        let schema = E::schema();
        let populates: Vec<Populate> = schema.populate.iter().chain(&schema.populate_one).cloned().collect();
        let mut docs = vec![doc];
        populate(self.store.as_ref(), &mut docs, &populates).await?;
        docs.pop().ok_or_else(ApiError::no_document)
    }

    /// Active document as stored, hidden fields included
    pub async fn find_active(&self, id: Uuid) -> ApiResult<Option<Document>> {
        let doc = self.store.select_id(E::COLLECTION, id).await?;
        Ok(doc.filter(|doc| !E::schema().is_inactive(doc)))
    }

    pub async fn find(&self, filter: &FilterData) -> ApiResult<Vec<Document>> {
        let mut filter = filter.clone();
        if filter.soft_delete.is_none() {
            filter.soft_delete = E::schema().soft_delete.map(str::to_string);
        }

        let mut docs = self.store.select(E::COLLECTION, &filter).await?;
        populate(self.store.as_ref(), &mut docs, &E::schema().populate).await?;
        Ok(docs)
    }

    /// First active document matching `where_clause`, hidden fields included
    pub async fn find_one(&self, where_clause: Value) -> ApiResult<Option<Document>> {
        let filter = FilterData {
            where_clause: Some(where_clause),
            limit: Some(1),
            soft_delete: E::schema().soft_delete.map(str::to_string),
            ..Default::default()
        };
        Ok(self.store.select(E::COLLECTION, &filter).await?.into_iter().next())
    }

    pub async fn update_by_id(&self, raw_id: &str, changes: Document) -> ApiResult<Document> {
        let id = parse_id(raw_id)?;
        self.update(id, changes).await
    }

    /// Merge `changes` into the stored document; a `null` value removes the field
    pub async fn update(&self, id: Uuid, changes: Document) -> ApiResult<Document> {
        let mut docs = self.run(Operation::Update, Record::update(id, changes)).await?;
        docs.pop().ok_or_else(ApiError::no_document)
    }

    pub async fn delete_by_id(&self, raw_id: &str) -> ApiResult<()> {
        let id = parse_id(raw_id)?;
        self.run(Operation::Delete, Record::delete(id)).await?;
        Ok(())
    }

    async fn run(&self, operation: Operation, record: Record) -> ApiResult<Vec<Document>> {
        let result = self
            .pipeline
            .execute(operation, E::schema(), self.store.clone(), vec![record])
            .await
            .map_err(ApiError::from)?;

        if !result.warnings.is_empty() {
            tracing::debug!(
                "{:?} on {} finished with {} warnings",
                operation,
                E::COLLECTION,
                result.warnings.len()
            );
        }
        Ok(result.records)
    }
}

/// Expand references and virtual lists on already-loaded documents
pub async fn populate(store: &dyn DocumentStore, docs: &mut [Document], populates: &[Populate]) -> Result<(), DatabaseError> {
    for populate in populates {
        match populate {
            Populate::Reference { field, collection, select } => {
                populate_reference(store, docs, field, collection, select).await?;
            }
            Populate::Virtual { name, collection, foreign_field } => {
                let child_schema = schema_for(collection);
                for doc in docs.iter_mut() {
                    let id = match doc.get("id").and_then(Value::as_str) {
                        Some(id) => id.to_string(),
                        None => continue,
                    };

                    let mut condition = serde_json::Map::new();
                    condition.insert(foreign_field.to_string(), Value::String(id));
                    let filter = FilterData {
                        where_clause: Some(Value::Object(condition)),
                        order: Some(json!("createdAt,id")),
                        soft_delete: child_schema.and_then(|s| s.soft_delete).map(str::to_string),
                        ..Default::default()
                    };
                    let mut children = store.select(collection, &filter).await?;

                    if let Some(child_schema) = child_schema {
                        for child_populate in &child_schema.populate {
                            if let Populate::Reference { field, collection, select } = child_populate {
                                populate_reference(store, &mut children, field, collection, select).await?;
                            }
                        }
                        children = children.into_iter().map(|c| child_schema.to_public(c)).collect();
                    }

                    doc.insert(name.to_string(), Value::Array(children.into_iter().map(Value::Object).collect()));
                }
            }
        }
    }
    Ok(())
}

/// Replace an id field with the projected referenced document; one batched
/// lookup per call. Dangling references become `null`.
async fn populate_reference(
    store: &dyn DocumentStore,
    docs: &mut [Document],
    field: &str,
    collection: &str,
    select: &[&str],
) -> Result<(), DatabaseError> {
    let ids: BTreeSet<String> = docs
        .iter()
        .filter_map(|doc| doc.get(field).and_then(Value::as_str).map(str::to_string))
        .collect();
    if ids.is_empty() {
        return Ok(());
    }

    let target = schema_for(collection);
    let filter = FilterData {
        where_clause: Some(json!({ "id": { "$in": ids } })),
        soft_delete: target.and_then(|s| s.soft_delete).map(str::to_string),
        ..Default::default()
    };
    let select: Vec<String> = select.iter().map(|s| s.to_string()).collect();

    let found: HashMap<String, Document> = store
        .select(collection, &filter)
        .await?
        .into_iter()
        .filter_map(|doc| {
            let id = doc.get("id").and_then(Value::as_str)?.to_string();
            let doc = Filter::project(doc, Some(select.as_slice()));
            let doc = match target {
                Some(schema) => schema.to_public(doc),
                None => doc,
            };
            Some((id, doc))
        })
        .collect();

    for doc in docs.iter_mut() {
        let id = match doc.get(field).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => continue,
        };
        let expanded = found.get(&id).cloned().map(Value::Object).unwrap_or(Value::Null);
        doc.insert(field.to_string(), expanded);
    }
    Ok(())
}
