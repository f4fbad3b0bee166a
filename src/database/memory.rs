// In-process document store; same query semantics as the Postgres store
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::schema::{Document, Schema};
use crate::database::store::{document_id, duplicate_value, DocumentStore, FieldStats};
use crate::filter::filter_order::FilterOrder;
use crate::filter::filter_where::FilterWhere;
use crate::filter::{Filter, FilterData, FilterWhereOptions};

#[derive(Default)]
struct Collection {
    docs: BTreeMap<Uuid, Document>,
    unique: Vec<&'static [&'static str]>,
}

impl Collection {
    /// First unique index `doc` would violate, ignoring the document itself
    fn find_duplicate(&self, id: Uuid, doc: &Document) -> Option<&'static [&'static str]> {
        self.unique.iter().copied().find(|fields| {
            let key: Option<Vec<&Value>> = fields
                .iter()
                .map(|f| doc.get(*f).filter(|v| !v.is_null()))
                .collect();
            let key = match key {
                Some(key) => key,
                None => return false,
            };
            self.docs.iter().any(|(other_id, other)| {
                *other_id != id && fields.iter().zip(&key).all(|(f, v)| other.get(*f) == Some(*v))
            })
        })
    }

    fn check_unique(&self, collection: &str, id: Uuid, doc: &Document) -> Result<(), DatabaseError> {
        match self.find_duplicate(id, doc) {
            Some(fields) => Err(DatabaseError::Duplicate {
                collection: collection.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
                value: duplicate_value(doc, fields),
            }),
            None => Ok(()),
        }
    }

    fn matching(&self, filter: &FilterData) -> Result<Vec<&Document>, DatabaseError> {
        let options = FilterWhereOptions { soft_delete: filter.soft_delete.clone() };
        let mut out = Vec::new();
        for doc in self.docs.values() {
            if FilterWhere::matches(filter.where_clause.as_ref(), doc, &options)? {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_collection(&self, schema: &Schema) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(schema.collection.to_string()).or_default();
        collection.unique = schema.unique.clone();
        tracing::debug!("Memory collection ready: {} ({} unique indexes)", schema.collection, schema.unique.len());
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, DatabaseError> {
        let id = document_id(&doc)?;
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.docs.contains_key(&id) {
            return Err(DatabaseError::Duplicate {
                collection: collection.to_string(),
                fields: vec!["id".to_string()],
                value: id.to_string(),
            });
        }
        coll.check_unique(collection, id, &doc)?;
        coll.docs.insert(id, doc.clone());
        Ok(doc)
    }

    async fn select(&self, collection: &str, filter: &FilterData) -> Result<Vec<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        let coll = match collections.get(collection) {
            Some(coll) => coll,
            None => return Ok(vec![]),
        };

        let mut docs: Vec<Document> = coll.matching(filter)?.into_iter().cloned().collect();

        if let Some(order) = &filter.order {
            let infos = FilterOrder::validate_and_parse(order)?;
            FilterOrder::sort_documents(&mut docs, &infos);
        }

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|doc| Filter::project(doc, filter.select.as_deref()))
            .collect())
    }

    async fn select_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.docs.get(&id)).cloned())
    }

    async fn update_id(
        &self,
        collection: &str,
        id: Uuid,
        set: Document,
        unset: Vec<String>,
    ) -> Result<Option<Document>, DatabaseError> {
        let mut collections = self.collections.write().await;
        let coll = match collections.get_mut(collection) {
            Some(coll) => coll,
            None => return Ok(None),
        };

        let mut updated = match coll.docs.get(&id) {
            Some(existing) => existing.clone(),
            None => return Ok(None),
        };
        for field in &unset {
            updated.remove(field);
        }
        for (key, value) in set {
            updated.insert(key, value);
        }

        coll.check_unique(collection, id, &updated)?;
        coll.docs.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DatabaseError> {
        let mut collections = self.collections.write().await;
        Ok(collections.get_mut(collection).and_then(|c| c.docs.remove(&id)))
    }

    async fn stats(&self, collection: &str, filter: &FilterData, field: &str) -> Result<FieldStats, DatabaseError> {
        let collections = self.collections.read().await;
        let docs = match collections.get(collection) {
            Some(coll) => coll.matching(filter)?,
            None => vec![],
        };

        let values: Vec<f64> = docs.iter().filter_map(|d| d.get(field).and_then(Value::as_f64)).collect();
        let average = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };

        Ok(FieldStats {
            count: docs.len() as u64,
            average,
        })
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::FieldSpec;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let schema = Schema::new("reviews", vec![FieldSpec::id("tour"), FieldSpec::id("user"), FieldSpec::number("rating")])
            .unique(&["tour", "user"]);
        store.ensure_collection(&schema).await.unwrap();
        store
    }

    #[tokio::test]
    async fn unique_index_rejects_second_pair() {
        let store = store().await;
        let (tour, user) = (Uuid::new_v4().to_string(), Uuid::new_v4().to_string());

        store
            .insert("reviews", doc(json!({ "id": Uuid::new_v4().to_string(), "tour": tour, "user": user })))
            .await
            .unwrap();
        let err = store
            .insert("reviews", doc(json!({ "id": Uuid::new_v4().to_string(), "tour": tour, "user": user })))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate { .. }));

        // Same user, other tour is fine
        store
            .insert(
                "reviews",
                doc(json!({ "id": Uuid::new_v4().to_string(), "tour": Uuid::new_v4().to_string(), "user": user })),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_merges_and_unsets() {
        let store = store().await;
        let id = Uuid::new_v4();
        store
            .insert("reviews", doc(json!({ "id": id.to_string(), "rating": 3, "note": "x" })))
            .await
            .unwrap();

        let updated = store
            .update_id("reviews", id, doc(json!({ "rating": 5 })), vec!["note".into()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(updated), json!({ "id": id.to_string(), "rating": 5 }));

        assert!(store.update_id("reviews", Uuid::new_v4(), Document::new(), vec![]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn select_filters_sorts_and_pages() {
        let store = store().await;
        for rating in [4, 1, 5, 2, 3] {
            store
                .insert("reviews", doc(json!({ "id": Uuid::new_v4().to_string(), "rating": rating })))
                .await
                .unwrap();
        }

        let filter = FilterData {
            where_clause: Some(json!({ "rating": { "$gte": 2 } })),
            order: Some(json!("-rating")),
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        };
        let ratings: Vec<Value> = store
            .select("reviews", &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d["rating"].clone())
            .collect();
        assert_eq!(ratings, vec![json!(4), json!(3)]);
    }

    #[tokio::test]
    async fn stats_over_matching_documents() {
        let store = store().await;
        let tour = Uuid::new_v4().to_string();
        for rating in [4, 5] {
            store
                .insert("reviews", doc(json!({ "id": Uuid::new_v4().to_string(), "tour": tour, "rating": rating })))
                .await
                .unwrap();
        }

        let filter = FilterData { where_clause: Some(json!({ "tour": tour })), ..Default::default() };
        let stats = store.stats("reviews", &filter, "rating").await.unwrap();
        assert_eq!(stats, FieldStats { count: 2, average: Some(4.5) });

        let none = FilterData { where_clause: Some(json!({ "tour": "other" })), ..Default::default() };
        assert_eq!(store.stats("reviews", &none, "rating").await.unwrap(), FieldStats { count: 0, average: None });
    }
}
