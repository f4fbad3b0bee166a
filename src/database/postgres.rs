use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::schema::{Document, Schema};
use crate::database::store::{document_id, duplicate_value, DocumentStore, FieldStats};
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

const UNIQUE_VIOLATION: &str = "23505";

/// One table per collection: `id UUID PRIMARY KEY, data JSONB NOT NULL`
pub struct PgStore {
    pool: PgPool,
    log_queries: bool,
    /// Unique index name -> indexed fields, for mapping constraint violations
    indexes: RwLock<HashMap<String, &'static [&'static str]>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            log_queries: false,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Log every generated filter query at debug level
    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    fn log(&self, sql: &SqlResult) {
        if self.log_queries {
            tracing::debug!("SQL: {} ({} params)", sql.query, sql.params.len());
        }
    }

    fn table(collection: &str) -> Result<String, DatabaseError> {
        if !DatabaseManager::is_valid_collection_name(collection) {
            return Err(DatabaseError::QueryError(format!("Invalid collection name: {}", collection)));
        }
        Ok(DatabaseManager::quote_identifier(collection))
    }

    fn filter(collection: &str, data: &FilterData) -> Result<Filter, DatabaseError> {
        let mut filter = Filter::new(collection)?;
        filter.assign(data)?;
        Ok(filter)
    }

    fn bind_all<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
        sql: &'q SqlResult,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
        // Every parameter is compared against a jsonb path
        for param in &sql.params {
            query = query.bind(Json(param));
        }
        query
    }

    fn decode(row: &PgRow) -> Result<Document, DatabaseError> {
        let Json(doc): Json<Document> = row.try_get("data")?;
        Ok(doc)
    }

    /// Translate unique violations into `Duplicate`, naming the offending values
    fn write_error(&self, collection: &str, err: sqlx::Error, doc: &Document) -> DatabaseError {
        let constraint = match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => db.constraint().map(str::to_string),
            _ => return DatabaseError::Sqlx(err),
        };

        let fields: &[&str] = match constraint {
            Some(name) if name == format!("{}_pkey", collection) => &["id"],
            Some(name) => match self.indexes.read() {
                Ok(indexes) => indexes.get(&name).copied().unwrap_or(&[]),
                Err(_) => &[],
            },
            None => &[],
        };

        DatabaseError::Duplicate {
            collection: collection.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            value: duplicate_value(doc, fields),
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_collection(&self, schema: &Schema) -> Result<(), DatabaseError> {
        let table = Self::table(schema.collection)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id UUID PRIMARY KEY, data JSONB NOT NULL)",
            table
        ))
        .execute(&self.pool)
        .await?;

        for fields in &schema.unique {
            for field in fields.iter() {
                Filter::validate_column(field)?;
            }
            let name = DatabaseManager::unique_index_name(schema.collection, fields);
            let columns = fields
                .iter()
                .map(|f| format!("({})", Filter::json_path(f)))
                .collect::<Vec<_>>()
                .join(", ");
            sqlx::query(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                DatabaseManager::quote_identifier(&name),
                table,
                columns
            ))
            .execute(&self.pool)
            .await?;

            if let Ok(mut indexes) = self.indexes.write() {
                indexes.insert(name, fields);
            }
        }

        tracing::info!("Collection ready: {} ({} unique indexes)", schema.collection, schema.unique.len());
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, DatabaseError> {
        let table = Self::table(collection)?;
        let id = document_id(&doc)?;

        let result = sqlx::query(&format!("INSERT INTO {} (id, data) VALUES ($1, $2) RETURNING data", table))
            .bind(id)
            .bind(Json(&doc))
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => Self::decode(&row),
            Err(err) => Err(self.write_error(collection, err, &doc)),
        }
    }

    async fn select(&self, collection: &str, filter: &FilterData) -> Result<Vec<Document>, DatabaseError> {
        let sql = Self::filter(collection, filter)?.to_sql()?;
        self.log(&sql);
        let rows = Self::bind_all(sqlx::query(&sql.query), &sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| Self::decode(row).map(|doc| Filter::project(doc, filter.select.as_deref())))
            .collect()
    }

    async fn select_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DatabaseError> {
        let table = Self::table(collection)?;
        let row = sqlx::query(&format!("SELECT data FROM {} WHERE id = $1", table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn update_id(
        &self,
        collection: &str,
        id: Uuid,
        set: Document,
        unset: Vec<String>,
    ) -> Result<Option<Document>, DatabaseError> {
        let table = Self::table(collection)?;

        let result = sqlx::query(&format!(
            "UPDATE {} SET data = (data || $2) - $3::text[] WHERE id = $1 RETURNING data",
            table
        ))
        .bind(id)
        .bind(Json(&set))
        .bind(&unset)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.as_ref().map(Self::decode).transpose(),
            Err(err) => {
                // Report the duplicate against the merged values the client sent
                let mut doc = self.select_id(collection, id).await.ok().flatten().unwrap_or_default();
                doc.extend(set);
                Err(self.write_error(collection, err, &doc))
            }
        }
    }

    async fn delete_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DatabaseError> {
        let table = Self::table(collection)?;
        let row = sqlx::query(&format!("DELETE FROM {} WHERE id = $1 RETURNING data", table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn stats(&self, collection: &str, filter: &FilterData, field: &str) -> Result<FieldStats, DatabaseError> {
        let sql = Self::filter(collection, filter)?.to_stats_sql(field)?;
        self.log(&sql);
        let row = Self::bind_all(sqlx::query(&sql.query), &sql).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        let average: Option<f64> = row.try_get("average")?;
        Ok(FieldStats {
            count: count.max(0) as u64,
            average,
        })
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_validated_and_quoted() {
        assert_eq!(PgStore::table("tours").unwrap(), "\"tours\"");
        assert!(matches!(PgStore::table("tours; drop"), Err(DatabaseError::QueryError(_))));
    }

    #[test]
    fn filter_sql_reads_the_data_column() {
        let data = FilterData {
            where_clause: Some(serde_json::json!({ "price": { "$lt": 500 } })),
            order: Some(Value::String("-price,id".into())),
            limit: Some(10),
            offset: Some(20),
            soft_delete: None,
            select: None,
        };
        let sql = PgStore::filter("tours", &data).unwrap().to_sql().unwrap();
        assert!(sql.query.starts_with("SELECT \"data\" FROM \"tours\" WHERE"));
        assert!(sql.query.ends_with("LIMIT 10 OFFSET 20"));
        assert_eq!(sql.params.len(), 1);
    }
}
