//! Generic document storage.
//!
//! Every persisted entity is a JSON document identified by a UUID and grouped in a
//! collection. Entity repositories hold an `Arc<dyn DocumentStore<T>>` and add their
//! own lookups on top of `find`.
//!
//! Writes after creation are field-level: a caller names the fields it changed and
//! every other field keeps its stored value, so two writers touching different
//! fields never undo each other.
//!
//! Two backends exist: `MemoryStore` for local runs and tests, and `PgDocumentStore`
//! which keeps every collection in a single `documents` table with a `jsonb` body.
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::PgDocumentStore;

/// A persisted entity.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (table partition) the document lives in.
    const COLLECTION: &'static str;

    /// Top-level fields whose values must be unique within the collection.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Uuid;
}

/// Predicate over top-level document fields, compared as JSON values.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self::Eq(field, value.into())
    }

    pub fn is_in<I, V>(field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In(field, values.into_iter().map(Into::into).collect())
    }

    /// Evaluate the filter against a serialized document.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => document.get(*field) == Some(value),
            Self::In(field, values) => document
                .get(*field)
                .is_some_and(|current| values.contains(current)),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(document)),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for {0}")]
    Duplicate(String),
    #[error("document {0} already exists")]
    AlreadyExists(Uuid),
    #[error("failed to encode or decode document")]
    Serde(#[from] serde_json::Error),
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Top-level document fields to overwrite.
pub type Fields = serde_json::Map<String, Value>;

/// The capability set every entity repository builds on.
#[async_trait]
pub trait DocumentStore<T: Document>: Send + Sync {
    /// Insert a new document; fails if the id or a unique field already exists.
    async fn create(&self, document: &T) -> StoreResult<()>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>>;

    /// Overwrite `fields` of a stored document, leaving the rest as stored. A `null`
    /// value clears an optional field. Returns `false` if no document had that id.
    async fn update_fields(&self, id: Uuid, fields: Fields) -> StoreResult<bool>;

    /// Write back the named top-level fields of `document`. Names missing from its
    /// serialized form (skipped `None`s) are written as `null`.
    async fn save_fields(&self, document: &T, names: &[&str]) -> StoreResult<bool> {
        let value = serde_json::to_value(document)?;
        let fields = names
            .iter()
            .map(|name| {
                let current = value.get(*name).cloned().unwrap_or(Value::Null);
                ((*name).to_string(), current)
            })
            .collect();
        self.update_fields(document.id(), fields).await
    }

    /// Hard delete. Returns `false` if no document had that id.
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;

    /// Documents matching `filter`, in creation order.
    async fn find(&self, filter: &Filter) -> StoreResult<Vec<T>>;

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<T>> {
        Ok(self.find(filter).await?.into_iter().next())
    }
}

pub type SharedStore<T> = Arc<dyn DocumentStore<T>>;

/// Build one store per entity, backed either by Postgres or by memory.
pub trait StoreFactory {
    fn store<T: Document>(&self) -> SharedStore<T>;
}

/// Creates fresh in-memory stores.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryBackend;

impl StoreFactory for MemoryBackend {
    fn store<T: Document>(&self) -> SharedStore<T> {
        Arc::new(MemoryStore::<T>::new())
    }
}

#[derive(Clone, Debug)]
pub struct PgBackend {
    pool: sqlx::PgPool,
}

impl PgBackend {
    #[must_use]
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

impl StoreFactory for PgBackend {
    fn store<T: Document>(&self) -> SharedStore<T> {
        Arc::new(PgDocumentStore::<T>::new(self.pool.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_top_level_fields() {
        let doc = json!({"email": "bob@example.com", "isSent": false, "flow": "email"});

        assert!(Filter::All.matches(&doc));
        assert!(Filter::eq("isSent", false).matches(&doc));
        assert!(!Filter::eq("isSent", true).matches(&doc));
        assert!(!Filter::eq("missing", "x").matches(&doc));
        assert!(Filter::is_in("flow", ["email", "in_app"]).matches(&doc));
        assert!(!Filter::is_in("flow", Vec::<String>::new()).matches(&doc));
        assert!(Filter::And(vec![
            Filter::eq("isSent", false),
            Filter::eq("flow", "email"),
        ])
        .matches(&doc));
        assert!(!Filter::And(vec![
            Filter::eq("isSent", false),
            Filter::eq("flow", "in_app"),
        ])
        .matches(&doc));
    }
}
