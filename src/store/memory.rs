use super::{Document, DocumentStore, Fields, Filter, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store. Documents are kept serialized so filters see exactly what
/// the Postgres backend would store.
#[derive(Debug)]
pub struct MemoryStore<T> {
    documents: RwLock<BTreeMap<Uuid, Value>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Document> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Document> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_unique<T: Document>(
    documents: &BTreeMap<Uuid, Value>,
    id: Uuid,
    candidate: &Value,
) -> StoreResult<()> {
    for field in T::UNIQUE_FIELDS {
        let Some(value) = candidate.get(*field).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken = documents
            .iter()
            .any(|(other_id, other)| *other_id != id && other.get(*field) == Some(value));
        if taken {
            return Err(StoreError::Duplicate((*field).to_string()));
        }
    }
    Ok(())
}

#[async_trait]
impl<T: Document> DocumentStore<T> for MemoryStore<T> {
    async fn create(&self, document: &T) -> StoreResult<()> {
        let id = document.id();
        let value = serde_json::to_value(document)?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        check_unique::<T>(&documents, id, &value)?;
        documents.insert(id, value);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>> {
        let documents = self.documents.read().await;
        documents
            .get(&id)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn update_fields(&self, id: Uuid, fields: Fields) -> StoreResult<bool> {
        let mut documents = self.documents.write().await;
        let Some(mut merged) = documents.get(&id).cloned() else {
            return Ok(false);
        };
        if let Value::Object(object) = &mut merged {
            object.extend(fields);
        }
        // The merged body must still decode before it replaces the stored one.
        serde_json::from_value::<T>(merged.clone())?;
        check_unique::<T>(&documents, id, &merged)?;
        documents.insert(id, merged);
        Ok(true)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.documents.write().await.remove(&id).is_some())
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let documents = self.documents.read().await;
        documents
            .values()
            .filter(|value| filter.matches(value))
            .map(|value| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Widget {
        id: Uuid,
        name: String,
        is_blue: bool,
    }

    impl Document for Widget {
        const COLLECTION: &'static str = "widgets";
        const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn widget(name: &str, is_blue: bool) -> Widget {
        Widget {
            id: Uuid::now_v7(),
            name: name.to_string(),
            is_blue,
        }
    }

    #[tokio::test]
    async fn create_get_update_delete() -> StoreResult<()> {
        let store = MemoryStore::<Widget>::new();
        let mut w = widget("gear", true);
        store.create(&w).await?;
        assert_eq!(store.get_by_id(w.id).await?, Some(w.clone()));

        w.is_blue = false;
        assert!(store.save_fields(&w, &["isBlue"]).await?);
        assert_eq!(store.get_by_id(w.id).await?.map(|w| w.is_blue), Some(false));

        assert!(store.delete_by_id(w.id).await?);
        assert!(!store.delete_by_id(w.id).await?);
        assert_eq!(store.get_by_id(w.id).await?, None);
        assert!(!store.save_fields(&w, &["isBlue"]).await?);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_duplicate_unique_fields() -> StoreResult<()> {
        let store = MemoryStore::<Widget>::new();
        let first = widget("gear", true);
        store.create(&first).await?;

        let err = store.create(&widget("gear", false)).await;
        assert!(matches!(err, Err(StoreError::Duplicate(field)) if field == "name"));
        assert!(matches!(
            store.create(&first).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let mut second = widget("cog", true);
        store.create(&second).await?;
        second.name = "gear".to_string();
        assert!(matches!(
            store.save_fields(&second, &["name"]).await,
            Err(StoreError::Duplicate(_))
        ));

        // Updating a document with its own value is not a conflict.
        assert!(store.save_fields(&first, &["name"]).await?);
        Ok(())
    }

    #[tokio::test]
    async fn find_preserves_creation_order() -> StoreResult<()> {
        let store = MemoryStore::<Widget>::new();
        let names = ["a", "b", "c", "d"];
        for (i, name) in names.iter().enumerate() {
            store.create(&widget(name, i % 2 == 0)).await?;
        }

        let all: Vec<String> = store
            .find(&Filter::All)
            .await?
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(all, names);

        let blue: Vec<String> = store
            .find(&Filter::eq("isBlue", true))
            .await?
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(blue, ["a", "c"]);

        let found = store.find_one(&Filter::eq("name", "d")).await?;
        assert_eq!(found.map(|w| w.name), Some("d".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn field_updates_keep_other_fields() -> StoreResult<()> {
        let store = MemoryStore::<Widget>::new();
        let w = widget("gear", true);
        store.create(&w).await?;

        // Two writers holding the same stale copy, each changing a different field.
        let mut renamed = w.clone();
        renamed.name = "cog".to_string();
        let mut recolored = w.clone();
        recolored.is_blue = false;
        store.save_fields(&renamed, &["name"]).await?;
        store.save_fields(&recolored, &["isBlue"]).await?;

        let stored = store.get_by_id(w.id).await?;
        assert_eq!(stored.as_ref().map(|w| w.name.as_str()), Some("cog"));
        assert_eq!(stored.map(|w| w.is_blue), Some(false));
        Ok(())
    }

    #[tokio::test]
    async fn field_updates_must_still_decode() -> StoreResult<()> {
        let store = MemoryStore::<Widget>::new();
        let w = widget("gear", true);
        store.create(&w).await?;

        let mut fields = Fields::new();
        fields.insert("isBlue".to_string(), Value::from("very"));
        assert!(matches!(
            store.update_fields(w.id, fields).await,
            Err(StoreError::Serde(_))
        ));
        assert_eq!(store.get_by_id(w.id).await?, Some(w));
        Ok(())
    }
}
