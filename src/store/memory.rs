use std::collections::{BTreeMap, HashMap, HashSet};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BoxStream, Filter, InsertOutcome, StoreBackend, StoreResult, StoredDoc};

/// In-memory store backend for testing and development.
///
/// One lock guards the whole store, so every primitive is trivially atomic
/// and `pop_min` partitions documents disjointly across concurrent callers.
/// `find` snapshots matching documents under the lock; decoding downstream
/// stays lazy.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// collection name -> id -> document
    collections: HashMap<String, BTreeMap<String, StoredDoc>>,

    /// Declared secondary indexes: collection name -> fields.
    /// Bookkeeping only; lookups here scan regardless.
    indexes: HashMap<String, HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Declared index fields for a collection (test introspection)
    pub fn indexed_fields(&self, collection: &str) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .indexes
            .get(collection)
            .map(|fields| {
                let mut sorted: Vec<String> = fields.iter().cloned().collect();
                sorted.sort();
                sorted
            })
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn insert_unique(&self, collection: &str, doc: StoredDoc) -> StoreResult<InsertOutcome> {
        let mut inner = self.inner.write();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&doc.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        docs.insert(doc.id.clone(), doc);
        Ok(InsertOutcome::Inserted)
    }

    async fn pop_min(&self, collection: &str, sort_field: &str) -> StoreResult<Option<StoredDoc>> {
        let mut inner = self.inner.write();
        let Some(docs) = inner.collections.get_mut(collection) else {
            return Ok(None);
        };
        // Missing sort keys order first; ties break on id for determinism.
        let min_id = docs
            .values()
            .min_by_key(|doc| (doc.sort_key(sort_field), doc.id.clone()))
            .map(|doc| doc.id.clone());
        Ok(min_id.and_then(|id| docs.remove(&id)))
    }

    async fn fetch_increment(&self, collection: &str, id: &str, field: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        let doc = docs
            .entry(id.to_string())
            .or_insert_with(|| StoredDoc::new(id).with_field(field, 0.into()));
        let next = doc.sort_key(field).unwrap_or(0) + 1;
        doc.fields.insert(field.to_string(), next.into());
        Ok(next)
    }

    async fn remove_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDoc>> {
        let mut inner = self.inner.write();
        Ok(inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id)))
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDoc>> {
        let inner = self.inner.read();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, doc: StoredDoc) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        docs.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn ensure_index(&self, collection: &str, field: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner
            .indexes
            .entry(collection.to_string())
            .or_default()
            .insert(field.to_string());
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.collections.remove(collection);
        inner.indexes.remove(collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        let inner = self.inner.read();
        Ok(inner
            .collections
            .get(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn find(
        &self,
        collection: &str,
        filter: Option<Filter>,
    ) -> StoreResult<BoxStream<StoreResult<StoredDoc>>> {
        let snapshot: Vec<StoredDoc> = {
            let inner = self.inner.read();
            inner
                .collections
                .get(collection)
                .map(|docs| {
                    docs.values()
                        .filter(|doc| filter.as_ref().map(|f| f.matches(doc)).unwrap_or(true))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(Box::pin(tokio_stream::iter(snapshot.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn insert_unique_rejects_duplicates() {
        let store = MemoryStore::new();
        let first = store
            .insert_unique("c", StoredDoc::new("a").with_field("v", json!(1)))
            .await
            .unwrap();
        assert_eq!(first, InsertOutcome::Inserted);

        let second = store
            .insert_unique("c", StoredDoc::new("a").with_field("v", json!(2)))
            .await
            .unwrap();
        assert_eq!(second, InsertOutcome::AlreadyExists);

        // Original document untouched
        let doc = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(doc.get("v"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn pop_min_returns_smallest_then_empty() {
        let store = MemoryStore::new();
        for (id, seq) in [("b", 2u64), ("a", 5), ("c", 1)] {
            store
                .insert_unique("c", StoredDoc::new(id).with_field("seq", seq.into()))
                .await
                .unwrap();
        }
        let order: Vec<String> = [
            store.pop_min("c", "seq").await.unwrap().unwrap().id,
            store.pop_min("c", "seq").await.unwrap().unwrap().id,
            store.pop_min("c", "seq").await.unwrap().unwrap().id,
        ]
        .into();
        assert_eq!(order, ["c", "b", "a"]);
        assert!(store.pop_min("c", "seq").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pop_min_orders_missing_sort_field_first() {
        let store = MemoryStore::new();
        store
            .insert_unique("c", StoredDoc::new("keyed").with_field("seq", json!(1)))
            .await
            .unwrap();
        store
            .insert_unique("c", StoredDoc::new("unkeyed"))
            .await
            .unwrap();

        let first = store.pop_min("c", "seq").await.unwrap().unwrap();
        assert_eq!(first.id, "unkeyed");
    }

    #[tokio::test]
    async fn fetch_increment_counts_up_and_upserts() {
        let store = MemoryStore::new();
        assert_eq!(store.fetch_increment("c", "pending", "seq").await.unwrap(), 1);
        assert_eq!(store.fetch_increment("c", "pending", "seq").await.unwrap(), 2);

        // Pre-seeded counter continues from its value
        store
            .put("c", StoredDoc::new("other").with_field("seq", json!(10)))
            .await
            .unwrap();
        assert_eq!(store.fetch_increment("c", "other", "seq").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn remove_by_id_returns_document_once() {
        let store = MemoryStore::new();
        store
            .insert_unique("c", StoredDoc::new("a"))
            .await
            .unwrap();
        assert!(store.remove_by_id("c", "a").await.unwrap().is_some());
        assert!(store.remove_by_id("c", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_filters_and_streams() {
        let store = MemoryStore::new();
        store
            .insert_unique("c", StoredDoc::new("a").with_field("tags", json!(["x"])))
            .await
            .unwrap();
        store
            .insert_unique("c", StoredDoc::new("b").with_field("tags", json!(["x", "y"])))
            .await
            .unwrap();
        store
            .insert_unique("c", StoredDoc::new("z").with_field("tags", json!(["y"])))
            .await
            .unwrap();

        let mut stream = store
            .find("c", Some(Filter::new("tags", json!("x"))))
            .await
            .unwrap();
        let mut ids = Vec::new();
        while let Some(doc) = stream.next().await {
            ids.push(doc.unwrap().id);
        }
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn drop_collection_forgets_documents_and_indexes() {
        let store = MemoryStore::new();
        store.insert_unique("c", StoredDoc::new("a")).await.unwrap();
        store.ensure_index("c", "seq").await.unwrap();

        store.drop_collection("c").await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 0);
        assert!(store.indexed_fields("c").is_empty());
    }
}
