use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document};
use crate::storage::partitioner::Partitioner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionOptions {
    pub number_of_shards: u32,
    pub replication_factor: u32,
}

impl CollectionOptions {
    pub fn new(number_of_shards: u32, replication_factor: u32) -> Self {
        CollectionOptions {
            number_of_shards,
            replication_factor,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        CollectionOptions::new(config.default_number_of_shards, config.default_replication_factor)
    }
}

impl Default for CollectionOptions {
    fn default() -> Self {
        CollectionOptions::new(1, 1)
    }
}

#[derive(Debug, Default)]
struct CollectionShard {
    docs: BTreeMap<DocId, Arc<Document>>,
    keys: HashMap<String, DocId>,
}

/// In-memory sharded document store.
///
/// Every mutation runs a callback while the shard lock is still held, so
/// whatever the callback forwards (index operations) is ordered exactly like
/// the writes themselves.
#[derive(Debug)]
pub struct Collection {
    name: Arc<str>,
    options: CollectionOptions,
    partitioner: Partitioner,
    shards: Vec<Mutex<CollectionShard>>,
    next_id: AtomicU64,
}

impl Collection {
    pub fn new(name: &str, options: CollectionOptions) -> Self {
        let partitioner = Partitioner::new(options.number_of_shards);
        let shards = (0..partitioner.num_shards())
            .map(|_| Mutex::new(CollectionShard::default()))
            .collect();

        Collection {
            name: Arc::from(name),
            options,
            partitioner,
            shards,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub fn shard_count(&self) -> u32 {
        self.partitioner.num_shards()
    }

    fn shard(&self, shard: u32) -> &Mutex<CollectionShard> {
        &self.shards[shard as usize]
    }

    fn allocate_id(&self) -> DocId {
        DocId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Stores a new document; a missing `_key` is generated from the document id
    pub fn insert<R>(
        &self,
        value: serde_json::Value,
        on_stored: impl FnOnce(u32, &Arc<Document>) -> R,
    ) -> Result<(Arc<Document>, R)> {
        let id = self.allocate_id();
        let doc = Document::from_json(id, id.0.to_string(), value)?;
        let shard = self.partitioner.shard_for(&doc.key);

        let mut guard = self.shard(shard).lock();
        if guard.keys.contains_key(&doc.key) {
            return Err(Error::new(
                ErrorKind::Duplicate,
                format!("unique constraint violated: '{}/{}'", self.name, doc.key),
            ));
        }

        let doc = Arc::new(doc);
        guard.keys.insert(doc.key.clone(), id);
        guard.docs.insert(id, doc.clone());
        let out = on_stored(shard, &doc);
        Ok((doc, out))
    }

    /// Replaces the document stored under `key`, creating it when absent
    pub fn replace<R>(
        &self,
        key: &str,
        value: serde_json::Value,
        on_stored: impl FnOnce(u32, &Arc<Document>) -> R,
    ) -> Result<(Arc<Document>, R)> {
        let shard = self.partitioner.shard_for(key);
        let mut guard = self.shard(shard).lock();

        let id = match guard.keys.get(key) {
            Some(id) => *id,
            None => self.allocate_id(),
        };
        let mut doc = Document::from_json(id, key.to_string(), value)?;
        doc.key = key.to_string();

        let doc = Arc::new(doc);
        guard.keys.insert(doc.key.clone(), id);
        guard.docs.insert(id, doc.clone());
        let out = on_stored(shard, &doc);
        Ok((doc, out))
    }

    pub fn remove<R>(
        &self,
        key: &str,
        on_removed: impl FnOnce(u32, DocId) -> R,
    ) -> Result<(Arc<Document>, R)> {
        let shard = self.partitioner.shard_for(key);
        let mut guard = self.shard(shard).lock();

        let id = guard.keys.remove(key).ok_or_else(|| {
            Error::not_found(format!("document '{}/{}' not found", self.name, key))
        })?;
        let doc = guard.docs.remove(&id).ok_or_else(|| {
            Error::new(ErrorKind::Internal, format!("key '{}' points at a missing document", key))
        })?;
        let out = on_removed(shard, id);
        Ok((doc, out))
    }

    pub fn get(&self, key: &str) -> Option<Arc<Document>> {
        let guard = self.shard(self.partitioner.shard_for(key)).lock();
        guard.keys.get(key).and_then(|id| guard.docs.get(id)).cloned()
    }

    pub fn get_by_id(&self, shard: u32, id: DocId) -> Option<Arc<Document>> {
        self.shards
            .get(shard as usize)
            .and_then(|s| s.lock().docs.get(&id).cloned())
    }

    /// Documents of one shard in id order
    pub fn shard_documents(&self, shard: u32) -> Vec<Arc<Document>> {
        self.shards
            .get(shard as usize)
            .map(|s| s.lock().docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn all_documents(&self) -> Vec<Arc<Document>> {
        let mut docs: Vec<Arc<Document>> = (0..self.shard_count())
            .flat_map(|shard| self.shard_documents(shard))
            .collect();
        docs.sort_by_key(|doc| doc.id);
        docs
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().docs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_generated_and_unique() {
        let collection = Collection::new("c", CollectionOptions::new(3, 1));
        let (first, shard) = collection.insert(json!({"a": 1}), |shard, _| shard).unwrap();
        assert_eq!(first.key, first.id.0.to_string());
        assert!(shard < 3);

        collection.insert(json!({"_key": "foo"}), |_, _| ()).unwrap();
        let err = collection.insert(json!({"_key": "foo"}), |_, _| ()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn replace_keeps_document_id() {
        let collection = Collection::new("c", CollectionOptions::default());
        let (doc, _) = collection.insert(json!({"_key": "k", "v": 1}), |_, _| ()).unwrap();
        let (replaced, _) = collection.replace("k", json!({"v": 2}), |_, _| ()).unwrap();
        assert_eq!(replaced.id, doc.id);
        assert_eq!(collection.get("k").unwrap().get_field("v"), replaced.get_field("v"));

        let (removed, id) = collection.remove("k", |_, id| id).unwrap();
        assert_eq!(removed.key, "k");
        assert_eq!(id, doc.id);
        assert!(collection.get("k").is_none());
        assert_eq!(collection.remove("k", |_, _| ()).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
