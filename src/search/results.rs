use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use crate::core::types::{DocId, Document, FieldValue};
use crate::query::plan::CompiledSort;
use crate::query::sort::{compare_sort_values, SortValue};
use crate::writer::index_worker::ShardId;

/// One matching document as reported by a shard
#[derive(Debug, Clone)]
pub struct Hit {
    pub shard: ShardId,
    pub doc_id: DocId,
    pub key: String,
    pub sort_values: Vec<SortValue>,
}

impl Hit {
    /// Declared keys first, then (collection, doc id) so equal keys still order deterministically
    pub fn cmp_with(&self, other: &Hit, sort: &[CompiledSort]) -> Ordering {
        compare_sort_values(&self.sort_values, &other.sort_values, sort)
            .then_with(|| self.shard.collection.cmp(&other.shard.collection))
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }

    pub fn score(&self) -> Option<f32> {
        self.sort_values.iter().find_map(|value| match value {
            SortValue::Score(score) => Some(*score),
            SortValue::Field(_) => None,
        })
    }
}

/// Result message of one shard executor
#[derive(Debug, Clone)]
pub struct ShardResponse {
    pub shard: ShardId,
    pub hits: Vec<Hit>,
    pub total_matches: u64,
}

#[derive(Debug, Clone)]
pub struct QueryStats {
    pub query_id: Uuid,
    pub shards_scanned: usize,
    pub total_matches: u64,   // before offset/limit
    pub elapsed: Duration,
}

/// Documents of a view query in final order
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub documents: Vec<Arc<Document>>,
    pub stats: QueryStats,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.documents.iter().map(|doc| doc.key.as_str()).collect()
    }

    pub fn values(&self, field: &str) -> Vec<Option<&FieldValue>> {
        self.documents.iter().map(|doc| doc.get_field(field)).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.documents.iter().map(|doc| doc.to_json()).collect())
    }
}
