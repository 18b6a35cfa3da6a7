use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use roaring::RoaringTreemap;
use crate::core::types::DocId;
use crate::index::bounds::{is_empty_range, RangeBound};

/// Totally ordered f64 key; `-0.0` is folded into `0.0` so both compare equal
#[derive(Debug, Clone, Copy)]
pub struct NumericKey(f64);

impl NumericKey {
    pub fn new(value: f64) -> Self {
        NumericKey(if value == 0.0 { 0.0 } else { value })
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for NumericKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumericKey {}

impl PartialOrd for NumericKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumericKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Ordered numeric postings for one field
#[derive(Debug, Clone, Default)]
pub struct NumericIndex {
    values: BTreeMap<NumericKey, RoaringTreemap>,
    doc_values: HashMap<DocId, Vec<NumericKey>>,
}

impl NumericIndex {
    pub fn insert(&mut self, doc_id: DocId, values: &[f64]) {
        self.remove(doc_id);
        let keys: Vec<NumericKey> = values.iter().copied().map(NumericKey::new).collect();
        for key in &keys {
            self.values.entry(*key).or_default().insert(doc_id.0);
        }
        self.doc_values.insert(doc_id, keys);
    }

    pub fn remove(&mut self, doc_id: DocId) {
        let Some(keys) = self.doc_values.remove(&doc_id) else {
            return;
        };
        for key in keys {
            if let Some(docs) = self.values.get_mut(&key) {
                docs.remove(doc_id.0);
                if docs.is_empty() {
                    self.values.remove(&key);
                }
            }
        }
    }

    pub fn eq(&self, value: f64) -> RoaringTreemap {
        self.values
            .get(&NumericKey::new(value))
            .cloned()
            .unwrap_or_default()
    }

    pub fn range(&self, lower: &RangeBound<f64>, upper: &RangeBound<f64>) -> RoaringTreemap {
        let lower = lower.clone().map(NumericKey::new);
        let upper = upper.clone().map(NumericKey::new);

        let mut docs = RoaringTreemap::new();
        if is_empty_range(lower.as_bound(), upper.as_bound()) {
            return docs;
        }
        for (_, ids) in self.values.range((lower.as_bound(), upper.as_bound())) {
            docs |= ids;
        }
        docs
    }

    pub fn doc_count(&self) -> usize {
        self.doc_values.len()
    }
}

/// Boolean postings for one field
#[derive(Debug, Clone, Default)]
pub struct BoolIndex {
    true_docs: RoaringTreemap,
    false_docs: RoaringTreemap,
}

impl BoolIndex {
    pub fn insert(&mut self, doc_id: DocId, values: &[bool]) {
        self.remove(doc_id);
        for value in values {
            if *value {
                self.true_docs.insert(doc_id.0);
            } else {
                self.false_docs.insert(doc_id.0);
            }
        }
    }

    pub fn remove(&mut self, doc_id: DocId) {
        self.true_docs.remove(doc_id.0);
        self.false_docs.remove(doc_id.0);
    }

    pub fn eq(&self, value: bool) -> RoaringTreemap {
        if value {
            self.true_docs.clone()
        } else {
            self.false_docs.clone()
        }
    }
}
