use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use roaring::RoaringTreemap;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document, ValueKind};
use crate::index::bounds::RangeBound;
use crate::index::inverted::InvertedIndex;
use crate::index::snapshot::{DocSnapshot, KindIndex};
use crate::index::typed::{BoolIndex, NumericIndex};
use crate::parallel::indexer::{DocumentIndexer, IndexedDoc};

/// Postings are keyed by the field and the analyzer that produced them
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey {
    pub field: String,
    pub analyzer: String,
}

impl FieldKey {
    pub fn new(field: impl Into<String>, analyzer: impl Into<String>) -> Self {
        FieldKey {
            field: field.into(),
            analyzer: analyzer.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}]", self.field, self.analyzer)
    }
}

/// What `EXISTS` checks for. Kind filters read the raw value kind,
/// `Analyzer` reads the postings produced by that analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExistsFilter {
    Any,
    String,
    Numeric,
    Bool,
    Null,
    /// Non-string scalars
    Type,
    Analyzer(String),
}

/// Everything indexed for one field name
#[derive(Debug, Default)]
struct FieldIndex {
    analyzers: HashMap<String, InvertedIndex>,
    numbers: NumericIndex,
    bools: BoolIndex,
    nulls: RoaringTreemap,
    kinds: KindIndex,
}

/// Index over one collection shard for one view link
///
/// Mutations take `&mut self`; the owner serializes them behind a lock so a
/// reader sees a document either fully before or fully after an upsert.
#[derive(Debug)]
pub struct ShardIndex {
    name: String,
    fields: HashMap<String, FieldIndex>,
    snapshots: HashMap<DocId, DocSnapshot>,
    universe: RoaringTreemap,
    corruption: Option<String>,
}

impl ShardIndex {
    pub fn new(name: impl Into<String>) -> Self {
        ShardIndex {
            name: name.into(),
            fields: HashMap::new(),
            snapshots: HashMap::new(),
            universe: RoaringTreemap::new(),
            corruption: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Analyze and apply in one call
    pub fn upsert(&mut self, doc: &Document, revision: u64, indexer: &DocumentIndexer) -> Result<()> {
        let indexed = indexer.analyze(doc, revision)?;
        self.apply(indexed);
        Ok(())
    }

    /// Applies an analyzed document, fully superseding any prior version of it
    pub fn apply(&mut self, doc: IndexedDoc) {
        let doc_id = doc.doc_id;
        self.remove(doc_id);

        let mut values = BTreeMap::new();
        for field in doc.fields {
            let entry = self.fields.entry(field.name.clone()).or_default();
            entry.kinds.insert(doc_id, field.value.kind());

            for (analyzer, tokens) in &field.tokens {
                entry
                    .analyzers
                    .entry(analyzer.clone())
                    .or_default()
                    .add_document(doc_id, tokens);
            }
            if !field.numbers.is_empty() {
                entry.numbers.insert(doc_id, &field.numbers);
            }
            if !field.bools.is_empty() {
                entry.bools.insert(doc_id, &field.bools);
            }
            if field.has_null {
                entry.nulls.insert(doc_id.0);
            }
            values.insert(field.name, field.value);
        }

        self.universe.insert(doc_id.0);
        self.snapshots.insert(doc_id, DocSnapshot {
            id: doc_id,
            key: doc.key,
            revision: doc.revision,
            fields: values,
        });
    }

    /// No-op when the document was never indexed
    pub fn remove(&mut self, doc_id: DocId) -> bool {
        let Some(snapshot) = self.snapshots.remove(&doc_id) else {
            return false;
        };

        for (name, value) in &snapshot.fields {
            if let Some(entry) = self.fields.get_mut(name) {
                entry.kinds.remove(doc_id, value.kind());
                for index in entry.analyzers.values_mut() {
                    index.remove_document(doc_id);
                }
                entry.numbers.remove(doc_id);
                entry.bools.remove(doc_id);
                entry.nulls.remove(doc_id.0);
            }
        }

        self.universe.remove(doc_id.0);
        true
    }

    fn text(&self, field: &str, analyzer: &str) -> Option<&InvertedIndex> {
        self.fields
            .get(field)
            .and_then(|entry| entry.analyzers.get(analyzer))
    }

    pub fn text_index(&self, key: &FieldKey) -> Option<&InvertedIndex> {
        self.text(&key.field, &key.analyzer)
    }

    pub fn lookup(&self, field: &str, analyzer: &str, term: &str) -> RoaringTreemap {
        self.text(field, analyzer)
            .map(|index| index.lookup(term))
            .unwrap_or_default()
    }

    pub fn lookup_number(&self, field: &str, value: f64) -> RoaringTreemap {
        self.fields
            .get(field)
            .map(|entry| entry.numbers.eq(value))
            .unwrap_or_default()
    }

    pub fn lookup_bool(&self, field: &str, value: bool) -> RoaringTreemap {
        self.fields
            .get(field)
            .map(|entry| entry.bools.eq(value))
            .unwrap_or_default()
    }

    pub fn lookup_null(&self, field: &str) -> RoaringTreemap {
        self.fields
            .get(field)
            .map(|entry| entry.nulls.clone())
            .unwrap_or_default()
    }

    pub fn range_terms(
        &self,
        field: &str,
        analyzer: &str,
        lower: Bound<&str>,
        upper: Bound<&str>,
    ) -> RoaringTreemap {
        self.text(field, analyzer)
            .map(|index| index.range(lower, upper))
            .unwrap_or_default()
    }

    pub fn range_numeric(
        &self,
        field: &str,
        lower: &RangeBound<f64>,
        upper: &RangeBound<f64>,
    ) -> RoaringTreemap {
        self.fields
            .get(field)
            .map(|entry| entry.numbers.range(lower, upper))
            .unwrap_or_default()
    }

    pub fn prefix(&self, field: &str, analyzer: &str, prefix: &str) -> RoaringTreemap {
        self.text(field, analyzer)
            .map(|index| index.prefix(prefix))
            .unwrap_or_default()
    }

    pub fn positions(&self, field: &str, analyzer: &str, doc_id: DocId, term: &str) -> &[u32] {
        self.text(field, analyzer)
            .map(|index| index.positions(doc_id, term))
            .unwrap_or(&[])
    }

    pub fn exists(&self, field: &str, filter: &ExistsFilter) -> RoaringTreemap {
        let Some(entry) = self.fields.get(field) else {
            return RoaringTreemap::new();
        };

        match filter {
            ExistsFilter::Any => entry.kinds.present().clone(),
            ExistsFilter::String => entry.kinds.of_kind(ValueKind::String),
            ExistsFilter::Numeric => entry.kinds.of_kind(ValueKind::Numeric),
            ExistsFilter::Bool => entry.kinds.of_kind(ValueKind::Bool),
            ExistsFilter::Null => entry.kinds.of_kind(ValueKind::Null),
            ExistsFilter::Type => {
                entry
                    .kinds
                    .of_kinds(&[ValueKind::Null, ValueKind::Bool, ValueKind::Numeric])
            }
            ExistsFilter::Analyzer(analyzer) => entry
                .analyzers
                .get(analyzer)
                .map(|index| index.docs().clone())
                .unwrap_or_default(),
        }
    }

    /// Some document on this shard stores an array under `field`
    pub fn is_multi_valued(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .is_some_and(|entry| entry.kinds.has_kind(ValueKind::Array))
    }

    /// Every document indexed on this shard
    pub fn universe(&self) -> &RoaringTreemap {
        &self.universe
    }

    pub fn doc_count(&self) -> u64 {
        self.universe.len()
    }

    pub fn snapshot(&self, doc_id: DocId) -> Option<&DocSnapshot> {
        self.snapshots.get(&doc_id)
    }

    /// Fails every later query on this shard until the link is rebuilt
    pub fn mark_corrupted(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(shard = %self.name, %reason, "shard index marked corrupted");
        self.corruption = Some(reason);
    }

    pub fn is_healthy(&self) -> bool {
        self.corruption.is_none()
    }

    pub fn ensure_healthy(&self) -> Result<()> {
        match &self.corruption {
            None => Ok(()),
            Some(reason) => Err(Error::new(
                ErrorKind::IndexCorruption,
                format!("shard {}: {}", self.name, reason),
            )),
        }
    }
}
