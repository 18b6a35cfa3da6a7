use std::collections::BTreeMap;
use roaring::RoaringTreemap;
use crate::core::types::{DocId, FieldValue, ValueKind};

/// Indexed copy of the fields a link covers, stamped with the write that produced it.
/// The stored document stays authoritative; this is only what queries see.
#[derive(Debug, Clone)]
pub struct DocSnapshot {
    pub id: DocId,
    pub key: String,
    pub revision: u64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl DocSnapshot {
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn kind_of(&self, field: &str) -> ValueKind {
        self.fields
            .get(field)
            .map(FieldValue::kind)
            .unwrap_or(ValueKind::Absent)
    }
}

/// Raw value kinds recorded per document for one field
#[derive(Debug, Clone, Default)]
pub struct KindIndex {
    by_kind: BTreeMap<ValueKind, RoaringTreemap>,
    present: RoaringTreemap,
}

impl KindIndex {
    pub fn insert(&mut self, doc_id: DocId, kind: ValueKind) {
        self.by_kind.entry(kind).or_default().insert(doc_id.0);
        self.present.insert(doc_id.0);
    }

    pub fn remove(&mut self, doc_id: DocId, kind: ValueKind) {
        if let Some(docs) = self.by_kind.get_mut(&kind) {
            docs.remove(doc_id.0);
        }
        self.present.remove(doc_id.0);
    }

    pub fn of_kind(&self, kind: ValueKind) -> RoaringTreemap {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    pub fn has_kind(&self, kind: ValueKind) -> bool {
        self.by_kind.get(&kind).is_some_and(|docs| !docs.is_empty())
    }

    pub fn of_kinds(&self, kinds: &[ValueKind]) -> RoaringTreemap {
        let mut docs = RoaringTreemap::new();
        for kind in kinds {
            if let Some(ids) = self.by_kind.get(kind) {
                docs |= ids;
            }
        }
        docs
    }

    pub fn present(&self) -> &RoaringTreemap {
        &self.present
    }
}
