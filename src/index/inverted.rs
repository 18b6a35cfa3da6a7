use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use roaring::RoaringTreemap;
use crate::analysis::token::Token;
use crate::core::types::DocId;
use crate::index::bounds::is_empty_range;
use crate::index::posting::{Posting, PostingList};

/// Inverted index for one (field, analyzer) pair
///
/// The term dictionary is ordered so that range and prefix scans walk a
/// contiguous slice of it. A forward map from document to its terms keeps
/// removal proportional to the document, not to the dictionary.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    pub terms: BTreeMap<String, PostingList>,
    doc_terms: HashMap<DocId, Vec<String>>,
    doc_lengths: HashMap<DocId, u32>,
    docs: RoaringTreemap,
    total_tokens: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    /// Replaces whatever the index held for `doc_id` with `tokens`
    pub fn add_document(&mut self, doc_id: DocId, tokens: &[Token]) {
        self.remove_document(doc_id);
        if tokens.is_empty() {
            return;
        }

        // Group tokens by term
        let mut term_positions: HashMap<&str, Vec<u32>> = HashMap::new();
        for token in tokens {
            term_positions
                .entry(token.text.as_str())
                .or_default()
                .push(token.position);
        }

        let mut doc_terms = Vec::with_capacity(term_positions.len());
        for (term, mut positions) in term_positions {
            positions.sort_unstable();
            let posting = Posting {
                doc_id,
                term_freq: positions.len() as u32,
                positions,
            };
            self.terms
                .entry(term.to_string())
                .or_default()
                .add_posting(posting);
            doc_terms.push(term.to_string());
        }

        self.doc_terms.insert(doc_id, doc_terms);
        self.doc_lengths.insert(doc_id, tokens.len() as u32);
        self.docs.insert(doc_id.0);
        self.total_tokens += tokens.len() as u64;
    }

    pub fn remove_document(&mut self, doc_id: DocId) -> bool {
        let Some(doc_terms) = self.doc_terms.remove(&doc_id) else {
            return false;
        };

        for term in doc_terms {
            if let Some(list) = self.terms.get_mut(&term) {
                list.remove(doc_id);
                if list.is_empty() {
                    self.terms.remove(&term);
                }
            }
        }

        if let Some(length) = self.doc_lengths.remove(&doc_id) {
            self.total_tokens -= length as u64;
        }
        self.docs.remove(doc_id.0);
        true
    }

    pub fn posting_list(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    pub fn posting(&self, term: &str, doc_id: DocId) -> Option<&Posting> {
        self.terms.get(term).and_then(|list| list.get(doc_id))
    }

    pub fn lookup(&self, term: &str) -> RoaringTreemap {
        self.terms
            .get(term)
            .map(PostingList::to_bitmap)
            .unwrap_or_default()
    }

    pub fn positions(&self, doc_id: DocId, term: &str) -> &[u32] {
        self.posting(term, doc_id)
            .map(|posting| posting.positions.as_slice())
            .unwrap_or(&[])
    }

    /// Documents holding any term inside the bounds, in byte-wise term order
    pub fn range(&self, lower: Bound<&str>, upper: Bound<&str>) -> RoaringTreemap {
        let mut docs = RoaringTreemap::new();
        if is_empty_range(lower, upper) {
            return docs;
        }
        for list in self.terms.range::<str, _>((lower, upper)).map(|(_, list)| list) {
            docs.extend(list.doc_ids().map(|id| id.0));
        }
        docs
    }

    pub fn prefix(&self, prefix: &str) -> RoaringTreemap {
        let mut docs = RoaringTreemap::new();
        let scan = self
            .terms
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded));
        for (term, list) in scan {
            if !term.starts_with(prefix) {
                break;
            }
            docs.extend(list.doc_ids().map(|id| id.0));
        }
        docs
    }

    pub fn doc_freq(&self, term: &str) -> u64 {
        self.terms.get(term).map(PostingList::doc_freq).unwrap_or(0)
    }

    pub fn doc_length(&self, doc_id: DocId) -> u32 {
        self.doc_lengths.get(&doc_id).copied().unwrap_or(0)
    }

    /// Documents with at least one token in this index
    pub fn docs(&self) -> &RoaringTreemap {
        &self.docs
    }

    pub fn doc_count(&self) -> u64 {
        self.docs.len()
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}
