use std::collections::HashMap;
use crate::index::shard_index::{FieldKey, ShardIndex};
use crate::query::plan::ScoringTerm;
use crate::scoring::scorer::DocStats;

/// Term statistics
#[derive(Debug, Clone)]
pub struct TermInfo {
    pub doc_freq: u64,  // Number of documents containing term
    pub idf: f32,       // Inverse document frequency
}

impl TermInfo {
    pub fn new(doc_freq: u64, total_docs: u64) -> Self {
        // IDF = log(N / df) where N is total docs, df is doc frequency
        let idf = if doc_freq == 0 || total_docs == 0 {
            0.0
        } else {
            (total_docs as f32 / doc_freq as f32).ln()
        };
        TermInfo { doc_freq, idf }
    }
}

/// Document count and per-term frequencies a ranked query is scored with.
///
/// Collected per shard; merging the shard values gives scores that do not
/// depend on how documents are spread over shards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringStats {
    pub total_docs: u64,
    pub doc_freqs: HashMap<ScoringTerm, u64>,
    pub field_tokens: HashMap<FieldKey, u64>,
    /// Documents with at least one token in the field
    pub field_docs: HashMap<FieldKey, u64>,
}

impl ScoringStats {
    pub fn collect(index: &ShardIndex, terms: &[ScoringTerm]) -> Self {
        let mut stats = ScoringStats {
            total_docs: index.doc_count(),
            ..ScoringStats::default()
        };

        for term in terms {
            let text = index.text_index(&term.key);
            let doc_freq = text.map(|t| t.doc_freq(&term.term)).unwrap_or(0);
            stats.doc_freqs.insert(term.clone(), doc_freq);
            stats
                .field_tokens
                .entry(term.key.clone())
                .or_insert_with(|| text.map(|t| t.total_tokens()).unwrap_or(0));
            stats
                .field_docs
                .entry(term.key.clone())
                .or_insert_with(|| text.map(|t| t.doc_count()).unwrap_or(0));
        }

        stats
    }

    pub fn merge(&mut self, other: ScoringStats) {
        self.total_docs += other.total_docs;
        for (term, doc_freq) in other.doc_freqs {
            *self.doc_freqs.entry(term).or_insert(0) += doc_freq;
        }
        for (key, tokens) in other.field_tokens {
            *self.field_tokens.entry(key).or_insert(0) += tokens;
        }
        for (key, docs) in other.field_docs {
            *self.field_docs.entry(key).or_insert(0) += docs;
        }
    }

    pub fn term_info(&self, term: &ScoringTerm) -> TermInfo {
        let doc_freq = self.doc_freqs.get(term).copied().unwrap_or(0);
        TermInfo::new(doc_freq, self.total_docs)
    }

    pub fn doc_stats(&self, key: &FieldKey, doc_length: u32) -> DocStats {
        let tokens = self.field_tokens.get(key).copied().unwrap_or(0);
        let docs = self.field_docs.get(key).copied().unwrap_or(0);
        let avg_doc_length = if docs == 0 { 0.0 } else { tokens as f32 / docs as f32 };
        DocStats {
            doc_length,
            avg_doc_length,
            total_docs: self.total_docs,
        }
    }
}
