use serde::{Serialize, Deserialize};
use crate::index::posting::Posting;
use crate::scoring::stats::TermInfo;

/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, posting: &Posting, term_info: &TermInfo, doc_stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// Document statistics for scoring
#[derive(Debug, Clone)]
pub struct DocStats {
    pub doc_length: u32,      // Number of tokens in the scored field
    pub avg_doc_length: f32,  // Average field length over the scored documents
    pub total_docs: u64,      // Total number of documents
}

/// TF-IDF Scorer
pub struct TfIdfScorer {
    pub normalize: bool,
}

impl TfIdfScorer {
    pub fn new(normalize: bool) -> Self {
        TfIdfScorer { normalize }
    }
}

impl Scorer for TfIdfScorer {
    fn score(&self, posting: &Posting, term_info: &TermInfo, doc_stats: &DocStats) -> f32 {
        // TF = term frequency / document length (if normalized)
        let tf = if self.normalize && doc_stats.doc_length > 0 {
            posting.term_freq as f32 / doc_stats.doc_length as f32
        } else {
            posting.term_freq as f32
        };

        // TF-IDF = TF * IDF
        tf * term_info.idf
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

/// BM25 Scorer
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, posting: &Posting, term_info: &TermInfo, doc_stats: &DocStats) -> f32 {
        let tf = posting.term_freq as f32;
        let doc_len = doc_stats.doc_length as f32;
        let avg_doc_len = if doc_stats.avg_doc_length > 0.0 { doc_stats.avg_doc_length } else { 1.0 };

        // BM25 formula
        let numerator = term_info.idf * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

/// Ranking function named by a sort key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScorerKind {
    TfIdf { with_norm: bool },
    Bm25 { k1: f32, b: f32 },
}

impl ScorerKind {
    pub fn scorer(&self) -> Box<dyn Scorer> {
        match *self {
            ScorerKind::TfIdf { with_norm } => Box::new(TfIdfScorer::new(with_norm)),
            ScorerKind::Bm25 { k1, b } => Box::new(BM25Scorer { k1, b }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId;

    fn posting(term_freq: u32) -> Posting {
        Posting {
            doc_id: DocId(1),
            term_freq,
            positions: (0..term_freq).collect(),
        }
    }

    #[test]
    fn tfidf_scales_with_frequency() {
        let term = TermInfo::new(2, 28);
        let doc = DocStats { doc_length: 9, avg_doc_length: 4.0, total_docs: 28 };
        let scorer = TfIdfScorer::new(false);

        let once = scorer.score(&posting(1), &term, &doc);
        let twice = scorer.score(&posting(2), &term, &doc);
        assert!((once - 14f32.ln()).abs() < 1e-6);
        assert!((twice - 2.0 * once).abs() < 1e-6);

        let normalized = TfIdfScorer::new(true).score(&posting(2), &term, &doc);
        assert!((normalized - 2.0 / 9.0 * once).abs() < 1e-6);
    }

    #[test]
    fn bm25_saturates_term_frequency() {
        let term = TermInfo::new(1, 10);
        let doc = DocStats { doc_length: 4, avg_doc_length: 4.0, total_docs: 10 };
        let scorer = BM25Scorer::default();

        let low = scorer.score(&posting(1), &term, &doc);
        let high = scorer.score(&posting(50), &term, &doc);
        assert!(high > low);
        assert!(high < term.idf * (scorer.k1 + 1.0));
    }
}
