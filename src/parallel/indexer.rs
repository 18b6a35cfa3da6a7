use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::analysis::token::Token;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document, FieldValue};
use crate::schema::link::LinkConfig;

/// Position gap inserted between array elements so a phrase never spans two of them
const ELEMENT_POSITION_GAP: u32 = 1;

/// One covered field of a document, analyzed and ready to be applied to a shard index
#[derive(Debug, Clone)]
pub struct IndexedField {
    pub name: String,
    pub value: FieldValue,
    pub tokens: Vec<(String, Vec<Token>)>,  // per analyzer
    pub numbers: Vec<f64>,
    pub bools: Vec<bool>,
    pub has_null: bool,
}

#[derive(Debug, Clone)]
pub struct IndexedDoc {
    pub doc_id: DocId,
    pub key: String,
    pub revision: u64,
    pub fields: Vec<IndexedField>,
}

/// Turns stored documents into index entries for one link.
///
/// Pure with respect to the shard index: analysis runs before any lock is
/// taken, the result is applied in one step.
#[derive(Clone)]
pub struct DocumentIndexer {
    link: Arc<LinkConfig>,
    registry: Arc<AnalyzerRegistry>,
}

impl DocumentIndexer {
    pub fn new(link: Arc<LinkConfig>, registry: Arc<AnalyzerRegistry>) -> Self {
        DocumentIndexer { link, registry }
    }

    pub fn link(&self) -> &LinkConfig {
        &self.link
    }

    pub fn analyze(&self, doc: &Document, revision: u64) -> Result<IndexedDoc> {
        let mut fields = Vec::new();

        for (name, value) in &doc.fields {
            // Nested objects are not indexed
            if matches!(value, FieldValue::Object(_)) {
                continue;
            }
            let Some(analyzers) = self.link.analyzers_for(name) else {
                continue;
            };
            fields.push(self.analyze_field(name, value, &analyzers)?);
        }

        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(IndexedDoc {
            doc_id: doc.id,
            key: doc.key.clone(),
            revision,
            fields,
        })
    }

    fn analyze_field(&self, name: &str, value: &FieldValue, analyzers: &[&str]) -> Result<IndexedField> {
        // Arrays are indexed element by element under the same field name
        let elements: Vec<&FieldValue> = match value {
            FieldValue::Array(items) => items.iter().filter(|item| item.is_scalar()).collect(),
            scalar => vec![scalar],
        };

        let mut field = IndexedField {
            name: name.to_string(),
            value: value.clone(),
            tokens: Vec::with_capacity(analyzers.len()),
            numbers: Vec::new(),
            bools: Vec::new(),
            has_null: false,
        };

        for element in &elements {
            match element {
                FieldValue::Number(n) => field.numbers.push(*n),
                FieldValue::Bool(b) => field.bools.push(*b),
                FieldValue::Null => field.has_null = true,
                _ => {}
            }
        }

        for analyzer_name in analyzers {
            let analyzer = self.registry.resolve(analyzer_name)?;
            let mut tokens = Vec::new();
            let mut base = 0u32;

            for text in elements.iter().filter_map(|element| element.as_str()) {
                let analyzed = analyzer.analyze(text);
                let next_base = analyzed
                    .last()
                    .map(|token| base + token.position + 1 + ELEMENT_POSITION_GAP)
                    .unwrap_or(base);
                tokens.extend(analyzed.into_iter().map(|mut token| {
                    token.position += base;
                    token
                }));
                base = next_base;
            }

            if !tokens.is_empty() {
                field.tokens.push((analyzer_name.to_string(), tokens));
            }
        }

        Ok(field)
    }
}

/// Parallel document analysis used when a link is (re)built over existing data
pub struct ParallelIndexer {
    pool: rayon::ThreadPool,
    pub workers: usize,
    pub batch_size: usize,
    pub progress: Arc<AtomicUsize>,
}

impl ParallelIndexer {
    pub fn new(workers: usize, batch_size: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("searchview-indexer-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("indexing pool: {}", e)))?;

        Ok(ParallelIndexer {
            pool,
            workers,
            batch_size: batch_size.max(1),
            progress: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get current progress
    pub fn get_progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Analyze a batch of documents in parallel, preserving input order
    pub fn index_batch(&self, indexer: &DocumentIndexer, documents: &[Arc<Document>]) -> Result<Vec<IndexedDoc>> {
        self.progress.store(0, Ordering::Relaxed);
        let total_docs = documents.len();

        let chunks: Vec<Vec<IndexedDoc>> = self.pool.install(|| {
            documents
                .par_chunks(self.batch_size)
                .map(|batch| -> Result<Vec<IndexedDoc>> {
                    let indexed = batch
                        .iter()
                        .map(|doc| indexer.analyze(doc, 0))
                        .collect::<Result<Vec<_>>>()?;

                    let done = self.progress.fetch_add(batch.len(), Ordering::Relaxed) + batch.len();
                    tracing::debug!(done, total = total_docs, "backfill batch analyzed");
                    Ok(indexed)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(chunks.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexer(link: LinkConfig) -> DocumentIndexer {
        DocumentIndexer::new(Arc::new(link), Arc::new(AnalyzerRegistry::new()))
    }

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(DocId(1), "1".to_string(), json).unwrap()
    }

    #[test]
    fn covers_only_linked_fields() {
        let link = LinkConfig::new().with_field("text", ["text_en"]);
        let indexed = indexer(link)
            .analyze(&doc(serde_json::json!({"text": "Quick Foxes", "a": "foo"})), 3)
            .unwrap();

        assert_eq!(indexed.revision, 3);
        assert_eq!(indexed.fields.len(), 1);
        let (analyzer, tokens) = &indexed.fields[0].tokens[0];
        assert_eq!(analyzer, "text_en");
        let terms: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(terms, vec!["quick", "fox"]);
    }

    #[test]
    fn array_elements_do_not_share_positions() {
        let link = LinkConfig::new().include_all_fields(true);
        let indexed = indexer(link)
            .analyze(&doc(serde_json::json!({"tags": ["a", "b", 2, null, {"x": 1}]})), 0)
            .unwrap();

        let field = &indexed.fields[0];
        assert_eq!(field.numbers, vec![2.0]);
        assert!(field.has_null);
        let positions: Vec<u32> = field.tokens[0].1.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 2]);
    }

    #[test]
    fn batch_keeps_document_order() {
        let pool = ParallelIndexer::new(2, 3).unwrap();
        let indexer = indexer(LinkConfig::new().include_all_fields(true));
        let docs: Vec<Arc<Document>> = (0..10)
            .map(|i| {
                Arc::new(
                    Document::from_json(DocId(i), i.to_string(), serde_json::json!({"n": i})).unwrap(),
                )
            })
            .collect();

        let indexed = pool.index_batch(&indexer, &docs).unwrap();
        let ids: Vec<u64> = indexed.iter().map(|d| d.doc_id.0).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert_eq!(pool.get_progress(), 10);
    }
}
