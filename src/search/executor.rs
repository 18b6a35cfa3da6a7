use std::borrow::Cow;
use std::sync::Arc;
use roaring::RoaringTreemap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, FieldValue};
use crate::index::shard_index::ShardIndex;
use crate::query::plan::{fold_ranges, CompiledQuery, CompiledSortKey, PlanNode, ScoringTerm};
use crate::query::sort::SortValue;
use crate::scoring::scorer::Scorer;
use crate::scoring::stats::ScoringStats;
use crate::search::results::{Hit, ShardResponse};
use crate::writer::index_worker::ShardHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    Compiled,
    Running,
    Completed,
    Failed(ErrorKind),
}

/// Immutable message dispatched to every shard of a query
#[derive(Debug, Clone)]
pub struct ShardRequest {
    pub query: Arc<CompiledQuery>,
    /// Cluster-wide statistics; `None` scores with the shard's own counts
    pub stats: Option<Arc<ScoringStats>>,
    /// Set only when truncating locally cannot change the merged result
    pub local_limit: Option<usize>,
}

/// Runs one compiled plan against one shard index
pub struct ShardExecutor {
    shard: Arc<ShardHandle>,
    request: ShardRequest,
    state: ExecutorState,
}

impl ShardExecutor {
    pub fn new(shard: Arc<ShardHandle>, request: ShardRequest) -> Self {
        ShardExecutor {
            shard,
            request,
            state: ExecutorState::Compiled,
        }
    }

    pub fn state(&self) -> &ExecutorState {
        &self.state
    }

    pub fn execute(&mut self) -> Result<ShardResponse> {
        self.state = ExecutorState::Running;
        let result = self.run();
        self.state = match &result {
            Ok(_) => ExecutorState::Completed,
            Err(e) => ExecutorState::Failed(e.kind()),
        };
        result
    }

    fn run(&self) -> Result<ShardResponse> {
        let index = self.shard.index().read();
        index.ensure_healthy()?;

        let query = &self.request.query;
        let matches = evaluate(&index, &query.root);
        let total_matches = matches.len();

        // Ranking is computed only when a sort key references it
        let stats: Option<Cow<'_, ScoringStats>> = if query.needs_scores() {
            Some(match &self.request.stats {
                Some(global) => Cow::Borrowed(global.as_ref()),
                None => Cow::Owned(ScoringStats::collect(&index, &query.scoring_terms)),
            })
        } else {
            None
        };
        let scorers: Vec<Option<Box<dyn Scorer>>> = query
            .sort
            .iter()
            .map(|s| match &s.key {
                CompiledSortKey::Score(kind) => Some(kind.scorer()),
                CompiledSortKey::Field(_) => None,
            })
            .collect();

        let mut hits = Vec::with_capacity(matches.len() as usize);
        for id in matches.iter() {
            let doc_id = DocId(id);
            let snapshot = index.snapshot(doc_id).ok_or_else(|| {
                Error::new(
                    ErrorKind::IndexCorruption,
                    format!("shard {}: document {} has postings but no snapshot", self.shard.id, id),
                )
            })?;

            let mut sort_values = Vec::with_capacity(query.sort.len());
            for (key, scorer) in query.sort.iter().zip(&scorers) {
                let value = match (&key.key, scorer, &stats) {
                    (CompiledSortKey::Field(field), _, _) => {
                        SortValue::Field(snapshot.value(field).cloned().unwrap_or(FieldValue::Null))
                    }
                    (CompiledSortKey::Score(_), Some(scorer), Some(stats)) => SortValue::Score(
                        score_document(&index, doc_id, &query.scoring_terms, stats, scorer.as_ref()),
                    ),
                    (CompiledSortKey::Score(_), _, _) => SortValue::Score(0.0),
                };
                sort_values.push(value);
            }

            hits.push(Hit {
                shard: self.shard.id.clone(),
                doc_id,
                key: snapshot.key.clone(),
                sort_values,
            });
        }

        if query.is_sorted() {
            hits.sort_by(|a, b| a.cmp_with(b, &query.sort));
        }
        if let Some(limit) = self.request.local_limit {
            hits.truncate(limit);
        }

        tracing::debug!(shard = %self.shard.id, total_matches, returned = hits.len(), "shard executed");
        Ok(ShardResponse {
            shard: self.shard.id.clone(),
            hits,
            total_matches,
        })
    }
}

/// Set algebra over the shard's document ids
pub fn evaluate(index: &ShardIndex, node: &PlanNode) -> RoaringTreemap {
    match node {
        PlanNode::All => index.universe().clone(),
        PlanNode::Empty => RoaringTreemap::new(),
        PlanNode::Term { field, analyzer, term } => index.lookup(field, analyzer, term),
        PlanNode::Number { field, value } => index.lookup_number(field, *value),
        PlanNode::Bool { field, value } => index.lookup_bool(field, *value),
        PlanNode::Null { field } => index.lookup_null(field),
        PlanNode::TermRange { field, analyzer, lower, upper } => index.range_terms(
            field,
            analyzer,
            lower.as_bound().map(String::as_str),
            upper.as_bound().map(String::as_str),
        ),
        PlanNode::NumberRange { field, lower, upper } => index.range_numeric(field, lower, upper),
        PlanNode::Prefix { field, analyzer, prefix } => index.prefix(field, analyzer, prefix),
        PlanNode::Phrase { field, analyzer, terms, offsets } => {
            phrase_matches(index, field, analyzer, terms, offsets)
        }
        PlanNode::Exists { field, filter } => index.exists(field, filter),
        PlanNode::And(children) => {
            // Negated children subtract from the running intersection
            let (negated, positive): (Vec<&PlanNode>, Vec<&PlanNode>) = children
                .iter()
                .partition(|child| matches!(child, PlanNode::Not(_)));
            let positive = fold_ranges(positive.into_iter().cloned().collect(), |field| {
                !index.is_multi_valued(field)
            });

            let mut acc: Option<RoaringTreemap> = None;
            for child in &positive {
                let docs = evaluate(index, child);
                let next = match acc {
                    None => docs,
                    Some(acc) => acc & docs,
                };
                if next.is_empty() {
                    return next;
                }
                acc = Some(next);
            }

            let mut acc = acc.unwrap_or_else(|| index.universe().clone());
            for child in negated {
                if let PlanNode::Not(inner) = child {
                    acc -= evaluate(index, inner);
                }
            }
            acc
        }
        PlanNode::Or(children) => {
            let mut acc = RoaringTreemap::new();
            for child in children {
                acc |= evaluate(index, child);
            }
            acc
        }
        PlanNode::Not(child) => {
            let mut docs = index.universe().clone();
            docs -= evaluate(index, child);
            docs
        }
    }
}

fn phrase_matches(
    index: &ShardIndex,
    field: &str,
    analyzer: &str,
    terms: &[String],
    offsets: &[u32],
) -> RoaringTreemap {
    let mut candidates: Option<RoaringTreemap> = None;
    for term in terms {
        let docs = index.lookup(field, analyzer, term);
        candidates = Some(match candidates {
            None => docs,
            Some(acc) => acc & docs,
        });
    }
    let Some(candidates) = candidates else {
        return RoaringTreemap::new();
    };

    candidates
        .iter()
        .filter(|&id| {
            let positions: Vec<&[u32]> = terms
                .iter()
                .map(|term| index.positions(field, analyzer, DocId(id), term))
                .collect();
            contains_phrase(&positions, offsets)
        })
        .collect()
}

/// True if some start position `p` has term `i` at `p + offsets[i]` for every `i`
pub fn contains_phrase(positions: &[&[u32]], offsets: &[u32]) -> bool {
    let Some(first) = positions.first() else {
        return false;
    };
    first.iter().any(|&start| {
        positions
            .iter()
            .zip(offsets)
            .skip(1)
            .all(|(list, offset)| {
                start
                    .checked_add(*offset)
                    .is_some_and(|position| list.binary_search(&position).is_ok())
            })
    })
}

fn score_document(
    index: &ShardIndex,
    doc_id: DocId,
    terms: &[ScoringTerm],
    stats: &ScoringStats,
    scorer: &dyn Scorer,
) -> f32 {
    let mut score = 0.0;
    for term in terms {
        let Some(text) = index.text_index(&term.key) else {
            continue;
        };
        let Some(posting) = text.posting(&term.term, doc_id) else {
            continue;
        };
        let doc_stats = stats.doc_stats(&term.key, text.doc_length(doc_id));
        score += scorer.score(posting, &stats.term_info(term), &doc_stats);
    }
    score
}
