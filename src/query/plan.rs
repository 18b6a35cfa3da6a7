use std::mem;
use serde::{Serialize, Deserialize};
use crate::index::bounds::{tighter_lower, tighter_upper, RangeBound};
use crate::index::shard_index::{ExistsFilter, FieldKey};
use crate::query::ast::SortOrder;
use crate::scoring::scorer::ScorerKind;

/// Executable filter: primitive index operations combined by set algebra.
/// Immutable once compiled and shipped unchanged to every shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    All,
    Empty,
    Term {
        field: String,
        analyzer: String,
        term: String,
    },
    Number {
        field: String,
        value: f64,
    },
    Bool {
        field: String,
        value: bool,
    },
    Null {
        field: String,
    },
    TermRange {
        field: String,
        analyzer: String,
        lower: RangeBound<String>,
        upper: RangeBound<String>,
    },
    NumberRange {
        field: String,
        lower: RangeBound<f64>,
        upper: RangeBound<f64>,
    },
    Prefix {
        field: String,
        analyzer: String,
        prefix: String,
    },
    /// `offsets[i]` is the position of `terms[i]` relative to the first term
    Phrase {
        field: String,
        analyzer: String,
        terms: Vec<String>,
        offsets: Vec<u32>,
    },
    Exists {
        field: String,
        filter: ExistsFilter,
    },
    And(Vec<PlanNode>),
    Or(Vec<PlanNode>),
    Not(Box<PlanNode>),
}

impl PlanNode {
    /// Flattens connectives and drops neutral children
    pub fn simplify(self) -> PlanNode {
        match self {
            PlanNode::And(children) => simplify_and(children),
            PlanNode::Or(children) => simplify_or(children),
            PlanNode::Not(child) => match child.simplify() {
                PlanNode::All => PlanNode::Empty,
                PlanNode::Empty => PlanNode::All,
                PlanNode::Not(inner) => *inner,
                other => PlanNode::Not(Box::new(other)),
            },
            leaf => leaf,
        }
    }
}

fn simplify_and(children: Vec<PlanNode>) -> PlanNode {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child.simplify() {
            PlanNode::All => {}
            PlanNode::Empty => return PlanNode::Empty,
            PlanNode::And(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    match flat.len() {
        0 => PlanNode::All,
        1 => flat.pop().unwrap_or(PlanNode::All),
        _ => PlanNode::And(flat),
    }
}

fn simplify_or(children: Vec<PlanNode>) -> PlanNode {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child.simplify() {
            PlanNode::Empty => {}
            PlanNode::All => return PlanNode::All,
            PlanNode::Or(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    match flat.len() {
        0 => PlanNode::Empty,
        1 => flat.pop().unwrap_or(PlanNode::Empty),
        _ => PlanNode::Or(flat),
    }
}

/// `c > 1 AND c < 3` becomes one range scan.
///
/// Only sound for fields holding one value per document: `[0, 5]` satisfies
/// both comparisons through different elements but neither folded interval.
/// `single_valued` tells which fields may be folded.
pub fn fold_ranges(nodes: Vec<PlanNode>, single_valued: impl Fn(&str) -> bool) -> Vec<PlanNode> {
    let mut out: Vec<PlanNode> = Vec::with_capacity(nodes.len());

    for node in nodes {
        match node {
            PlanNode::NumberRange { field, lower, upper } if single_valued(&field) => {
                let existing = out.iter_mut().find(|n| {
                    matches!(n, PlanNode::NumberRange { field: f, .. } if *f == field)
                });
                if let Some(PlanNode::NumberRange { lower: l, upper: u, .. }) = existing {
                    *l = tighter_lower(mem::replace(l, RangeBound::Unbounded), lower, |a, b| a.total_cmp(b));
                    *u = tighter_upper(mem::replace(u, RangeBound::Unbounded), upper, |a, b| a.total_cmp(b));
                } else {
                    out.push(PlanNode::NumberRange { field, lower, upper });
                }
            }
            PlanNode::TermRange { field, analyzer, lower, upper } if single_valued(&field) => {
                let existing = out.iter_mut().find(|n| {
                    matches!(n, PlanNode::TermRange { field: f, analyzer: a, .. } if *f == field && *a == analyzer)
                });
                if let Some(PlanNode::TermRange { lower: l, upper: u, .. }) = existing {
                    *l = tighter_lower(mem::replace(l, RangeBound::Unbounded), lower, |a, b| a.cmp(b));
                    *u = tighter_upper(mem::replace(u, RangeBound::Unbounded), upper, |a, b| a.cmp(b));
                } else {
                    out.push(PlanNode::TermRange { field, analyzer, lower, upper });
                }
            }
            other => out.push(other),
        }
    }

    out
}

/// A query term that contributes to relevance scores
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoringTerm {
    pub key: FieldKey,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledSortKey {
    Field(String),
    Score(ScorerKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledSort {
    pub key: CompiledSortKey,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub root: PlanNode,
    pub scoring_terms: Vec<ScoringTerm>,
    pub sort: Vec<CompiledSort>,
}

impl CompiledQuery {
    pub fn is_sorted(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Scores are computed only when a sort key asks for them
    pub fn needs_scores(&self) -> bool {
        self.sort
            .iter()
            .any(|s| matches!(s.key, CompiledSortKey::Score(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(lower: RangeBound<f64>, upper: RangeBound<f64>) -> PlanNode {
        PlanNode::NumberRange {
            field: "c".to_string(),
            lower,
            upper,
        }
    }

    #[test]
    fn conjunction_of_bounds_folds_into_one_range() {
        let plan = PlanNode::And(vec![
            range(RangeBound::Excluded(1.0), RangeBound::Unbounded),
            PlanNode::All,
            range(RangeBound::Unbounded, RangeBound::Excluded(3.0)),
        ])
        .simplify();
        let PlanNode::And(children) = plan else {
            panic!("expected conjunction, got {:?}", plan);
        };
        assert_eq!(children.len(), 2);

        let folded = fold_ranges(children.clone(), |_| true);
        assert_eq!(folded, vec![range(RangeBound::Excluded(1.0), RangeBound::Excluded(3.0))]);

        // Multi-valued fields keep one scan per comparison
        assert_eq!(fold_ranges(children.clone(), |field| field != "c"), children);
    }

    #[test]
    fn neutral_children_collapse() {
        let term = PlanNode::Term {
            field: "a".into(),
            analyzer: "identity".into(),
            term: "foo".into(),
        };
        assert_eq!(PlanNode::Or(vec![PlanNode::Empty, term.clone()]).simplify(), term);
        assert_eq!(PlanNode::And(vec![PlanNode::Empty, term.clone()]).simplify(), PlanNode::Empty);
        assert_eq!(PlanNode::Not(Box::new(PlanNode::Not(Box::new(term.clone())))).simplify(), term);
        assert_eq!(PlanNode::Or(vec![]).simplify(), PlanNode::Empty);
    }
}
