use crate::analysis::analyzer::{AnalyzerRegistry, IDENTITY_ANALYZER};
use crate::core::error::{Error, Result};
use crate::core::types::FieldValue;
use crate::index::bounds::RangeBound;
use crate::index::shard_index::{ExistsFilter, FieldKey};
use crate::query::ast::{CompareOp, Expr, Predicate, SortExpr, SortKey};
use crate::query::binder::{Binder, Bindings};
use crate::query::plan::{CompiledQuery, CompiledSort, CompiledSortKey, PlanNode, ScoringTerm};
use crate::scoring::scorer::ScorerKind;

/// Analyzer applied to token-based predicates in the current lexical scope.
/// Passed by value into every sub-compile so `ANALYZER(..)` cannot leak to siblings.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerContext<'a> {
    pub analyzer: &'a str,
}

impl Default for AnalyzerContext<'_> {
    fn default() -> Self {
        AnalyzerContext {
            analyzer: IDENTITY_ANALYZER,
        }
    }
}

/// Lowers a predicate tree to a [`PlanNode`].
///
/// Two phases: data-dependent sub-expressions (variables, `CONCAT`,
/// `TOKENS`, dynamic attribute names) are folded by the [`Binder`], then the
/// now static predicate is compiled structurally.
pub struct FilterCompiler<'a> {
    registry: &'a AnalyzerRegistry,
    binder: Binder<'a>,
    scoring_terms: Vec<ScoringTerm>,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(registry: &'a AnalyzerRegistry, bindings: &'a Bindings) -> Self {
        FilterCompiler {
            registry,
            binder: Binder::new(bindings, registry),
            scoring_terms: Vec::new(),
        }
    }

    pub fn compile(mut self, filter: Option<&Predicate>, sort: &[SortExpr]) -> Result<CompiledQuery> {
        let root = match filter {
            Some(predicate) => self
                .compile_predicate(predicate, AnalyzerContext::default())?
                .simplify(),
            None => PlanNode::All,
        };

        let sort = sort
            .iter()
            .map(|s| self.compile_sort(s))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(plan = ?root, scoring_terms = self.scoring_terms.len(), "compiled view filter");
        Ok(CompiledQuery {
            root,
            scoring_terms: self.scoring_terms,
            sort,
        })
    }

    fn compile_sort(&self, sort: &SortExpr) -> Result<CompiledSort> {
        let key = match &sort.key {
            SortKey::Field(field) => CompiledSortKey::Field(self.binder.field_name(field)?),
            SortKey::TfIdf { with_norm } => CompiledSortKey::Score(ScorerKind::TfIdf { with_norm: *with_norm }),
            SortKey::Bm25 { k1, b } => CompiledSortKey::Score(ScorerKind::Bm25 { k1: *k1, b: *b }),
        };
        Ok(CompiledSort {
            key,
            order: sort.order,
        })
    }

    fn compile_predicate(&mut self, predicate: &Predicate, ctx: AnalyzerContext<'_>) -> Result<PlanNode> {
        match predicate {
            Predicate::Const(true) => Ok(PlanNode::All),
            Predicate::Const(false) => Ok(PlanNode::Empty),
            Predicate::Compare { field, op, value } => {
                let field = self.binder.field_name(field)?;
                let value = self.binder.eval(value)?;
                self.compile_compare(field, *op, value, ctx)
            }
            Predicate::In { field, values } => {
                let field = self.binder.field_name(field)?;
                match self.binder.eval(values)? {
                    FieldValue::Array(values) => {
                        let children = values
                            .into_iter()
                            .map(|value| self.compile_eq(&field, value, ctx))
                            .collect::<Result<Vec<_>>>()?;
                        Ok(PlanNode::Or(children))
                    }
                    other => Err(Error::unsupported(format!(
                        "IN expects an array, got {}",
                        other
                    ))),
                }
            }
            Predicate::StartsWith { field, prefix } => {
                let field = self.binder.field_name(field)?;
                match self.binder.eval(prefix)? {
                    FieldValue::Text(prefix) => Ok(PlanNode::Prefix {
                        field,
                        analyzer: ctx.analyzer.to_string(),
                        prefix,
                    }),
                    other => Err(Error::unsupported(format!(
                        "STARTS_WITH expects a string prefix, got {}",
                        other
                    ))),
                }
            }
            Predicate::Phrase { field, phrase, analyzer } => {
                let field = self.binder.field_name(field)?;
                let analyzer = match analyzer {
                    Some(expr) => self.binder.eval_string(expr, "PHRASE analyzer")?,
                    None => ctx.analyzer.to_string(),
                };
                let phrase = self.binder.eval(phrase)?;
                self.compile_phrase(field, analyzer, phrase)
            }
            Predicate::Exists { field, kind, analyzer } => {
                let field = self.binder.field_name(field)?;
                let filter = self.exists_filter(kind.as_ref(), analyzer.as_ref(), ctx)?;
                Ok(PlanNode::Exists { field, filter })
            }
            Predicate::Analyzer { inner, analyzer } => {
                let name = self.binder.eval_string(analyzer, "ANALYZER name")?;
                self.registry.resolve(&name)?;
                self.compile_predicate(inner, AnalyzerContext { analyzer: &name })
            }
            Predicate::And(children) => Ok(PlanNode::And(self.compile_children(children, ctx)?)),
            Predicate::Or(children) => Ok(PlanNode::Or(self.compile_children(children, ctx)?)),
            Predicate::Not(child) => Ok(PlanNode::Not(Box::new(self.compile_predicate(child, ctx)?))),
        }
    }

    fn compile_children(&mut self, children: &[Predicate], ctx: AnalyzerContext<'_>) -> Result<Vec<PlanNode>> {
        children
            .iter()
            .map(|child| self.compile_predicate(child, ctx))
            .collect()
    }

    fn compile_compare(
        &mut self,
        field: String,
        op: CompareOp,
        value: FieldValue,
        ctx: AnalyzerContext<'_>,
    ) -> Result<PlanNode> {
        match (op, value) {
            (CompareOp::Eq, value) => self.compile_eq(&field, value, ctx),
            // Documents lacking the field count as "not equal"
            (CompareOp::Ne, value) => Ok(PlanNode::Not(Box::new(self.compile_eq(&field, value, ctx)?))),
            (op, FieldValue::Number(n)) => {
                let (lower, upper) = range_bounds(op, n);
                Ok(PlanNode::NumberRange { field, lower, upper })
            }
            (op, FieldValue::Text(s)) => {
                let (lower, upper) = range_bounds(op, s);
                Ok(PlanNode::TermRange {
                    field,
                    analyzer: ctx.analyzer.to_string(),
                    lower,
                    upper,
                })
            }
            (op, other) => Err(Error::unsupported(format!(
                "{:?} comparison on '{}' against {} is not supported",
                op, field, other
            ))),
        }
    }

    /// Equality terms are matched as given; only PHRASE and TOKENS analyze their input
    fn compile_eq(&mut self, field: &str, value: FieldValue, ctx: AnalyzerContext<'_>) -> Result<PlanNode> {
        match value {
            FieldValue::Text(term) => {
                self.add_scoring_term(field, ctx.analyzer, &term);
                Ok(PlanNode::Term {
                    field: field.to_string(),
                    analyzer: ctx.analyzer.to_string(),
                    term,
                })
            }
            FieldValue::Number(value) => Ok(PlanNode::Number {
                field: field.to_string(),
                value,
            }),
            FieldValue::Bool(value) => Ok(PlanNode::Bool {
                field: field.to_string(),
                value,
            }),
            FieldValue::Null => Ok(PlanNode::Null {
                field: field.to_string(),
            }),
            other => Err(Error::unsupported(format!(
                "equality on '{}' against {} is not supported",
                field, other
            ))),
        }
    }

    /// Strings are analyzed and appended; a number inside an array skips that many positions
    fn compile_phrase(&mut self, field: String, analyzer_name: String, phrase: FieldValue) -> Result<PlanNode> {
        let analyzer = self.registry.resolve(&analyzer_name)?;
        let parts = match phrase {
            FieldValue::Array(parts) => parts,
            text @ FieldValue::Text(_) => vec![text],
            other => {
                return Err(Error::unsupported(format!("PHRASE expects a string or array, got {}", other)));
            }
        };

        let overflow = || Error::unsupported(format!("PHRASE on '{}' spans more positions than a field holds", field));
        let mut terms = Vec::new();
        let mut offsets = Vec::new();
        let mut next = 0u32;
        for part in parts {
            match part {
                FieldValue::Text(text) => {
                    let tokens = analyzer.analyze(&text);
                    let base = next;
                    for token in tokens {
                        let position = base.checked_add(token.position).ok_or_else(overflow)?;
                        next = position.checked_add(1).ok_or_else(overflow)?;
                        offsets.push(position);
                        terms.push(token.text);
                    }
                }
                FieldValue::Number(gap) if gap >= 0.0 && gap.fract() == 0.0 => {
                    next = (gap <= u32::MAX as f64)
                        .then_some(gap as u32)
                        .and_then(|gap| next.checked_add(gap))
                        .ok_or_else(overflow)?;
                }
                other => {
                    return Err(Error::unsupported(format!("invalid PHRASE part {}", other)));
                }
            }
        }

        if terms.is_empty() {
            return Ok(PlanNode::Empty);
        }
        let first = offsets[0];
        for offset in &mut offsets {
            *offset -= first;
        }
        for term in &terms {
            self.add_scoring_term(&field, &analyzer_name, term);
        }
        Ok(PlanNode::Phrase {
            field,
            analyzer: analyzer_name,
            terms,
            offsets,
        })
    }

    fn exists_filter(
        &self,
        kind: Option<&Expr>,
        analyzer: Option<&Expr>,
        ctx: AnalyzerContext<'_>,
    ) -> Result<ExistsFilter> {
        let Some(kind) = kind else {
            return Ok(ExistsFilter::Any);
        };
        let kind = self.binder.eval_string(kind, "EXISTS kind")?;

        if kind == "analyzer" {
            let name = match analyzer {
                Some(expr) => self.binder.eval_string(expr, "EXISTS analyzer")?,
                None => ctx.analyzer.to_string(),
            };
            self.registry.resolve(&name)?;
            return Ok(ExistsFilter::Analyzer(name));
        }
        if analyzer.is_some() {
            return Err(Error::unsupported(format!(
                "EXISTS(.., '{}') does not take an analyzer",
                kind
            )));
        }

        match kind.as_str() {
            "string" => Ok(ExistsFilter::String),
            "numeric" => Ok(ExistsFilter::Numeric),
            "bool" | "boolean" => Ok(ExistsFilter::Bool),
            "null" => Ok(ExistsFilter::Null),
            "type" => Ok(ExistsFilter::Type),
            other => Err(Error::unsupported(format!("unknown EXISTS kind '{}'", other))),
        }
    }

    fn add_scoring_term(&mut self, field: &str, analyzer: &str, term: &str) {
        let scoring = ScoringTerm {
            key: FieldKey::new(field, analyzer),
            term: term.to_string(),
        };
        if !self.scoring_terms.contains(&scoring) {
            self.scoring_terms.push(scoring);
        }
    }
}

fn range_bounds<T>(op: CompareOp, value: T) -> (RangeBound<T>, RangeBound<T>) {
    match op {
        CompareOp::Lt => (RangeBound::Unbounded, RangeBound::Excluded(value)),
        CompareOp::Le => (RangeBound::Unbounded, RangeBound::Included(value)),
        CompareOp::Gt => (RangeBound::Excluded(value), RangeBound::Unbounded),
        _ => (RangeBound::Included(value), RangeBound::Unbounded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::query::ast::SortOrder;

    fn compile(predicate: Predicate) -> Result<CompiledQuery> {
        let registry = AnalyzerRegistry::new();
        let bindings = Bindings::new();
        FilterCompiler::new(&registry, &bindings).compile(Some(&predicate), &[])
    }

    #[test]
    fn analyzer_scope_does_not_leak_to_siblings() {
        let predicate = Predicate::analyzer(Predicate::eq("text", "quick"), "text_en")
            .and(Predicate::eq("a", "foo"));
        let plan = compile(predicate).unwrap().root;

        let PlanNode::And(children) = plan else {
            panic!("expected conjunction, got {:?}", plan);
        };
        assert_eq!(
            children[0],
            PlanNode::Term { field: "text".into(), analyzer: "text_en".into(), term: "quick".into() }
        );
        assert_eq!(
            children[1],
            PlanNode::Term { field: "a".into(), analyzer: "identity".into(), term: "foo".into() }
        );
    }

    #[test]
    fn phrase_is_analyzed_with_relative_offsets() {
        let plan = compile(Predicate::phrase("text", "Quick brown FOX jumps", Some("text_en")))
            .unwrap()
            .root;
        assert_eq!(
            plan,
            PlanNode::Phrase {
                field: "text".into(),
                analyzer: "text_en".into(),
                terms: vec!["quick".into(), "brown".into(), "fox".into(), "jump".into()],
                offsets: vec![0, 1, 2, 3],
            }
        );

        let gapped = Expr::array([Expr::from("quick"), Expr::from(1), Expr::from("fox")]);
        let plan = compile(Predicate::phrase("text", gapped, Some("text_en"))).unwrap().root;
        let PlanNode::Phrase { offsets, .. } = plan else {
            panic!("expected phrase");
        };
        assert_eq!(offsets, vec![0, 2]);
    }

    #[test]
    fn oversized_phrase_gap_is_rejected() {
        for gap in [4294967295.0, 1e12] {
            let gapped = Expr::array([Expr::from("quick"), Expr::from(gap), Expr::from("fox")]);
            let err = compile(Predicate::phrase("text", gapped, Some("text_en"))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);
        }

        let trailing = Expr::array([Expr::from("quick"), Expr::from(4294967294.0)]);
        assert!(compile(Predicate::phrase("text", trailing, Some("text_en"))).is_ok());
    }

    #[test]
    fn exists_forms() {
        let root = |p| compile(p).unwrap().root;
        assert_eq!(
            root(Predicate::exists_kind("text", "analyzer")),
            PlanNode::Exists { field: "text".into(), filter: ExistsFilter::Analyzer("identity".into()) }
        );
        assert_eq!(
            root(Predicate::analyzer(Predicate::exists_kind("text", "analyzer"), "text_en")),
            PlanNode::Exists { field: "text".into(), filter: ExistsFilter::Analyzer("text_en".into()) }
        );
        assert_eq!(
            root(Predicate::exists_kind("x", "type")),
            PlanNode::Exists { field: "x".into(), filter: ExistsFilter::Type }
        );
        let err = compile(Predicate::exists_kind("x", "date")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);
    }

    #[test]
    fn unknown_analyzer_fails_before_execution() {
        let err = compile(Predicate::analyzer(Predicate::eq("a", "x"), "nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAnalyzer);
        let err = compile(Predicate::phrase("text", "quick", Some("nope"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAnalyzer);
    }

    #[test]
    fn unsupported_comparisons_are_reported() {
        let err = compile(Predicate::lt("c", true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);
        let err = compile(Predicate::eq("c", Expr::array([Expr::from(1)]))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);
        let err = compile(Predicate::starts_with("a", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);
    }

    #[test]
    fn in_tokens_collects_scoring_terms() {
        let predicate = Predicate::analyzer(
            Predicate::is_in("text", Expr::tokens("the quick brown", "text_en")),
            "text_en",
        );
        let registry = AnalyzerRegistry::new();
        let bindings = Bindings::new();
        let sort = [crate::query::ast::SortExpr::tfidf(false, SortOrder::Desc)];
        let query = FilterCompiler::new(&registry, &bindings)
            .compile(Some(&predicate), &sort)
            .unwrap();

        assert!(query.needs_scores());
        let terms: Vec<&str> = query.scoring_terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["the", "quick", "brown"]);
        assert!(matches!(query.root, PlanNode::Or(ref c) if c.len() == 3));
    }
}
