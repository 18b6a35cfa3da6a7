use serde::{Serialize, Deserialize};
use crate::core::types::FieldValue;

/// Value expression, folded to a constant before the filter is compiled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(FieldValue),
    Var(String),                     // bound outer loop variable
    Attribute(Box<Expr>, String),    // adoc.id
    Concat(Vec<Expr>),               // CONCAT(a, b, ...)
    Tokens(Box<Expr>, Box<Expr>),    // TOKENS(text, analyzer)
    Array(Vec<Expr>),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn attr(self, attribute: &str) -> Self {
        Expr::Attribute(Box::new(self), attribute.to_string())
    }

    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Concat(parts.into_iter().collect())
    }

    pub fn tokens(text: impl Into<Expr>, analyzer: &str) -> Self {
        Expr::Tokens(Box::new(text.into()), Box::new(Expr::from(analyzer)))
    }

    pub fn array(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Array(items.into_iter().collect())
    }
}

impl From<FieldValue> for Expr {
    fn from(value: FieldValue) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(FieldValue::from(value))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(FieldValue::from(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Literal(FieldValue::from(value))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Literal(FieldValue::from(value))
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Literal(FieldValue::from(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(FieldValue::from(value))
    }
}

/// Attribute of the view document a predicate applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldRef {
    Static(String),   // doc.a
    Dynamic(Expr),    // doc[expr]
}

impl FieldRef {
    pub fn dynamic(expr: impl Into<Expr>) -> Self {
        FieldRef::Dynamic(expr.into())
    }
}

impl From<&str> for FieldRef {
    fn from(name: &str) -> Self {
        FieldRef::Static(name.to_string())
    }
}

impl From<String> for FieldRef {
    fn from(name: String) -> Self {
        FieldRef::Static(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Filter expression over the documents of a view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Const(bool),
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Expr,
    },
    In {
        field: FieldRef,
        values: Expr,
    },
    StartsWith {
        field: FieldRef,
        prefix: Expr,
    },
    Phrase {
        field: FieldRef,
        phrase: Expr,
        analyzer: Option<Expr>,
    },
    Exists {
        field: FieldRef,
        kind: Option<Expr>,
        analyzer: Option<Expr>,
    },
    /// `ANALYZER(inner, name)`: rebinds the analyzer for `inner` only
    Analyzer {
        inner: Box<Predicate>,
        analyzer: Expr,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<FieldRef>, op: CompareOp, value: impl Into<Expr>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<FieldRef>, value: impl Into<Expr>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<FieldRef>, value: impl Into<Expr>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: impl Into<FieldRef>, value: impl Into<Expr>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<FieldRef>, value: impl Into<Expr>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: impl Into<FieldRef>, value: impl Into<Expr>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<FieldRef>, value: impl Into<Expr>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn is_in(field: impl Into<FieldRef>, values: impl Into<Expr>) -> Self {
        Predicate::In {
            field: field.into(),
            values: values.into(),
        }
    }

    pub fn starts_with(field: impl Into<FieldRef>, prefix: impl Into<Expr>) -> Self {
        Predicate::StartsWith {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    pub fn phrase(field: impl Into<FieldRef>, phrase: impl Into<Expr>, analyzer: Option<&str>) -> Self {
        Predicate::Phrase {
            field: field.into(),
            phrase: phrase.into(),
            analyzer: analyzer.map(Expr::from),
        }
    }

    pub fn exists(field: impl Into<FieldRef>) -> Self {
        Predicate::Exists {
            field: field.into(),
            kind: None,
            analyzer: None,
        }
    }

    /// `EXISTS(field, kind)` with kind one of string, numeric, bool, null, type, analyzer
    pub fn exists_kind(field: impl Into<FieldRef>, kind: &str) -> Self {
        Predicate::Exists {
            field: field.into(),
            kind: Some(Expr::from(kind)),
            analyzer: None,
        }
    }

    pub fn exists_analyzer(field: impl Into<FieldRef>, analyzer: &str) -> Self {
        Predicate::Exists {
            field: field.into(),
            kind: Some(Expr::from("analyzer")),
            analyzer: Some(Expr::from(analyzer)),
        }
    }

    pub fn analyzer(inner: Predicate, analyzer: &str) -> Self {
        Predicate::Analyzer {
            inner: Box::new(inner),
            analyzer: Expr::from(analyzer),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut children) => {
                children.push(other);
                Predicate::And(children)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut children) => {
                children.push(other);
                Predicate::Or(children)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortKey {
    Field(FieldRef),
    /// `TFIDF(doc[, withNorm])`
    TfIdf { with_norm: bool },
    /// `BM25(doc[, k, b])`
    Bm25 { k1: f32, b: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortExpr {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortExpr {
    pub fn field(field: impl Into<FieldRef>, order: SortOrder) -> Self {
        SortExpr {
            key: SortKey::Field(field.into()),
            order,
        }
    }

    pub fn asc(field: impl Into<FieldRef>) -> Self {
        Self::field(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<FieldRef>) -> Self {
        Self::field(field, SortOrder::Desc)
    }

    pub fn tfidf(with_norm: bool, order: SortOrder) -> Self {
        SortExpr {
            key: SortKey::TfIdf { with_norm },
            order,
        }
    }

    pub fn bm25(order: SortOrder) -> Self {
        SortExpr {
            key: SortKey::Bm25 { k1: 1.2, b: 0.75 },
            order,
        }
    }
}
