use std::collections::HashMap;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::FieldValue;
use crate::query::ast::{Expr, FieldRef};

/// Variables visible to a view query, e.g. the current row of an outer loop
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    vars: HashMap<String, FieldValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn bind(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.vars.get(name)
    }
}

/// Folds data-dependent sub-expressions into constants
pub struct Binder<'a> {
    bindings: &'a Bindings,
    registry: &'a AnalyzerRegistry,
}

impl<'a> Binder<'a> {
    pub fn new(bindings: &'a Bindings, registry: &'a AnalyzerRegistry) -> Self {
        Binder { bindings, registry }
    }

    pub fn eval(&self, expr: &Expr) -> Result<FieldValue> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => self.bindings.get(name).cloned().ok_or_else(|| {
                Error::new(ErrorKind::InvalidArgument, format!("variable '{}' is not bound", name))
            }),
            Expr::Attribute(base, attribute) => {
                // Attribute access on a non-object yields null
                let base = self.eval(base)?;
                Ok(base.get(attribute).cloned().unwrap_or(FieldValue::Null))
            }
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    append_string(&mut out, &self.eval(part)?);
                }
                Ok(FieldValue::Text(out))
            }
            Expr::Tokens(text, analyzer) => {
                let text = self.eval_string(text, "TOKENS text")?;
                let analyzer = self.eval_string(analyzer, "TOKENS analyzer")?;
                let tokens = self.registry.tokens(&analyzer, &text)?;
                Ok(FieldValue::Array(tokens.into_iter().map(FieldValue::Text).collect()))
            }
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(FieldValue::Array(values))
            }
        }
    }

    pub fn eval_string(&self, expr: &Expr, what: &str) -> Result<String> {
        match self.eval(expr)? {
            FieldValue::Text(s) => Ok(s),
            other => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{} must be a string, got {}", what, other),
            )),
        }
    }

    /// Resolves `doc.a` / `doc[expr]` to a plain attribute name
    pub fn field_name(&self, field: &FieldRef) -> Result<String> {
        match field {
            FieldRef::Static(name) => Ok(name.clone()),
            FieldRef::Dynamic(expr) => match self.eval(expr)? {
                FieldValue::Text(name) => Ok(name),
                other => Err(Error::unsupported(format!(
                    "attribute name must evaluate to a string, got {}",
                    other
                ))),
            },
        }
    }
}

fn append_string(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Null => {}
        FieldValue::Text(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_outer_variables_and_concat() {
        let registry = AnalyzerRegistry::new();
        let mut row = std::collections::BTreeMap::new();
        row.insert("id".to_string(), FieldValue::Number(1.0));
        let bindings = Bindings::new().bind("adoc", FieldValue::Object(row));
        let binder = Binder::new(&bindings, &registry);

        let id = binder.eval(&Expr::var("adoc").attr("id")).unwrap();
        assert_eq!(id, FieldValue::Number(1.0));

        let missing = binder.eval(&Expr::var("adoc").attr("nope")).unwrap();
        assert_eq!(missing, FieldValue::Null);

        let name = binder
            .field_name(&FieldRef::dynamic(Expr::concat([Expr::from("another"), Expr::from("NumericField")])))
            .unwrap();
        assert_eq!(name, "anotherNumericField");
    }

    #[test]
    fn tokens_uses_named_analyzer() {
        let registry = AnalyzerRegistry::new();
        let bindings = Bindings::new();
        let binder = Binder::new(&bindings, &registry);

        let tokens = binder.eval(&Expr::tokens("The Quick Brown", "text_en")).unwrap();
        assert_eq!(
            tokens,
            FieldValue::Array(vec!["the".into(), "quick".into(), "brown".into()])
        );

        let err = binder.eval(&Expr::tokens("x", "missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAnalyzer);
        let err = binder.eval(&Expr::var("unbound")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
