use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use crate::analysis::analyzer::{AnalyzerRegistry, IDENTITY_ANALYZER};
use crate::core::error::Result;

fn identity_analyzers() -> Vec<String> {
    vec![IDENTITY_ANALYZER.to_string()]
}

/// Per-field configuration inside a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default = "identity_analyzers")]
    pub analyzers: Vec<String>,
}

impl FieldConfig {
    pub fn new<S: Into<String>>(analyzers: impl IntoIterator<Item = S>) -> Self {
        FieldConfig {
            analyzers: analyzers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        FieldConfig {
            analyzers: identity_analyzers(),
        }
    }
}

/// Binds one collection to a view.
///
/// Persisted as `{includeAllFields: bool, fields: {<name>: {analyzers: [..]}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConfig {
    #[serde(default)]
    pub include_all_fields: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,
}

impl LinkConfig {
    pub fn new() -> Self {
        LinkConfig::default()
    }

    pub fn include_all_fields(mut self, include: bool) -> Self {
        self.include_all_fields = include;
        self
    }

    pub fn with_field<S: Into<String>>(
        mut self,
        name: &str,
        analyzers: impl IntoIterator<Item = S>,
    ) -> Self {
        self.fields.insert(name.to_string(), FieldConfig::new(analyzers));
        self
    }

    /// Analyzers a top-level field is indexed under, `None` when the link does not cover it.
    /// An explicit entry replaces the identity default that `includeAllFields` would give.
    pub fn analyzers_for(&self, field: &str) -> Option<Vec<&str>> {
        match self.fields.get(field) {
            Some(config) => Some(config.analyzers.iter().map(String::as_str).collect()),
            None if self.include_all_fields => Some(vec![IDENTITY_ANALYZER]),
            None => None,
        }
    }

    pub fn covers(&self, field: &str) -> bool {
        self.analyzers_for(field).is_some()
    }

    /// Every analyzer named by the link must already be registered
    pub fn validate(&self, registry: &AnalyzerRegistry) -> Result<()> {
        for config in self.fields.values() {
            for name in &config.analyzers {
                registry.resolve(name)?;
            }
        }
        Ok(())
    }
}
