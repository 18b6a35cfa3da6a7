use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, StandardTokenizer, Tokenizer};
use crate::core::error::{Error, ErrorKind, Result};

pub const IDENTITY_ANALYZER: &str = "identity";

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }

    /// The raw value as exactly one token
    pub fn identity() -> Self {
        Analyzer::new(IDENTITY_ANALYZER.to_string(), Box::new(KeywordTokenizer))
    }

    /// Word-boundary tokenizer, lowercasing and snowball stemming for one language
    pub fn text(name: &str, algorithm: Algorithm) -> Self {
        Analyzer::new(name.to_string(), Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StemmerFilter::new(algorithm)))
    }
}

/// Registry for managing analyzers
///
/// Read-mostly: lookups share the lock, registration takes it exclusively.
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<Analyzer>>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            analyzers: RwLock::new(HashMap::new()),
        };

        // Register default analyzers
        registry.register_defaults();
        registry
    }

    fn register_defaults(&self) {
        let defaults = [
            Analyzer::identity(),
            Analyzer::text("text", Algorithm::English),
            Analyzer::text("text_en", Algorithm::English),
            Analyzer::text("text_de", Algorithm::German),
            Analyzer::text("text_es", Algorithm::Spanish),
            Analyzer::text("text_fi", Algorithm::Finnish),
            Analyzer::text("text_fr", Algorithm::French),
            Analyzer::text("text_it", Algorithm::Italian),
            Analyzer::text("text_nl", Algorithm::Dutch),
            Analyzer::text("text_no", Algorithm::Norwegian),
            Analyzer::text("text_pt", Algorithm::Portuguese),
            Analyzer::text("text_ru", Algorithm::Russian),
            Analyzer::text("text_sv", Algorithm::Swedish),
        ];

        let mut analyzers = self.analyzers.write();
        for analyzer in defaults {
            analyzers.insert(analyzer.name.clone(), Arc::new(analyzer));
        }
    }

    pub fn register(&self, analyzer: Analyzer) -> Result<()> {
        let mut analyzers = self.analyzers.write();
        if analyzers.contains_key(&analyzer.name) {
            return Err(Error::new(
                ErrorKind::Duplicate,
                format!("analyzer '{}' is already registered", analyzer.name),
            ));
        }
        tracing::info!(analyzer = %analyzer.name, "registered analyzer");
        analyzers.insert(analyzer.name.clone(), Arc::new(analyzer));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        self.analyzers.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.analyzers.read().contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Analyzer>> {
        self.get(name).ok_or_else(|| Error::unknown_analyzer(name))
    }

    pub fn analyze(&self, analyzer_name: &str, text: &str) -> Result<Vec<Token>> {
        self.resolve(analyzer_name).map(|analyzer| analyzer.analyze(text))
    }

    /// Token texts only, as produced by `TOKENS(text, analyzer)`
    pub fn tokens(&self, analyzer_name: &str, text: &str) -> Result<Vec<String>> {
        self.resolve(analyzer_name).map(|analyzer| analyzer.terms(text))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.analyzers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
