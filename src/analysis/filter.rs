use crate::analysis::token::Token;

/// One stage of an analyzer pipeline. Filters may rewrite or drop tokens but
/// never renumber positions.
pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token>;

    fn name(&self) -> &str;
}
