use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Unicode lowercasing; `length` follows the new text since some characters change byte width
pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter()
            .map(|mut token| {
                if token.text.chars().any(char::is_uppercase) {
                    token.text = token.text.to_lowercase();
                    token.length = token.text.len();
                }
                token
            })
            .collect()
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}
