use super::ast::Idx;
use super::tokenizer::{Token, TokenType};

/// Append-only token storage shared by every unit parsed from one arena.
///
/// The first `first_source` tokens are synthetic (the `true` literal that an
/// omitted `for` condition desugars to); real source tokens follow, and the
/// last token is always an `ENDMARKER`.
#[derive(Clone, Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    first_source: usize,
}

const SYNTHETIC_TRUE: usize = 0;

impl TokenStream {
    pub fn new() -> Self {
        let tokens = vec![Token::new(TokenType::TRUE, 0)];
        let first_source = tokens.len();
        Self {
            tokens,
            first_source,
        }
    }

    pub(crate) fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Drops our terminator and appends the real tokens of `batch`.
    pub fn append(&mut self, batch: TokenStream) {
        if matches!(self.tokens.last(), Some(t) if t.typ == TokenType::ENDMARKER) {
            self.tokens.pop();
        }
        self.tokens
            .extend(batch.tokens.into_iter().skip(batch.first_source));
    }

    pub fn synthetic_true() -> Idx<Token> {
        Idx::new(SYNTHETIC_TRUE)
    }

    pub fn first_source_index(&self) -> usize {
        self.first_source
    }

    /// Real tokens only, terminator included.
    pub fn source_tokens(&self) -> &[Token] {
        &self.tokens[self.first_source..]
    }

    pub fn get(&self, idx: Idx<Token>) -> &Token {
        &self.tokens[idx.index()]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.len() == self.first_source
    }
}

impl Default for TokenStream {
    fn default() -> Self {
        Self::new()
    }
}
