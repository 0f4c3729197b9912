pub mod ast;
mod dump;
mod error;
mod grammar;
pub mod token_stream;
pub mod tokenizer;

pub use dump::AstPrinter;
pub use error::ParseError;
pub use grammar::Parser;
pub use token_stream::TokenStream;
pub use tokenizer::{tokenize_string, Token, TokenType, TokenValue, Tokenizer};
