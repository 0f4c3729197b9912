use thiserror::Error;

/// Why a piece of source did not run to completion.
///
/// Every failure has already been written to the diagnostic sink by the
/// time one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{0} lexical error(s)")]
    Lex(usize),
    #[error("{0} syntax error(s)")]
    Parse(usize),
    #[error("{0} static error(s)")]
    Resolve(usize),
    #[error("[line {line}] {message}")]
    Runtime { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
