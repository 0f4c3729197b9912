use thiserror::Error;

use crate::diagnostics::DiagnosticSink;

/// A syntax error at one token, not yet reported.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] Error {location}: {message}")]
pub struct ParseError {
    pub(crate) line: usize,
    pub(crate) location: String,
    pub(crate) message: String,
}

impl ParseError {
    pub fn new(line: usize, location: String, message: &str) -> Self {
        Self {
            line,
            location,
            message: message.to_string(),
        }
    }

    pub(crate) fn report(&self, diag: &dyn DiagnosticSink) {
        diag.report(self.line, &self.location, &self.message);
    }
}

pub(super) type PResult<T> = Result<T, ParseError>;
