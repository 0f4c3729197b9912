use thiserror::Error;

use crate::parser::ast::Idx;
use crate::parser::Token;

/// An error raised while executing, tied to the token that caused it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub(crate) token: Idx<Token>,
    pub(crate) message: String,
}

impl RuntimeError {
    pub fn new(token: Idx<Token>, message: impl Into<String>) -> Self {
        Self {
            token,
            message: message.into(),
        }
    }

    pub(crate) fn operand_not_number(token: Idx<Token>) -> Self {
        Self::new(token, "Operand must evaluate to a number.")
    }

    pub(crate) fn type_mismatch(token: Idx<Token>) -> Self {
        Self::new(token, "Operands' type mismatch.")
    }

    pub(crate) fn unsupported_operands(token: Idx<Token>) -> Self {
        Self::new(token, "Operands with unsupported type.")
    }

    pub(crate) fn undefined_variable(token: Idx<Token>, name: &str) -> Self {
        Self::new(token, format!("Undefined variable: '{name}'."))
    }

    pub(crate) fn arity(token: Idx<Token>, expected: usize, got: usize) -> Self {
        Self::new(
            token,
            format!("Expected {expected} arguments but got {got}."),
        )
    }

    pub(crate) fn not_callable(token: Idx<Token>) -> Self {
        Self::new(token, "Can only call functions and classes.")
    }
}
