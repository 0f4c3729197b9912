use std::rc::Rc;

use derivative::Derivative;

use super::environment::EnvId;
use crate::parser::ast::{FunDecl, Idx};

pub type NativeFn = fn(&[Value]) -> Value;

#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Callable(Rc<Callable>),
}

#[derive(Debug)]
pub struct Callable {
    pub(crate) name: String,
    pub(crate) arity: usize,
    /// Environment the function was declared in.
    pub(crate) closure: EnvId,
    pub(crate) kind: CallableKind,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub enum CallableKind {
    Native(#[derivative(Debug = "ignore")] NativeFn),
    Function(Idx<FunDecl>),
}

impl Value {
    /// Only `false` and `nil` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_callable(&self) -> Option<&Rc<Callable>> {
        match self {
            Value::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    pub(crate) fn same_kind(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Structural equality; callables never compare equal, not even to themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

/// Shortest round-trip digits, switching to `1e+21` style exponents below
/// `1e-4` and from `1e16` up.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let scientific = format!("{n:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return format!("{n}");
    };
    match exponent.parse::<i32>() {
        Ok(exp) if n != 0.0 && !(-4..16).contains(&exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        _ => format!("{n}"),
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::Callable(callable) => match callable.kind {
                CallableKind::Native(_) => write!(f, "<native fn {}>", callable.name),
                CallableKind::Function(_) => write!(f, "<fn {}>", callable.name),
            },
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}
