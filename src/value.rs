//! Runtime value type for the expression language.
//!
//! Expressions are dynamically typed over four shapes: the null marker,
//! 32-bit integers, byte strings, and ordered lists. Lists own their
//! elements, so `Clone` copies them all the way down.

use std::fmt;

/// A value produced by evaluating an expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent/default marker. A successful expression never yields this;
    /// it exists so a host can report "looked up, nothing there".
    #[default]
    Null,
    Int(i32),
    Str(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    /// Renders the scalar forms the way the expander flattens them:
    /// base-10 for integers, the bytes themselves for strings. Lists and
    /// null have no single-string rendering; the expander flattens lists
    /// element-wise instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(_) => write!(f, "<list>"),
        }
    }
}

impl Value {
    /// Truthiness as the ternary condition sees it: any string or list is
    /// true, an integer is true when nonzero, null is false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(n) => *n != 0,
            Value::Str(_) | Value::List(_) => true,
        }
    }

    /// Name of the type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
