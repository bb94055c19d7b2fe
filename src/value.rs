use crate::lexer::quote;
use std::fmt;

/// A runtime value: the accumulator, a variable, or the result of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// The initial accumulator and the value of an undefined variable.
    #[default]
    Nil,
    Number(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Human readable kind name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Number(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Source form of the value: strings quoted and escaped, lists bracketed.
    ///
    /// For numbers and strings this is a literal that parses back to the same value.
    pub fn literal(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::literal).collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Plain rendering used by `print` and `join`: strings are written raw.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::List(_) => f.write_str(&self.literal()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
