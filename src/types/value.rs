//! Self-describing value union for artifacts, wire messages, and storage
//! snapshots.
//!
//! This is the serialization-facing form: plain owned data with structural
//! equality. The VM converts it to and from its runtime representation (which
//! has reference semantics for arrays and objects) at execution boundaries,
//! and that conversion is what enforces the deep-copy isolation of artifact
//! storage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically typed value.
///
/// JSON mapping is untagged: integers stay integers, non-integral numbers
/// become doubles, and objects keep string keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Double(f64),
    Str(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Int(_) => "Int",
            Value::Double(_) => "Double",
            Value::Str(_) => "Str",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// Converts a number literal into its canonical value form: integral
    /// numbers intern as integers, everything else as doubles.
    pub fn from_number(n: f64) -> Value {
        if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
            Value::Int(n as i64)
        } else {
            Value::Double(n)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_integers_stay_integers() {
        let value: Value = serde_json::from_str("42").unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn json_fractions_become_doubles() {
        let value: Value = serde_json::from_str("2.5").unwrap();
        assert_eq!(value, Value::Double(2.5));
    }

    #[test]
    fn json_roundtrip_composite() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), Value::from("alice"));
        fields.insert("age".to_string(), Value::Int(3));
        let value = Value::Array(vec![Value::Object(fields), Value::Null]);

        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn from_number_splits_on_fraction() {
        assert_eq!(Value::from_number(300.0), Value::Int(300));
        assert_eq!(Value::from_number(2.5), Value::Double(2.5));
        assert_eq!(Value::from_number(-1.0), Value::Int(-1));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
    }
}
