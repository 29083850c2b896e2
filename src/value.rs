//! The parsed document's value representation.
//!
//! Per the design notes: a tagged sum over scalar/object/list, with the
//! "list vs object" ambiguity resolved at block close rather than open, and
//! duplicate keys preserved as an ordered entries vector rather than
//! collapsed into a map.

use serde::Serialize;
use std::fmt;

/// A scalar leaf value. Dates are kept as their source string (already
/// lexicographically sortable per spec section 3) rather than parsed into a
/// calendar type, since the 360-day year has no stdlib equivalent and
/// nothing in this service needs date arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Integer(i64),
    Number(f64),
    String(String),
    Date(String),
    Identifier(String),
    Bool(bool),
}

impl Scalar {
    /// The raw text this scalar was parsed from, reconstructed rather than
    /// stored twice. Used by `contains_kv`'s whitespace-insensitive match.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Integer(n) => n.to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::String(s) => s.clone(),
            Scalar::Date(s) => s.clone(),
            Scalar::Identifier(s) => s.clone(),
            Scalar::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// A single `key = value` occurrence inside a block. Kept as a vector entry
/// (not a map entry) so repeated keys are never collapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

/// The document value type: scalar, an ordered object (duplicate keys
/// preserved), or a list of bare values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Object(Vec<Entry>),
    List(Vec<Value>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[Entry]> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Simple-key lookup: returns the *last* occurrence of `key`, matching
    /// common consumer expectations (spec section 4.3). Use
    /// `all_values_for_key` to recover every occurrence.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }

    /// Every value assigned to `key` in this object, in source order. The
    /// only faithful way to read a field that repeats (spec section 4.5 #9).
    pub fn all_values_for_key<'a>(&'a self, key: &str) -> Vec<&'a Value> {
        match self.as_object() {
            Some(entries) => entries
                .iter()
                .filter(|e| e.key == key)
                .map(|e| &e.value)
                .collect(),
            None => Vec::new(),
        }
    }

    /// True if this value is the bare identifier `none` (spec section 3's
    /// "absent/deleted entry" sentinel).
    pub fn is_none_identifier(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Identifier(s)) if s == "none")
    }
}

/// Serializes a `Value` the way the query engine's JSON responses need:
/// objects as JSON objects (last-value-wins per key, matching `Value::get`),
/// lists as JSON arrays, scalars as their natural JSON type.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            Value::Scalar(Scalar::Integer(n)) => serializer.serialize_i64(*n),
            Value::Scalar(Scalar::Number(n)) => serializer.serialize_f64(*n),
            Value::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            Value::Scalar(Scalar::String(s))
            | Value::Scalar(Scalar::Date(s))
            | Value::Scalar(Scalar::Identifier(s)) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Object(entries) => {
                // Last-value-wins per key when flattened to JSON: a JSON
                // object has no concept of repeated keys, so this mirrors
                // `Value::get`'s semantics for any consumer of extract_sections.
                let mut seen: Vec<&str> = Vec::new();
                let mut ordered: Vec<(&str, &Value)> = Vec::new();
                for entry in entries {
                    if let Some(pos) = seen.iter().position(|k| *k == entry.key) {
                        ordered[pos] = (&entry.key, &entry.value);
                    } else {
                        seen.push(&entry.key);
                        ordered.push((&entry.key, &entry.value));
                    }
                }
                let mut map = serializer.serialize_map(Some(ordered.len()))?;
                for (k, v) in ordered {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(entries: Vec<(&str, Value)>) -> Value {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| Entry {
                    key: k.to_string(),
                    value: v,
                })
                .collect(),
        )
    }

    #[test]
    fn get_returns_last_occurrence() {
        let v = obj(vec![
            ("traits", Value::Scalar(Scalar::String("a".into()))),
            ("traits", Value::Scalar(Scalar::String("b".into()))),
        ]);
        assert_eq!(
            v.get("traits"),
            Some(&Value::Scalar(Scalar::String("b".into())))
        );
    }

    #[test]
    fn all_values_for_key_preserves_order() {
        let v = obj(vec![
            ("traits", Value::Scalar(Scalar::String("trait_resilient".into()))),
            ("traits", Value::Scalar(Scalar::String("trait_resilient".into()))),
            ("traits", Value::Scalar(Scalar::String("trait_carefree".into()))),
        ]);
        let all = v.all_values_for_key("traits");
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].as_scalar().unwrap().as_text(), "trait_carefree");
    }

    #[test]
    fn none_identifier_detected() {
        let v = Value::Scalar(Scalar::Identifier("none".into()));
        assert!(v.is_none_identifier());
        let v = Value::Scalar(Scalar::Identifier("yes".into()));
        assert!(!v.is_none_identifier());
    }
}
