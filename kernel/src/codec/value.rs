//! `CanonValue` — the closed value type the canonical codec serializes.
//!
//! Composite-key normalization is a property of construction, not a
//! runtime scan: a caller building a witness field from a
//! `(StateId, ActionId)`-keyed table constructs a `CanonValue::TupleKeyed`
//! directly instead of hoping the serializer notices the key shape.

use crate::compat::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum CanonValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<CanonValue>),
    Object(BTreeMap<String, CanonValue>),
    /// Normalizes at serialization time to
    /// `{"__tuplekey_dict__": [[k_joined, value], ...]}`, sorted by
    /// `k_joined`. `k_joined` is the caller-supplied composite key,
    /// already pipe-joined (e.g. `"s|a"` or `"s|a|s2"`).
    TupleKeyed(Vec<(String, CanonValue)>),
}

impl CanonValue {
    pub fn str(s: impl Into<String>) -> Self {
        CanonValue::Str(s.into())
    }

    pub fn int(i: i64) -> Self {
        CanonValue::Int(i)
    }

    pub fn array(items: Vec<CanonValue>) -> Self {
        CanonValue::Array(items)
    }

    pub fn strings(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        CanonValue::Array(items.into_iter().map(|s| CanonValue::Str(s.into())).collect())
    }

    /// Builds a `TupleKeyed` value from already pipe-joined composite
    /// keys (e.g. `"s|a"` or `"s|a|s2"`), sorting by the joined key as
    /// the codec requires.
    pub fn tuple_keyed(entries: Vec<(String, CanonValue)>) -> Self {
        let mut items = entries;
        items.sort_by(|a, b| a.0.cmp(&b.0));
        CanonValue::TupleKeyed(items)
    }

    /// Converts a `serde_json::Value` into a `CanonValue`. Integral
    /// numbers are kept as `Int`; anything with a fractional part, or a
    /// magnitude outside `i64`, becomes `Float`.
    pub fn from_json(v: &serde_json::Value) -> CanonValue {
        match v {
            serde_json::Value::Null => CanonValue::Null,
            serde_json::Value::Bool(b) => CanonValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CanonValue::Int(i)
                } else {
                    CanonValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => CanonValue::Str(s.clone()),
            serde_json::Value::Array(items) => {
                CanonValue::Array(items.iter().map(CanonValue::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map.iter() {
                    out.insert(k.clone(), CanonValue::from_json(v));
                }
                CanonValue::Object(out)
            }
        }
    }
}

impl From<&str> for CanonValue {
    fn from(s: &str) -> Self {
        CanonValue::Str(s.to_string())
    }
}

impl From<String> for CanonValue {
    fn from(s: String) -> Self {
        CanonValue::Str(s)
    }
}

impl From<i64> for CanonValue {
    fn from(i: i64) -> Self {
        CanonValue::Int(i)
    }
}

impl From<bool> for CanonValue {
    fn from(b: bool) -> Self {
        CanonValue::Bool(b)
    }
}
