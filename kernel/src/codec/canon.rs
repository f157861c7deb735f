//! `canon(x) -> bytes`: the byte-exact serialization every hash in this
//! crate is computed over. Independent of insertion order, language, or
//! map-key type.
//!
//! Rules: UTF-8, object keys sorted lexicographically, no whitespace, no
//! `NaN`/`±Inf`, non-ascii left literal (not `\u`-escaped). Composite-key
//! maps are carried as `CanonValue::TupleKeyed` and normalize here to
//! `{"__tuplekey_dict__": [[k_joined, value], ...]}`.

use super::sha256::{sha256, to_hex};
use super::value::CanonValue;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonError {
    #[error("non-finite float cannot be canonicalized")]
    NonFiniteFloat,
}

/// Serializes a `CanonValue` to its canonical byte form.
pub fn canon_bytes(v: &CanonValue) -> Result<Vec<u8>, CanonError> {
    let mut out = String::new();
    write_value(v, &mut out)?;
    Ok(out.into_bytes())
}

/// `hash(x) = SHA-256(canon(x))`, hex lowercase.
pub fn hash(v: &CanonValue) -> Result<String, CanonError> {
    Ok(to_hex(&sha256(&canon_bytes(v)?)))
}

/// Hashes anything `Serialize`, routing it through `CanonValue` first so
/// the hash input is always the canonical form, never Rust's field
/// layout or `serde_json`'s insertion-ordered writer.
pub fn hash_value<T: Serialize>(v: &T) -> Result<String, CanonError> {
    let json = serde_json::to_value(v).expect("witness types are always serializable");
    hash(&CanonValue::from_json(&json))
}

/// `merkle_pair(h1, h2) = hash([h1, h2])` — SHA-256 of the canonical
/// JSON array of the two hex strings, not a raw concatenation of the
/// two digests. Reuses the same `canon`/`hash` primitives as every
/// other hash in this crate.
pub fn merkle_pair(h1: &str, h2: &str) -> Result<String, CanonError> {
    hash(&CanonValue::Array(vec![
        CanonValue::str(h1),
        CanonValue::str(h2),
    ]))
}

fn write_value(v: &CanonValue, out: &mut String) -> Result<(), CanonError> {
    match v {
        CanonValue::Null => out.push_str("null"),
        CanonValue::Bool(true) => out.push_str("true"),
        CanonValue::Bool(false) => out.push_str("false"),
        CanonValue::Int(i) => out.push_str(&i.to_string()),
        CanonValue::Float(f) => {
            if !f.is_finite() {
                return Err(CanonError::NonFiniteFloat);
            }
            out.push_str(&format!("{:?}", f));
        }
        CanonValue::Str(s) => write_json_string(s, out),
        CanonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        CanonValue::Object(map) => {
            out.push('{');
            for (i, (k, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(k, out);
                out.push(':');
                write_value(val, out)?;
            }
            out.push('}');
        }
        CanonValue::TupleKeyed(items) => {
            out.push_str("{\"__tuplekey_dict__\":[");
            for (i, (k, val)) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('[');
                write_json_string(k, out);
                out.push(',');
                write_value(val, out)?;
                out.push(']');
            }
            out.push_str("]}");
        }
    }
    Ok(())
}

/// Mirrors Python's `json.dumps(..., ensure_ascii=False)`: only the
/// quote, backslash, and C0 control characters are escaped; everything
/// else (including non-ASCII) is written literally.
fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
