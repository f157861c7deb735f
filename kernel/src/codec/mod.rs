//! Canonical codec: deterministic serialization and SHA-256 of arbitrary
//! JSON-shaped values, including maps with composite keys.
//!
//! `canon(x)` is the single discipline every hash in this crate is built
//! on — witnesses, Merkle leaves, the chain link, and the signed message
//! all go through it. Nothing is hashed from a language-native struct
//! layout or from `serde_json`'s own (insertion-order-preserving) writer.
pub mod sha256;
pub mod value;
pub mod canon;

pub use sha256::{sha256, Digest};
pub use value::CanonValue;
pub use canon::{canon_bytes, hash, hash_value, merkle_pair, CanonError};
