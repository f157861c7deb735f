//! Merkle tree over a step's witness hashes, and the chain link that
//! binds successive steps together.
//!
//! Builds a balanced binary tree by duplicating the last element of any
//! odd-sized level, combining with `codec::canon::merkle_pair` at every
//! level. The same function serves the five-leaf per-step tree and the
//! integrity anomaly detector's arbitrary-length file-hash tree.

use crate::codec::canon::{hash, merkle_pair, CanonError};
use crate::codec::CanonValue;

/// The empty-leaf-set root, used only where a caller must hash a
/// declared-empty leaf set rather than treat it as an error.
pub fn empty_root() -> Result<String, CanonError> {
    hash(&CanonValue::strings(["EMPTY"]))
}

/// Computes the Merkle root over a nonempty ordered list of leaf hex
/// digests. Returns `CanonError` only if the underlying canon hash
/// fails, which cannot happen for well-formed hex strings.
pub fn merkle_root(leaves: &[String]) -> Result<String, CanonError> {
    if leaves.is_empty() {
        return empty_root();
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level.last().unwrap().clone();
            level.push(last);
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            next.push(merkle_pair(&pair[0], &pair[1])?);
        }
        level = next;
    }
    Ok(level.into_iter().next().unwrap())
}

/// Genesis chain root: 64 ASCII zeroes. The only value a stream's first
/// `prev_chain_root` may legally be.
pub fn genesis_root() -> String {
    "0".repeat(64)
}

/// `chain_root = sha256(canon([prev_chain_root, step_merkle_root]))`.
pub fn chain_hash(prev_chain_root: &str, step_merkle_root: &str) -> Result<String, CanonError> {
    hash(&CanonValue::array(vec![
        CanonValue::str(prev_chain_root),
        CanonValue::str(step_merkle_root),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_root_is_64_zeroes() {
        let g = genesis_root();
        assert_eq!(g.len(), 64);
        assert!(g.chars().all(|c| c == '0'));
    }

    #[test]
    fn single_leaf_root_is_the_leaf_itself() {
        let leaves = vec!["abc".repeat(21) + "a"];
        assert_eq!(merkle_root(&leaves).unwrap(), leaves[0]);
    }

    #[test]
    fn five_leaves_builds_three_levels() {
        let leaves: Vec<String> = (0..5).map(|i| format!("leaf{i}")).collect();
        // Sanity: deterministic and stable across repeated calls.
        let r1 = merkle_root(&leaves).unwrap();
        let r2 = merkle_root(&leaves).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn odd_level_duplicates_last_not_first() {
        let a = merkle_root(&["x".to_string(), "y".to_string(), "z".to_string()]).unwrap();
        let b = merkle_root(&["x".to_string(), "y".to_string(), "z".to_string(), "z".to_string()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn chain_hash_is_order_sensitive() {
        let a = chain_hash("a".repeat(64).as_str(), "b".repeat(64).as_str()).unwrap();
        let b = chain_hash("b".repeat(64).as_str(), "a".repeat(64).as_str()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampering_a_leaf_changes_the_root() {
        let leaves = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let mut tampered = leaves.clone();
        tampered[1] = "B".to_string();
        assert_ne!(merkle_root(&leaves).unwrap(), merkle_root(&tampered).unwrap());
    }
}
