//! The replay verifier: given only a step directory (and, optionally,
//! its chain parent and a public key), recomputes every hash a bundle
//! claims and reports the first point of divergence.
//!
//! Structurally grounded on a reference verify-bundle script's leaf map
//! and failure-code vocabulary; its Merkle scheme is not reused here —
//! this module hashes through `codec::canon`, the same scheme the
//! orchestrator writes with, not raw byte concatenation.

use crate::bundle::{Bundle, LEAF_ORDER};
use crate::codec::{hash, CanonValue};
use crate::compat::BTreeMap;
use crate::merkle::{chain_hash, merkle_root};
use crate::KernelError;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplayReasonCode {
    MissingBundleJson,
    BundleMissingMerkleRoot,
    BundleMissingLeaves,
    UnknownLeafName,
    MissingLeafFile,
    LeafHashMismatch,
    MerkleRootMismatch,
    RootHashTxtMismatch,
    BundleMissingChainRoot,
    ChainRootMismatch,
    ChainParentMissing,
    ChainLinkMismatch,
    MissingSignature,
}

impl std::fmt::Display for ReplayReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Maps a declared leaf name to the witness file the orchestrator wrote
/// it under. Kept in one place so a renamed leaf file only needs a
/// single edit.
fn leaf_file_name(leaf: &str) -> Option<&'static str> {
    match leaf {
        "percept" => Some("w_percept.json"),
        "model_contract" => Some("w_model_contract.json"),
        "value_table" => Some("w_value.json"),
        "risk_gate" => Some("w_risk.json"),
        "exec" => Some("w_exec.json"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub ok: bool,
    pub reason: Option<ReplayReasonCode>,
    pub leaf_name: Option<String>,
    pub step_dir: String,
    pub merkle_root: Option<String>,
    pub leaf_hashes: Option<BTreeMap<String, String>>,
}

impl ReplayReport {
    fn fail(step_dir: &Path, reason: ReplayReasonCode, leaf_name: Option<&str>) -> Self {
        ReplayReport {
            ok: false,
            reason: Some(reason),
            leaf_name: leaf_name.map(String::from),
            step_dir: step_dir.display().to_string(),
            merkle_root: None,
            leaf_hashes: None,
        }
    }
}

/// What chain/signature checking this replay pass should perform.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions<'a> {
    /// The directory of the immediately prior step, if this stream is
    /// chained and a parent is expected to exist.
    pub parent_step_dir: Option<&'a Path>,
    /// ed25519 public key bytes to verify `root.sig` against, if this
    /// stream signs its roots.
    pub verify_key_bytes: Option<&'a [u8; 32]>,
}

/// Replays one step directory: recomputes every leaf hash, the Merkle
/// root, the chain link, and (if requested) the signature, returning
/// the first divergence found.
pub fn verify_step_dir(step_dir: &Path, opts: &ReplayOptions) -> Result<ReplayReport, KernelError> {
    let bundle_path = step_dir.join("bundle.json");
    let bundle_bytes = match fs::read(&bundle_path) {
        Ok(b) => b,
        Err(_) => return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::MissingBundleJson, None)),
    };
    let bundle: Bundle = match serde_json::from_slice(&bundle_bytes) {
        Ok(b) => b,
        Err(_) => return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::MissingBundleJson, None)),
    };

    if bundle.merkle_root.is_empty() {
        return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::BundleMissingMerkleRoot, None));
    }
    if bundle.leaves.is_empty() {
        return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::BundleMissingLeaves, None));
    }

    let mut leaf_hashes = BTreeMap::new();
    let mut ordered_hashes = Vec::with_capacity(bundle.leaves.len());
    for leaf in &bundle.leaves {
        let Some(file_name) = leaf_file_name(&leaf.name) else {
            return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::UnknownLeafName, Some(&leaf.name)));
        };
        let witness_path = step_dir.join(file_name);
        let witness_bytes = match fs::read(&witness_path) {
            Ok(b) => b,
            Err(_) => return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::MissingLeafFile, Some(&leaf.name))),
        };
        let witness_json: serde_json::Value = match serde_json::from_slice(&witness_bytes) {
            Ok(v) => v,
            Err(_) => return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::LeafHashMismatch, Some(&leaf.name))),
        };
        let canon = CanonValue::from_json(&witness_json);
        let recomputed = hash(&canon)?;
        if recomputed != leaf.hash {
            return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::LeafHashMismatch, Some(&leaf.name)));
        }
        leaf_hashes.insert(leaf.name.clone(), recomputed.clone());
        ordered_hashes.push(recomputed);
    }

    // Leaves must cover exactly the fixed order, in that order.
    let declared_order: Vec<&str> = bundle.leaves.iter().map(|l| l.name.as_str()).collect();
    if declared_order != LEAF_ORDER.to_vec() {
        return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::BundleMissingLeaves, None));
    }

    let recomputed_root = merkle_root(&ordered_hashes)?;
    if recomputed_root != bundle.merkle_root {
        return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::MerkleRootMismatch, None));
    }

    let root_hash_txt_path = step_dir.join("root_hash.txt");
    if let Ok(contents) = fs::read_to_string(&root_hash_txt_path) {
        if contents.trim() != bundle.merkle_root {
            return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::RootHashTxtMismatch, None));
        }
    }

    if let Some(parent_dir) = opts.parent_step_dir {
        if bundle.chain_root.is_empty() {
            return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::BundleMissingChainRoot, None));
        }
        let recomputed_chain = chain_hash(&bundle.prev_chain_root, &bundle.merkle_root)?;
        if recomputed_chain != bundle.chain_root {
            return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::ChainRootMismatch, None));
        }
        let parent_bundle_path = parent_dir.join("bundle.json");
        let parent_bytes = match fs::read(&parent_bundle_path) {
            Ok(b) => b,
            Err(_) => return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::ChainParentMissing, None)),
        };
        let parent_bundle: Bundle = serde_json::from_slice(&parent_bytes)?;
        if parent_bundle.chain_root != bundle.prev_chain_root {
            return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::ChainLinkMismatch, None));
        }
    }

    if let Some(pubkey_bytes) = opts.verify_key_bytes {
        let sig_path = step_dir.join("root.sig");
        let sig_bytes = match fs::read(&sig_path) {
            Ok(b) => b,
            Err(_) => return Ok(ReplayReport::fail(step_dir, ReplayReasonCode::MissingSignature, None)),
        };
        crate::signer::verify_merkle_root_sig(pubkey_bytes, &bundle.merkle_root, &sig_bytes)
            .map_err(|e| KernelError::Signature(e.to_string()))?;
    }

    Ok(ReplayReport {
        ok: true,
        reason: None,
        leaf_name: None,
        step_dir: step_dir.display().to_string(),
        merkle_root: Some(bundle.merkle_root),
        leaf_hashes: Some(leaf_hashes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{LeafRef, ValueChildRef};
    use crate::codec::hash_value;
    use serde_json::json;
    use std::fs;

    fn write(path: &Path, v: &serde_json::Value) {
        fs::write(path, serde_json::to_vec(v).unwrap()).unwrap();
    }

    #[test]
    fn missing_bundle_json_is_reported() {
        let dir = std::env::temp_dir().join(format!("witness-kernel-replay-missing-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let report = verify_step_dir(&dir, &ReplayOptions::default()).unwrap();
        assert!(!report.ok);
        assert_eq!(report.reason, Some(ReplayReasonCode::MissingBundleJson));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn tampered_leaf_file_is_detected() {
        let dir = std::env::temp_dir().join(format!("witness-kernel-replay-tamper-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let w_percept = json!({"verdict": "PASS", "x": 1});
        let w_model = json!({"verdict": "PASS", "x": 2});
        let w_value = json!({"verdict": "PASS", "x": 3});
        let w_risk = json!({"verdict": "PASS", "x": 4});
        let w_exec = json!({"verdict": "PASS", "x": 5});

        write(&dir.join("w_percept.json"), &w_percept);
        write(&dir.join("w_model_contract.json"), &w_model);
        write(&dir.join("w_value.json"), &w_value);
        write(&dir.join("w_risk.json"), &w_risk);
        write(&dir.join("w_exec.json"), &w_exec);

        let leaves = vec![
            LeafRef { name: "percept".into(), hash: hash_value(&w_percept).unwrap() },
            LeafRef { name: "model_contract".into(), hash: hash_value(&w_model).unwrap() },
            LeafRef { name: "value_table".into(), hash: hash_value(&w_value).unwrap() },
            LeafRef { name: "risk_gate".into(), hash: hash_value(&w_risk).unwrap() },
            LeafRef { name: "exec".into(), hash: hash_value(&w_exec).unwrap() },
        ];
        let ordered: Vec<String> = leaves.iter().map(|l| l.hash.clone()).collect();
        let root = merkle_root(&ordered).unwrap();

        let bundle = Bundle {
            schema: "witness-kernel/1".into(),
            step_counter: 0,
            prev_state: "0,0".into(),
            perceived_state: "0,0".into(),
            selected_action: "ABSTAIN".into(),
            observed_next_state: "0,0".into(),
            prev_action: None,
            merkle_root: root,
            verdict: "PASS".into(),
            exec_verdict: "PASS".into(),
            leaves,
            leaf_verdicts: BTreeMap::new(),
            value_children: Vec::<ValueChildRef>::new(),
            prev_chain_root: "0".repeat(64),
            chain_root: "deadbeef".into(),
        };
        write(&dir.join("bundle.json"), &serde_json::to_value(&bundle).unwrap());

        // Sanity: passes before tampering (chain link not checked, no parent given).
        let ok_report = verify_step_dir(&dir, &ReplayOptions::default()).unwrap();
        assert!(ok_report.ok, "{ok_report:?}");

        // Now flip a byte in a leaf witness file.
        write(&dir.join("w_value.json"), &json!({"verdict": "FAIL", "x": 3}));
        let tampered_report = verify_step_dir(&dir, &ReplayOptions::default()).unwrap();
        assert!(!tampered_report.ok);
        assert_eq!(tampered_report.reason, Some(ReplayReasonCode::LeafHashMismatch));
        assert_eq!(tampered_report.leaf_name.as_deref(), Some("value_table"));

        let _ = fs::remove_dir_all(&dir);
    }
}
