//! The integrity anomaly detector: compares adjacent step directories'
//! file-hash trees against a declared change contract, flagging any
//! file that changed without being expected to, any expected change
//! that silently didn't happen, and any file that appeared or vanished.
//!
//! Unlike every other hash in this crate, `hash_tree` hashes raw file
//! bytes, not their canonical-JSON form — it is auditing the bytes on
//! disk, not re-deriving a witness.

use crate::codec::hash_value;
use crate::codec::sha256::{sha256, to_hex};
use crate::compat::{BTreeMap, BTreeSet};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// The declared per-step change contract. `value_change` is computed
/// from the live action set rather than hardcoded to any particular
/// demo's action names, so the detector works for an arbitrary action
/// vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub always_change: BTreeSet<String>,
    pub value_change: BTreeSet<String>,
    pub percept_change_steps: BTreeSet<u64>,
    pub exec_change_steps: BTreeSet<u64>,
    pub risk_period: u64,
    pub risk_pulse_mods: BTreeSet<u64>,
    pub risk_min_step: u64,
}

impl Contract {
    /// Builds the always/value-change sets from the stream's actual
    /// action vocabulary: `w_value.json` plus one `w_value_<action>.json`
    /// per action, using the same filename-sanitizing rule the
    /// orchestrator writes them with.
    pub fn for_actions(actions: &[String]) -> Self {
        let mut value_change: BTreeSet<String> = BTreeSet::new();
        value_change.insert("w_value.json".to_string());
        for a in actions {
            let sanitized = a.replace('/', "_").replace(' ', "_");
            value_change.insert(format!("w_value_{sanitized}.json"));
        }
        Contract {
            always_change: ["bundle.json", "chain_root.txt", "root_hash.txt"]
                .into_iter()
                .map(String::from)
                .collect(),
            value_change,
            percept_change_steps: BTreeSet::new(),
            exec_change_steps: BTreeSet::new(),
            risk_period: 0,
            risk_pulse_mods: BTreeSet::new(),
            risk_min_step: u64::MAX,
        }
    }

    pub fn expected_changed_files(&self, step: u64) -> BTreeSet<String> {
        let mut exp = self.always_change.clone();
        exp.extend(self.value_change.iter().cloned());
        if self.percept_change_steps.contains(&step) {
            exp.insert("w_percept.json".to_string());
        }
        if self.exec_change_steps.contains(&step) {
            exp.insert("w_exec.json".to_string());
        }
        if self.risk_period > 0 && step >= self.risk_min_step && self.risk_pulse_mods.contains(&(step % self.risk_period)) {
            exp.insert("w_risk.json".to_string());
        }
        exp
    }

    pub fn forbidden_changed_files(&self, step: u64) -> BTreeSet<String> {
        let mut forbid = BTreeSet::new();
        if !self.percept_change_steps.contains(&step) {
            forbid.insert("w_percept.json".to_string());
        }
        if !self.exec_change_steps.contains(&step) {
            forbid.insert("w_exec.json".to_string());
        }
        let risk_pulse = self.risk_period > 0
            && step >= self.risk_min_step
            && self.risk_pulse_mods.contains(&(step % self.risk_period));
        if !risk_pulse {
            forbid.insert("w_risk.json".to_string());
        }
        forbid
    }
}

/// SHA-256 of every regular file under `step_dir`, keyed by its path
/// relative to `step_dir` with forward slashes.
pub fn hash_tree(step_dir: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    hash_tree_into(step_dir, step_dir, &mut out)?;
    Ok(out)
}

fn hash_tree_into(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) -> io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            hash_tree_into(root, &path, out)?;
        } else if path.is_file() {
            let bytes = fs::read(&path)?;
            let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            out.insert(rel, to_hex(&sha256(&bytes)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDiff {
    pub step: u64,
    pub prev_step: u64,
    pub changed_files: Vec<String>,
    pub unchanged_files: Vec<String>,
    pub added_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub expected_change_missing: Vec<String>,
    pub unexpected_changed: Vec<String>,
    pub forbidden_changed: Vec<String>,
}

impl StepDiff {
    pub fn is_anomaly(&self) -> bool {
        !self.expected_change_missing.is_empty()
            || !self.unexpected_changed.is_empty()
            || !self.forbidden_changed.is_empty()
            || !self.added_files.is_empty()
            || !self.removed_files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub num_steps_scanned: usize,
    pub first_step: u64,
    pub last_step: u64,
    pub anomalies_found: usize,
    pub diffs_with_anomalies: Vec<StepDiff>,
    /// `canon`-hash of the change contract this scan was run against, so
    /// a reader of the report can confirm which contract produced it.
    pub contract_hash: String,
}

fn compute_diff(
    prev: &BTreeMap<String, String>,
    cur: &BTreeMap<String, String>,
) -> (BTreeSet<String>, BTreeSet<String>, BTreeSet<String>, BTreeSet<String>) {
    let prev_keys: BTreeSet<String> = prev.keys().cloned().collect();
    let cur_keys: BTreeSet<String> = cur.keys().cloned().collect();

    let added: BTreeSet<String> = cur_keys.difference(&prev_keys).cloned().collect();
    let removed: BTreeSet<String> = prev_keys.difference(&cur_keys).cloned().collect();
    let common: BTreeSet<String> = prev_keys.intersection(&cur_keys).cloned().collect();

    let changed: BTreeSet<String> = common.iter().filter(|k| prev[*k] != cur[*k]).cloned().collect();
    let unchanged: BTreeSet<String> = common.difference(&changed).cloned().collect();

    (changed, unchanged, added, removed)
}

/// Scans a sorted list of `(step_counter, step_dir)` pairs and reports
/// every step whose file-hash diff against its predecessor violates
/// `contract`.
pub fn scan(step_dirs: &[(u64, &Path)], contract: &Contract) -> io::Result<Report> {
    assert!(step_dirs.len() >= 2, "need at least 2 steps to diff");

    let contract_hash = hash_value(contract).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let mut diffs = Vec::new();
    let (mut prev_step, prev_dir) = step_dirs[0];
    let mut prev_hashes = hash_tree(prev_dir)?;

    for &(step, dir) in &step_dirs[1..] {
        let cur_hashes = hash_tree(dir)?;
        let (changed, unchanged, added, removed) = compute_diff(&prev_hashes, &cur_hashes);

        let expected = contract.expected_changed_files(step);
        let forbidden = contract.forbidden_changed_files(step);

        let expected_missing: Vec<String> = expected
            .iter()
            .filter(|f| prev_hashes.contains_key(*f) && cur_hashes.contains_key(*f) && !changed.contains(*f))
            .cloned()
            .collect();
        let unexpected_changed: Vec<String> = changed.iter().filter(|f| !expected.contains(*f)).cloned().collect();
        let forbidden_changed: Vec<String> = changed.iter().filter(|f| forbidden.contains(*f)).cloned().collect();

        let diff = StepDiff {
            step,
            prev_step,
            changed_files: changed.into_iter().collect(),
            unchanged_files: unchanged.into_iter().collect(),
            added_files: added.into_iter().collect(),
            removed_files: removed.into_iter().collect(),
            expected_change_missing: expected_missing,
            unexpected_changed,
            forbidden_changed,
        };
        if diff.is_anomaly() {
            diffs.push(diff);
        }

        prev_step = step;
        prev_hashes = cur_hashes;
    }

    Ok(Report {
        num_steps_scanned: step_dirs.len(),
        first_step: step_dirs[0].0,
        last_step: step_dirs[step_dirs.len() - 1].0,
        anomalies_found: diffs.len(),
        diffs_with_anomalies: diffs,
        contract_hash,
    })
}
