//! Literal end-to-end scenarios, one per named case. Each stands alone
//! (own temp dir, own contract set) so a failing scenario doesn't
//! obscure another.

use std::collections::BTreeMap;
use witness_kernel::anomaly::{scan, Contract as AnomalyContract};
use witness_kernel::contracts::{risk_gate_select_action, verify_model_proposal};
use witness_kernel::merkle::genesis_root;
use witness_kernel::orchestrator::StepOrchestrator;
use witness_kernel::replay::{verify_step_dir, ReplayOptions, ReplayReasonCode};
use witness_kernel::types::{ContractSet, ExecConfig, ModelConfig, PerceptConfig, RedPacket, RiskConfig, SkillSpec, ValueConfig};

fn temp_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("witness-kernel-scenario-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn pass_line_contracts() -> ContractSet {
    ContractSet {
        percept: PerceptConfig { n_views: 3, agree_k: 2, require_temporal: true, require_state_format: true },
        model: ModelConfig { s: 10, eps_t: 0.05, eps_update: 0.05, k_max: 4, pi_min: 0.0, eta_forbid: 0.0 },
        value: ValueConfig { s: 10, gamma_fp: 1.0, horizon: 1, n_rollouts: 64, eps_q: 2.0, eps_r: 2.0, follow_action: "ABSTAIN".into() },
        risk: RiskConfig { s: 10, rho_max: 0.05, eps_regret: 0.0, abstain_action: "ABSTAIN".into() },
        exec: ExecConfig { s: 10, pi_min: 0.01, eps_model: 0.05, forbid_states: vec!["9,9".into()] },
    }
}

fn pass_line_skills() -> BTreeMap<String, SkillSpec> {
    let mut skills = BTreeMap::new();
    skills.insert(
        "MOVE_RIGHT".to_string(),
        SkillSpec {
            name: "MOVE_RIGHT".into(),
            pre_states: vec!["1,1".into()],
            post_states: vec!["1,2".into()],
            allowed_subactions: vec!["MOVE_RIGHT".into()],
            max_trace_len: 4,
        },
    );
    skills.insert(
        "ABSTAIN".to_string(),
        SkillSpec {
            name: "ABSTAIN".into(),
            pre_states: vec!["1,1".into(), "1,2".into(), "9,9".into()],
            post_states: vec!["1,1".into(), "1,2".into(), "9,9".into()],
            allowed_subactions: vec!["ABSTAIN".into()],
            max_trace_len: 4,
        },
    );
    skills
}

fn pass_line_packet() -> RedPacket {
    RedPacket {
        step_counter: 0,
        actions: vec!["MOVE_RIGHT".into(), "ABSTAIN".into()],
        state: Some("1,1".into()),
        prev_state: Some("1,1".into()),
        prev_action: None,
        state_vocab: None,
        observation: None,
        proposed_state: None,
        model_row_proposal: vec![("1,2".to_string(), 1.0)],
        model_row_ref: vec![("1,2".to_string(), 1.0)],
        forbidden_next_states: vec!["9,9".into()],
        reward_table: BTreeMap::from([("1,1|MOVE_RIGHT|1,2".to_string(), 1.0)]),
        violation_states: vec![],
        proposed_q: BTreeMap::new(),
        proposed_r: BTreeMap::new(),
        observed_next_state: Some("1,2".into()),
        observed_trace: None,
    }
}

/// S1 — Pass line: a clean proposal should certify end to end with a
/// Merkle root that matches `root_hash.txt` on disk.
#[test]
fn s1_pass_line() {
    let dir = temp_dir("s1");
    let mut orch = StepOrchestrator::new(pass_line_contracts(), pass_line_skills(), 42, vec!["1,1".into(), "1,2".into(), "9,9".into()]);
    let bundle = orch.run_step(&pass_line_packet(), &genesis_root(), &dir).unwrap();

    assert_eq!(bundle.selected_action, "MOVE_RIGHT");
    assert_eq!(bundle.observed_next_state, "1,2");
    for v in bundle.leaf_verdicts.values() {
        assert_eq!(v, "PASS");
    }
    let root_txt = std::fs::read_to_string(dir.join("root_hash.txt")).unwrap();
    assert_eq!(root_txt.trim(), bundle.merkle_root);

    let _ = std::fs::remove_dir_all(&dir);
}

/// S2 — Risk rejects a high-risk proposal in favor of the only safe
/// action.
#[test]
fn s2_risk_rejects_high_risk_proposal() {
    let contract = RiskConfig { s: 10, rho_max: 0.05, eps_regret: 0.0, abstain_action: "ABSTAIN".into() };
    let q: BTreeMap<String, f64> = [("A".to_string(), 1.0), ("B".to_string(), 0.9)].into();
    let r: BTreeMap<String, f64> = [("A".to_string(), 0.20), ("B".to_string(), 0.01)].into();
    let w = risk_gate_select_action(&contract, &q, &r, Some("A"));
    assert_eq!(w.verdict, "FAIL");
    assert_eq!(w.derived.selected_action, "B");
}

/// S3 — Every action exceeds the risk budget: the gate PASSes by
/// falling back to abstain rather than forcing a verdict FAIL.
#[test]
fn s3_all_actions_risky_falls_back_to_abstain() {
    let contract = RiskConfig { s: 10, rho_max: 0.05, eps_regret: 0.0, abstain_action: "ABSTAIN".into() };
    let q: BTreeMap<String, f64> = [("A".to_string(), 1.0), ("B".to_string(), 0.9)].into();
    let r: BTreeMap<String, f64> = [("A".to_string(), 0.20), ("B".to_string(), 0.30)].into();
    let w = risk_gate_select_action(&contract, &q, &r, None);
    assert_eq!(w.derived.selected_action, "ABSTAIN");
    assert_eq!(w.verdict, "PASS");
}

/// S4 — Model contract refuses a proposal that puts non-negligible mass
/// on a forbidden next state.
#[test]
fn s4_model_rejects_teleport_onto_forbidden_state() {
    let contract = ModelConfig { s: 10, eps_t: 1.0, eps_update: 1.0, k_max: 4, pi_min: 0.0, eta_forbid: 0.001 };
    let proposal = vec![("1,1".to_string(), 0.5), ("9,9".to_string(), 0.5)];
    let reference = proposal.clone();
    let w = verify_model_proposal(&contract, &proposal, &reference, None, &["9,9".to_string()]).unwrap();
    assert!(!w.checks.forbid_ok);
    assert_eq!(w.verdict, "FAIL");
}

/// S5 — Stealth-epsilon injection: a forbidden-state mass small enough
/// to clear the model contract's tolerance still gets caught by the
/// exec contract if a trace actually lands there. Documents the two
/// independent layers of forbidden-state enforcement.
#[test]
fn s5_stealth_mass_passes_model_but_exec_still_catches_the_landing() {
    use witness_kernel::contracts::verify_exec_proposal;
    use witness_kernel::types::TraceStep;

    let model_contract = ModelConfig { s: 20, eps_t: 1.0, eps_update: 1.0, k_max: 4, pi_min: 0.0, eta_forbid: 0.001 };
    let proposal = vec![("1,2".to_string(), 1.0 - 1e-12), ("9,9".to_string(), 1e-12)];
    let reference = vec![("1,2".to_string(), 1.0)];
    let model_witness = verify_model_proposal(&model_contract, &proposal, &reference, None, &["9,9".to_string()]).unwrap();
    assert_eq!(model_witness.verdict, "PASS", "stealth mass should clear eta_forbid");

    let exec_contract = ExecConfig { s: 20, pi_min: 0.0, eps_model: 0.05, forbid_states: vec!["9,9".to_string()] };
    let skill = SkillSpec {
        name: "STEP".into(),
        pre_states: vec!["1,1".into()],
        post_states: vec!["1,2".into(), "9,9".into()],
        allowed_subactions: vec!["NUDGE".into()],
        max_trace_len: 4,
    };
    let trace = vec![TraceStep { u: Some("NUDGE".into()), s: Some("9,9".into()) }];
    let exec_witness = verify_exec_proposal(&exec_contract, &skill, "1,1", "STEP", &trace, "9,9", None);
    assert!(!exec_witness.checks.forbid_ok);
    assert_eq!(exec_witness.verdict, "FAIL");
}

/// S6 — Tamper replay: flipping a leaf witness's recorded verdict after
/// the fact must be caught as a hash mismatch on that specific leaf.
#[test]
fn s6_tampering_a_leaf_file_fails_replay() {
    let dir = temp_dir("s6");
    let mut orch = StepOrchestrator::new(pass_line_contracts(), pass_line_skills(), 42, vec!["1,1".into(), "1,2".into(), "9,9".into()]);
    orch.run_step(&pass_line_packet(), &genesis_root(), &dir).unwrap();

    let ok_report = verify_step_dir(&dir, &ReplayOptions::default()).unwrap();
    assert!(ok_report.ok);

    let mut w_value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.join("w_value.json")).unwrap()).unwrap();
    w_value["schema"] = serde_json::Value::String("tampered".to_string());
    std::fs::write(dir.join("w_value.json"), serde_json::to_vec(&w_value).unwrap()).unwrap();

    let report = verify_step_dir(&dir, &ReplayOptions::default()).unwrap();
    assert!(!report.ok);
    assert_eq!(report.reason, Some(ReplayReasonCode::LeafHashMismatch));
    assert_eq!(report.leaf_name.as_deref(), Some("value_table"));

    let _ = std::fs::remove_dir_all(&dir);
}

/// S7 — A chained replay whose expected parent step directory is
/// missing reports `CHAIN_PARENT_MISSING`, not a silent pass.
#[test]
fn s7_chain_parent_missing_is_detected() {
    let dir = temp_dir("s7");
    let mut orch = StepOrchestrator::new(pass_line_contracts(), pass_line_skills(), 42, vec!["1,1".into(), "1,2".into(), "9,9".into()]);
    let step0_dir = dir.join("step_0000");
    orch.run_step(&pass_line_packet(), &genesis_root(), &step0_dir).unwrap();

    let nonexistent_parent = dir.join("step_missing");
    let opts = ReplayOptions { parent_step_dir: Some(&nonexistent_parent), verify_key_bytes: None };
    let report = verify_step_dir(&step0_dir, &opts).unwrap();
    assert!(!report.ok);
    assert_eq!(report.reason, Some(ReplayReasonCode::ChainParentMissing));

    let _ = std::fs::remove_dir_all(&dir);
}

/// S8 — The integrity anomaly detector flags a witness file that
/// changed outside its declared change window.
#[test]
fn s8_unexpected_witness_change_is_an_anomaly() {
    let dir = temp_dir("s8");
    let step0 = dir.join("step_0000");
    let step1 = dir.join("step_0001");
    std::fs::create_dir_all(&step0).unwrap();
    std::fs::create_dir_all(&step1).unwrap();
    for (name, v0, v1) in [
        ("bundle.json", "a", "b"),
        ("chain_root.txt", "a", "b"),
        ("root_hash.txt", "a", "b"),
        ("w_value.json", "a", "b"),
        ("w_exec.json", "same", "changed"),
    ] {
        std::fs::write(step0.join(name), v0).unwrap();
        std::fs::write(step1.join(name), v1).unwrap();
    }

    let contract = AnomalyContract::for_actions(&[] as &[String]);
    let report = scan(&[(0, step0.as_path()), (1, step1.as_path())], &contract).unwrap();

    assert_eq!(report.anomalies_found, 1);
    assert_eq!(report.diffs_with_anomalies[0].unexpected_changed, vec!["w_exec.json".to_string()]);

    let _ = std::fs::remove_dir_all(&dir);
}
