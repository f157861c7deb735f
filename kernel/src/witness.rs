//! Typed witness records, one per contract stage. Each mirrors the key
//! names of the dict it certifies exactly — a witness's hash is the
//! hash of its emitted JSON shape, never of the Rust struct layout, so
//! these are `Serialize`-only: nothing ever needs to parse one back in.

use crate::compat::BTreeMap;
use crate::types::{ExecConfig, ModelConfig, PerceptConfig, RiskConfig, SkillSpec, ValueConfig};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PerceptView {
    pub view_id: u32,
    pub decoded_state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerceptInputs {
    pub observation_hash: String,
    pub proposed_state: String,
    pub prev_state: Option<String>,
    pub prev_action: Option<String>,
    pub state_vocab_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerceptDerived {
    pub agree_count: u32,
    pub n_views: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerceptChecks {
    pub multiview_ok: bool,
    pub format_ok: bool,
    pub temporal_ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerceptWitness {
    pub schema: &'static str,
    pub contract: PerceptConfig,
    pub inputs: PerceptInputs,
    pub views: Vec<PerceptView>,
    pub derived: PerceptDerived,
    pub checks: PerceptChecks,
    pub verdict: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInputs {
    pub proposal_pairs: Vec<(String, f64)>,
    pub ref_pairs: Vec<(String, f64)>,
    pub ver_pairs: Option<Vec<(String, f64)>>,
    pub forbidden_next_states: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetrics {
    pub support_size: usize,
    pub l1_to_ref: f64,
    pub forbidden_prob: f64,
    pub l1_to_verified: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelChecks {
    pub support_ok: bool,
    pub pi_min_ok: bool,
    pub l1_ref_ok: bool,
    pub forbid_ok: bool,
    pub l1_ver_ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelWitness {
    pub schema: &'static str,
    pub contract: ModelConfig,
    pub inputs: ModelInputs,
    pub candidate_int_mass: BTreeMap<String, i64>,
    pub ref_int_mass: BTreeMap<String, i64>,
    pub metrics: ModelMetrics,
    pub checks: ModelChecks,
    pub verdict: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueInputs {
    pub s: String,
    pub a: String,
    pub proposed_q: f64,
    pub proposed_r: f64,
    pub rollout_seed: u32,
    pub t_ver_hash: String,
    pub reward_table_hash: String,
    pub violation_states: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueMc {
    pub q_mc_int: i64,
    pub r_mc_int: i64,
    pub q_mc: f64,
    pub r_mc: f64,
    pub traj_hashes_digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueDiffs {
    pub q_hat_int: i64,
    pub r_hat_int: i64,
    pub dq_int: i64,
    pub dr_int: i64,
    pub dq: f64,
    pub dr: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueChecks {
    pub q_ok: bool,
    pub r_ok: bool,
}

/// The verdict for one `(state, action)` child — the unit every
/// rollout-based Monte Carlo check is actually performed on.
#[derive(Debug, Clone, Serialize)]
pub struct ValueWitness {
    pub schema: &'static str,
    pub contract: ValueConfig,
    pub inputs: ValueInputs,
    pub mc: ValueMc,
    pub diffs: ValueDiffs,
    pub checks: ValueChecks,
    pub verdict: &'static str,
}

/// The parent record binding every action's `ValueWitness` together for
/// a step, so a reader can see the whole `Q(s,·)`/`R(s,·)` table the
/// risk gate chose from without re-deriving it.
#[derive(Debug, Clone, Serialize)]
pub struct ValueTableWitness {
    pub schema: &'static str,
    pub s: String,
    pub children: BTreeMap<String, ValueWitness>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskInputs {
    pub q_int: BTreeMap<String, i64>,
    pub r_int: BTreeMap<String, i64>,
    pub proposed_action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskDerived {
    pub safe_actions: Vec<String>,
    pub selected_action: String,
    pub selected_risk: Option<f64>,
    pub regret: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskChecks {
    pub action_set_ok: bool,
    pub safe_nonempty: bool,
    pub risk_ok: bool,
    pub regret_ok: bool,
    pub proposal_ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskWitness {
    pub schema: &'static str,
    pub contract: RiskConfig,
    pub inputs: RiskInputs,
    pub derived: RiskDerived,
    pub checks: RiskChecks,
    pub verdict: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecInputs {
    pub s_t: String,
    pub skill_token: String,
    pub s_t1: String,
    pub trace_len: usize,
    pub trace_hashes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecModel {
    pub used: bool,
    pub p_t1: Option<f64>,
    pub t_ver_int_mass_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecChecks {
    pub pre_ok: bool,
    pub trace_len_ok: bool,
    pub subactions_ok: bool,
    pub inter_ok: bool,
    pub forbid_ok: bool,
    pub post_ok: bool,
    pub model_ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecWitness {
    pub schema: &'static str,
    pub contract: ExecConfig,
    pub skill: SkillSpec,
    pub inputs: ExecInputs,
    pub model: ExecModel,
    pub checks: ExecChecks,
    pub verdict: &'static str,
}

/// `true` iff every named check in the witness passed — the single
/// place "is this a PASS" is computed from, so a caller never has to
/// re-AND a checks struct by hand.
pub fn verdict_str(all_ok: bool) -> &'static str {
    if all_ok {
        "PASS"
    } else {
        "FAIL"
    }
}
