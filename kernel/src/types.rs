//! Shared data types threaded through every contract: the verified
//! transition table, reward table, skill specs, and the inbound red
//! packet a policy proposes each step.

use crate::compat::BTreeMap;
use serde::{Deserialize, Serialize};

/// A verified transition table: `(state, action) -> {next_state: mass}`,
/// mass already quantized to the contract's scale `S`. Stored with a
/// pipe-joined `"state|action"` key so it can iterate in a single
/// deterministic `BTreeMap` order and round-trip through `CanonValue`
/// unchanged.
pub type TVer = BTreeMap<String, BTreeMap<String, i64>>;

/// A reward table keyed by `"state|action|next_state"`, values as raw
/// floats as proposed — contracts quantize their own copy internally.
pub type RewardTable = BTreeMap<String, f64>;

pub fn tver_key(s: &str, a: &str) -> String {
    format!("{s}|{a}")
}

pub fn reward_key(s: &str, a: &str, s2: &str) -> String {
    format!("{s}|{a}|{s2}")
}

/// One step of an execution trace: a subaction token and the
/// intermediate state it produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceStep {
    pub u: Option<String>,
    pub s: Option<String>,
}

/// A named, reusable skill the exec contract can certify.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillSpec {
    pub name: String,
    pub pre_states: Vec<String>,
    pub post_states: Vec<String>,
    pub allowed_subactions: Vec<String>,
    pub max_trace_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerceptConfig {
    pub n_views: u32,
    pub agree_k: u32,
    pub require_temporal: bool,
    pub require_state_format: bool,
}

impl Default for PerceptConfig {
    fn default() -> Self {
        PerceptConfig {
            n_views: 3,
            agree_k: 2,
            require_temporal: true,
            require_state_format: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub s: u32,
    pub eps_t: f64,
    pub eps_update: f64,
    pub k_max: usize,
    pub pi_min: f64,
    pub eta_forbid: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueConfig {
    pub s: u32,
    pub gamma_fp: f64,
    pub horizon: u32,
    pub n_rollouts: u32,
    pub eps_q: f64,
    pub eps_r: f64,
    pub follow_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskConfig {
    pub s: u32,
    pub rho_max: f64,
    pub eps_regret: f64,
    pub abstain_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecConfig {
    pub s: u32,
    pub pi_min: f64,
    pub eps_model: f64,
    pub forbid_states: Vec<String>,
}

/// The full set of contract configurations for a stream, loaded once
/// and reused for every step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractSet {
    pub percept: PerceptConfig,
    pub model: ModelConfig,
    pub value: ValueConfig,
    pub risk: RiskConfig,
    pub exec: ExecConfig,
}

/// The externally proposed decision for one step — everything the
/// policy claims, to be independently re-derived and certified. Mirrors
/// a reference oracle runner's step record field-for-field; optional
/// fields fall back exactly the way that runner does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedPacket {
    pub step_counter: u64,
    /// The full action vocabulary for this step (before any abstain-only
    /// downgrade on a failed percept).
    pub actions: Vec<String>,
    /// Ground-truth state string; falls back to `prev_state` when absent.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub prev_state: Option<String>,
    #[serde(default)]
    pub prev_action: Option<String>,
    #[serde(default)]
    pub state_vocab: Option<Vec<String>>,
    /// Falls back to `{"raw": "pos=<state>"}` when absent.
    #[serde(default)]
    pub observation: Option<serde_json::Value>,
    /// Falls back to the first entry of `model_row_proposal`, then to
    /// `state`, when absent.
    #[serde(default)]
    pub proposed_state: Option<String>,
    pub model_row_proposal: Vec<(String, f64)>,
    pub model_row_ref: Vec<(String, f64)>,
    #[serde(default)]
    pub forbidden_next_states: Vec<String>,
    /// Keyed `"state|action|next_state"`.
    #[serde(default)]
    pub reward_table: BTreeMap<String, f64>,
    #[serde(default)]
    pub violation_states: Vec<String>,
    #[serde(default)]
    pub proposed_q: BTreeMap<String, f64>,
    #[serde(default)]
    pub proposed_r: BTreeMap<String, f64>,
    #[serde(default)]
    pub observed_next_state: Option<String>,
    #[serde(default)]
    pub observed_trace: Option<Vec<TraceStep>>,
}

/// Parses a `"state|action|next_state" -> reward` wire table into the
/// canonical keyed form the contracts expect (a no-op beyond validating
/// the key shape — reward tables are already stored pipe-joined).
pub fn parse_reward_table(encoded: &BTreeMap<String, f64>) -> Result<RewardTable, crate::KernelError> {
    for k in encoded.keys() {
        if k.split('|').count() != 3 {
            return Err(crate::KernelError::MalformedPacket(format!(
                "reward_table key `{k}` is not `state|action|next_state`"
            )));
        }
    }
    Ok(encoded.clone())
}
