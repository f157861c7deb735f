//! The step orchestrator: runs one red packet through all five
//! contracts in dependency order, persists every witness and the
//! bundle, and links the step into the chain.
//!
//! Mirrors a reference oracle runner's per-step driver: Γ_percept gates
//! what state the rest of the step reasons about; a failed percept
//! downgrades the action set to abstain-only rather than aborting the
//! step. Γ_model's candidate mass is installed into the verified
//! transition table on PASS so later steps (and this step's own
//! Γ_value/Γ_exec) can use it. Every action gets its own Γ_value child;
//! Γ_risk picks from the re-derived `Q`/`R` table; Γ_exec certifies the
//! observed trace against the skill the risk gate selected.

use crate::codec::canon::hash_value;
use crate::compat::BTreeMap;
use crate::contracts::{
    risk_gate_select_action, verify_exec_proposal, verify_model_proposal, verify_percept_proposal,
    verify_value_proposal_single,
};
use crate::math::prng::{derive_seeds, mix32, sha32};
use crate::merkle;
use crate::types::{parse_reward_table, tver_key, ContractSet, RedPacket, SkillSpec, TVer, TraceStep};
use crate::witness::{ValueTableWitness, ValueWitness};
use crate::{bundle::{Bundle, LeafRef, ValueChildRef, LEAF_ORDER}, KernelError};
use std::path::Path;

/// Replaces characters that are awkward in a filename so an action
/// token can be embedded directly in `w_value_<action>.json`.
fn canon_action_file(a: &str) -> String {
    a.replace('/', "_").replace(' ', "_")
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), KernelError> {
    let body = serde_json::to_string_pretty(value).map_err(KernelError::from)?;
    std::fs::write(path, body).map_err(KernelError::from)
}

/// Everything the orchestrator needs that persists across steps: the
/// contract configuration, the skill library, the global PRNG seed,
/// the state vocabulary, and the verified transition table itself
/// (updated in place on a passing model proposal).
pub struct StepOrchestrator {
    pub contracts: ContractSet,
    pub skills: BTreeMap<String, SkillSpec>,
    pub global_seed: u32,
    pub state_vocab: Vec<String>,
    pub t_ver: TVer,
}

impl StepOrchestrator {
    pub fn new(
        contracts: ContractSet,
        skills: BTreeMap<String, SkillSpec>,
        global_seed: u32,
        state_vocab: Vec<String>,
    ) -> Self {
        StepOrchestrator {
            contracts,
            skills,
            global_seed,
            state_vocab,
            t_ver: BTreeMap::new(),
        }
    }

    /// Runs one step, writing every witness file and the bundle under
    /// `out_step_dir`, and returns the bundle. `prev_chain_root` must be
    /// `merkle::genesis_root()` for the stream's first step.
    pub fn run_step(
        &mut self,
        red_packet: &RedPacket,
        prev_chain_root: &str,
        out_step_dir: &Path,
    ) -> Result<Bundle, KernelError> {
        std::fs::create_dir_all(out_step_dir)?;

        let abstain_action = self.contracts.risk.abstain_action.clone();

        let prev_state = red_packet
            .prev_state
            .clone()
            .unwrap_or_else(|| red_packet.state.clone().unwrap_or_default());
        let prev_action = red_packet.prev_action.clone();
        let state_vocab = red_packet.state_vocab.clone().unwrap_or_else(|| self.state_vocab.clone());

        let step_counter = red_packet.step_counter;
        let actions_full = red_packet.actions.clone();
        let mut actions = actions_full.clone();
        let seeds = derive_seeds(self.global_seed, step_counter as u32);

        let s_raw = red_packet.state.clone().unwrap_or_else(|| prev_state.clone());
        let observation = red_packet
            .observation
            .clone()
            .unwrap_or_else(|| serde_json::json!({"raw": format!("pos={s_raw}")}));

        let proposed_state = red_packet.proposed_state.clone().unwrap_or_else(|| {
            red_packet
                .model_row_proposal
                .first()
                .map(|(s, _)| s.clone())
                .unwrap_or_else(|| s_raw.clone())
        });

        let mut percept_contract = self.contracts.percept.clone();
        percept_contract.require_temporal = percept_contract.require_temporal && prev_action.is_some();

        let w_percept = verify_percept_proposal(
            &percept_contract,
            &observation,
            &proposed_state,
            Some(prev_state.as_str()),
            prev_action.as_deref(),
            &self.t_ver,
            &state_vocab,
        );
        write_json(&out_step_dir.join("w_percept.json"), &w_percept)?;
        tracing::info!(step = step_counter, verdict = w_percept.verdict, "percept");

        let s_t = if w_percept.verdict == "PASS" {
            proposed_state.clone()
        } else {
            tracing::warn!(step = step_counter, "percept FAIL, forcing abstain-only actions");
            actions = vec![abstain_action.clone()];
            prev_state.clone()
        };

        let forbidden_next = red_packet.forbidden_next_states.clone();

        let model_action = actions_full
            .iter()
            .find(|a| **a != abstain_action)
            .cloned()
            .unwrap_or_else(|| abstain_action.clone());

        let w_model = verify_model_proposal(
            &self.contracts.model,
            &red_packet.model_row_proposal,
            &red_packet.model_row_ref,
            None,
            &forbidden_next,
        )?;
        write_json(&out_step_dir.join("w_model_contract.json"), &w_model)?;
        tracing::info!(step = step_counter, verdict = w_model.verdict, "model");

        if w_model.verdict == "PASS" && model_action != abstain_action {
            self.t_ver.insert(tver_key(&s_t, &model_action), w_model.candidate_int_mass.clone());
        }

        let reward_table = parse_reward_table(&red_packet.reward_table)?;
        let violation_states = red_packet.violation_states.clone();

        let mut verified_q: BTreeMap<String, f64> = BTreeMap::new();
        let mut verified_r: BTreeMap<String, f64> = BTreeMap::new();
        let mut children: BTreeMap<String, ValueWitness> = BTreeMap::new();
        let mut value_children_refs = Vec::new();
        let mut all_value_pass = true;

        let mut sorted_actions = actions.clone();
        sorted_actions.sort();
        sorted_actions.dedup();

        for a in &sorted_actions {
            let a_seed = mix32(seeds.value, sha32(a));
            let w_child = verify_value_proposal_single(
                &self.contracts.value,
                &s_t,
                a,
                red_packet.proposed_q.get(a).copied().unwrap_or(0.0),
                red_packet.proposed_r.get(a).copied().unwrap_or(0.0),
                &self.t_ver,
                &reward_table,
                &violation_states,
                a_seed,
            );
            let fname = format!("w_value_{}.json", canon_action_file(a));
            write_json(&out_step_dir.join(&fname), &w_child)?;
            if w_child.verdict != "PASS" {
                all_value_pass = false;
            }
            verified_q.insert(a.clone(), w_child.mc.q_mc);
            verified_r.insert(a.clone(), w_child.mc.r_mc);
            value_children_refs.push(ValueChildRef {
                file: fname,
                hash: hash_value(&w_child)?,
            });
            children.insert(a.clone(), w_child);
        }

        let w_value = ValueTableWitness {
            schema: "oracle.value_table.v1",
            s: s_t.clone(),
            children,
        };
        write_json(&out_step_dir.join("w_value.json"), &w_value)?;
        let value_verdict = if all_value_pass { "PASS" } else { "FAIL" };
        tracing::info!(step = step_counter, verdict = value_verdict, "value");

        let (q_in, r_in, proposed_action) = if w_percept.verdict != "PASS"
            || w_model.verdict != "PASS"
            || !all_value_pass
        {
            (
                BTreeMap::from([(abstain_action.clone(), 0.0)]),
                BTreeMap::from([(abstain_action.clone(), 0.0)]),
                None,
            )
        } else {
            // Scan ascending keys (BTreeMap iterates sorted) and keep the
            // first strictly-greater Q seen, so a tie resolves to the
            // lexicographically smallest action — matching a plain `max`
            // over a sorted key list.
            let mut best: Option<(&String, f64)> = None;
            for (a, q) in &verified_q {
                let take = match best {
                    None => true,
                    Some((_, best_q)) => *q > best_q,
                };
                if take {
                    best = Some((a, *q));
                }
            }
            (verified_q.clone(), verified_r.clone(), best.map(|(a, _)| a.clone()))
        };

        let w_risk = risk_gate_select_action(&self.contracts.risk, &q_in, &r_in, proposed_action.as_deref());
        write_json(&out_step_dir.join("w_risk.json"), &w_risk)?;
        tracing::info!(step = step_counter, verdict = w_risk.verdict, selected = w_risk.derived.selected_action.as_str(), "risk");

        let selected_action = w_risk.derived.selected_action.clone();
        let skill = self
            .skills
            .get(&selected_action)
            .ok_or_else(|| KernelError::UnknownSkill(selected_action.clone()))?
            .clone();

        let default_trans: BTreeMap<String, i64> =
            [(s_t.clone(), 1i64 << self.contracts.value.s)].into_iter().collect();
        let trans_dist = self
            .t_ver
            .get(&tver_key(&s_t, &selected_action))
            .cloned()
            .unwrap_or(default_trans);

        let observed_s_t1 = red_packet.observed_next_state.clone().unwrap_or_else(|| {
            trans_dist
                .iter()
                .max_by_key(|(_, mass)| **mass)
                .map(|(s, _)| s.clone())
                .unwrap_or_else(|| s_t.clone())
        });

        let observed_trace = red_packet.observed_trace.clone().unwrap_or_else(|| {
            vec![TraceStep {
                u: Some(selected_action.clone()),
                s: Some(observed_s_t1.clone()),
            }]
        });

        let w_exec = verify_exec_proposal(
            &self.contracts.exec,
            &skill,
            &s_t,
            &selected_action,
            &observed_trace,
            &observed_s_t1,
            Some(&trans_dist),
        );
        write_json(&out_step_dir.join("w_exec.json"), &w_exec)?;
        tracing::info!(step = step_counter, verdict = w_exec.verdict, "exec");

        let leaf_hashes = [
            hash_value(&w_percept)?,
            hash_value(&w_model)?,
            hash_value(&w_value)?,
            hash_value(&w_risk)?,
            hash_value(&w_exec)?,
        ];
        let leaves: Vec<LeafRef> = LEAF_ORDER
            .iter()
            .zip(leaf_hashes.iter())
            .map(|(name, hash)| LeafRef {
                name: name.to_string(),
                hash: hash.clone(),
            })
            .collect();
        let merkle_root = merkle::merkle_root(&leaf_hashes)?;
        let chain_root = merkle::chain_hash(prev_chain_root, &merkle_root)?;

        let leaf_verdict_values: [&str; 5] =
            [w_percept.verdict, w_model.verdict, value_verdict, w_risk.verdict, w_exec.verdict];
        let leaf_verdicts: BTreeMap<String, String> = LEAF_ORDER
            .iter()
            .zip(leaf_verdict_values)
            .map(|(name, v)| (name.to_string(), v.to_string()))
            .collect();

        let bundle = Bundle {
            schema: "oracle.bundle.v3".to_string(),
            step_counter,
            prev_state,
            perceived_state: s_t,
            selected_action,
            observed_next_state: observed_s_t1,
            prev_action,
            merkle_root,
            verdict: "PASS".to_string(),
            exec_verdict: w_exec.verdict.to_string(),
            leaves,
            leaf_verdicts,
            value_children: value_children_refs,
            prev_chain_root: prev_chain_root.to_string(),
            chain_root,
        };
        write_json(&out_step_dir.join("bundle.json"), &bundle)?;
        std::fs::write(out_step_dir.join("root_hash.txt"), format!("{}\n", bundle.merkle_root))?;
        std::fs::write(out_step_dir.join("chain_root.txt"), format!("{}\n", bundle.chain_root))?;
        tracing::info!(step = step_counter, merkle_root = bundle.merkle_root.as_str(), "bundle written");

        Ok(bundle)
    }
}
