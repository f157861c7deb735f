//! Γ_percept: re-derives a proposed state from a raw observation through
//! `n_views` independent decoders and certifies it against multiview
//! agreement, state-token format, and the verified transition table's
//! notion of what states are temporally reachable.

use crate::codec::{canon, CanonValue};
use crate::types::{PerceptConfig, TVer};
use crate::witness::{PerceptChecks, PerceptDerived, PerceptInputs, PerceptView, PerceptWitness};
use regex::Regex;
use std::sync::OnceLock;

fn pos_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"pos=(\d+,\d+)").unwrap())
}

/// `true` iff `s` is a well-formed `"<row>,<col>"` state token.
pub fn is_state_token(s: &str) -> bool {
    let parts: Vec<&str> = s.split(',').collect();
    parts.len() == 2 && parts.iter().all(|p| p.parse::<i64>().is_ok())
}

/// Decodes one of `n_views` independent views of an observation into a
/// state token. A view that can extract a `pos=<r>,<c>` token from the
/// observation's `raw` field, and that token is in-vocabulary, trusts
/// it directly; every other view (and every observation shape that
/// doesn't carry a usable `raw` field) falls back to hashing
/// `[observation, view_id]` and indexing into the vocabulary — giving
/// each view a distinct, reproducible, but not-necessarily-correct
/// guess.
pub fn view_encoder(observation: &serde_json::Value, view_id: u32, state_vocab: &[String]) -> String {
    if let Some(raw) = observation.get("raw").and_then(|v| v.as_str()) {
        if let Some(caps) = pos_pattern().captures(raw) {
            let tok = caps.get(1).unwrap().as_str();
            if state_vocab.iter().any(|s| s == tok) {
                return tok.to_string();
            }
        }
    }
    let keyed = CanonValue::array(vec![
        CanonValue::from_json(observation),
        CanonValue::int(view_id as i64),
    ]);
    let bytes = canon::canon_bytes(&keyed).expect("observation must be finite JSON");
    let digest = crate::codec::sha256(&bytes);
    let idx = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
        % state_vocab.len().max(1);
    state_vocab[idx].clone()
}

#[allow(clippy::too_many_arguments)]
pub fn verify_percept_proposal(
    contract: &PerceptConfig,
    observation: &serde_json::Value,
    proposed_state: &str,
    prev_state: Option<&str>,
    prev_action: Option<&str>,
    t_ver: &TVer,
    state_vocab: &[String],
) -> PerceptWitness {
    let obs_hash = canon::hash(&CanonValue::from_json(observation)).expect("finite observation");

    let mut views = Vec::with_capacity(contract.n_views as usize);
    let mut votes = Vec::with_capacity(contract.n_views as usize);
    for i in 0..contract.n_views {
        let decoded = view_encoder(observation, i, state_vocab);
        votes.push(decoded.clone());
        views.push(PerceptView {
            view_id: i,
            decoded_state: decoded,
        });
    }

    let agree_count = votes.iter().filter(|v| v.as_str() == proposed_state).count() as u32;
    let multiview_ok = agree_count >= contract.agree_k;

    let format_ok = !contract.require_state_format || is_state_token(proposed_state);

    let temporal_ok = if contract.require_temporal && prev_state.is_some() {
        let prev_state = prev_state.unwrap();
        match prev_action {
            None => proposed_state == prev_state,
            Some(a) => match t_ver.get(&crate::types::tver_key(prev_state, a)) {
                None => proposed_state == prev_state,
                Some(row) => {
                    row.get(proposed_state).copied().unwrap_or(0) > 0 || proposed_state == prev_state
                }
            },
        }
    } else {
        true
    };

    let checks = PerceptChecks {
        multiview_ok,
        format_ok,
        temporal_ok,
    };
    let verdict = crate::witness::verdict_str(checks.multiview_ok && checks.format_ok && checks.temporal_ok);

    PerceptWitness {
        schema: "contract.percept.v1",
        contract: contract.clone(),
        inputs: PerceptInputs {
            observation_hash: obs_hash,
            proposed_state: proposed_state.to_string(),
            prev_state: prev_state.map(String::from),
            prev_action: prev_action.map(String::from),
            state_vocab_size: state_vocab.len(),
        },
        views,
        derived: PerceptDerived {
            agree_count,
            n_views: contract.n_views,
        },
        checks,
        verdict,
    }
}
