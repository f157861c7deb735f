//! Γ_exec: certifies a skill's subaction trace — precondition, trace
//! length, subaction vocabulary, intermediate-state shape, forbidden
//! states, postcondition, and (optionally) that the observed next state
//! is plausible under the verified transition table.

use crate::codec::canon::hash_value;
use crate::compat::BTreeSet;
use crate::types::{ExecConfig, SkillSpec, TraceStep};
use crate::witness::{ExecChecks, ExecInputs, ExecModel, ExecWitness};

pub fn verify_exec_proposal(
    contract: &ExecConfig,
    skill: &SkillSpec,
    s_t: &str,
    skill_token: &str,
    trace: &[TraceStep],
    s_t1: &str,
    t_ver_int_mass: Option<&crate::compat::BTreeMap<String, i64>>,
) -> ExecWitness {
    let pre_ok = skill.pre_states.iter().any(|s| s == s_t) && skill_token == skill.name;
    let trace_len_ok = !trace.is_empty() && trace.len() <= skill.max_trace_len;

    let allowed: BTreeSet<&String> = skill.allowed_subactions.iter().collect();
    let forbid: BTreeSet<&String> = contract.forbid_states.iter().collect();

    let mut subactions_ok = true;
    let mut inter_ok = true;
    let mut forbid_ok = true;

    for step in trace {
        match &step.u {
            Some(u) if allowed.contains(u) => {}
            _ => subactions_ok = false,
        }
        match &step.s {
            Some(st) => {
                if forbid.contains(st) {
                    forbid_ok = false;
                }
            }
            None => inter_ok = false,
        }
    }

    // The witness's intermediate-state/forbid checks cover the trace;
    // the arrival state is checked here too so a skill cannot land on a
    // forbidden state on its very last transition and still certify.
    if forbid.contains(&s_t1.to_string()) {
        forbid_ok = false;
    }

    let post_ok = skill.post_states.iter().any(|s| s == s_t1);

    let (model_ok, p_t1) = if let Some(mass) = t_ver_int_mass {
        let total: i64 = mass.values().sum();
        if total <= 0 {
            (false, None)
        } else {
            let m_t1 = mass.get(s_t1).copied().unwrap_or(0);
            let p = m_t1 as f64 / total as f64;
            (p >= contract.pi_min, Some(p))
        }
    } else {
        (true, None)
    };

    let checks = ExecChecks {
        pre_ok,
        trace_len_ok,
        subactions_ok,
        inter_ok,
        forbid_ok,
        post_ok,
        model_ok,
    };
    let passed = checks.pre_ok
        && checks.trace_len_ok
        && checks.subactions_ok
        && checks.inter_ok
        && checks.forbid_ok
        && checks.post_ok
        && checks.model_ok;

    let trace_hashes: Vec<String> = trace
        .iter()
        .map(|s| hash_value(s).expect("trace step is always representable"))
        .collect();

    ExecWitness {
        schema: "contract.exec.v1",
        contract: contract.clone(),
        skill: skill.clone(),
        inputs: ExecInputs {
            s_t: s_t.to_string(),
            skill_token: skill_token.to_string(),
            s_t1: s_t1.to_string(),
            trace_len: trace.len(),
            trace_hashes,
        },
        model: ExecModel {
            used: t_ver_int_mass.is_some(),
            p_t1,
            t_ver_int_mass_hash: t_ver_int_mass.map(|m| hash_value(m).expect("mass table is representable")),
        },
        checks,
        verdict: crate::witness::verdict_str(passed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill() -> SkillSpec {
        SkillSpec {
            name: "STEP".to_string(),
            pre_states: vec!["1,1".to_string()],
            post_states: vec!["1,2".to_string()],
            allowed_subactions: vec!["NUDGE".to_string()],
            max_trace_len: 4,
        }
    }

    fn contract() -> ExecConfig {
        ExecConfig {
            s: 8,
            pi_min: 0.1,
            eps_model: 0.05,
            forbid_states: vec!["9,9".to_string()],
        }
    }

    #[test]
    fn pass_line() {
        let trace = vec![TraceStep {
            u: Some("NUDGE".to_string()),
            s: Some("1,2".to_string()),
        }];
        let w = verify_exec_proposal(&contract(), &skill(), "1,1", "STEP", &trace, "1,2", None);
        assert_eq!(w.verdict, "PASS");
    }

    #[test]
    fn forbidden_intermediate_state_fails() {
        let trace = vec![TraceStep {
            u: Some("NUDGE".to_string()),
            s: Some("9,9".to_string()),
        }];
        let w = verify_exec_proposal(&contract(), &skill(), "1,1", "STEP", &trace, "1,2", None);
        assert!(!w.checks.forbid_ok);
        assert_eq!(w.verdict, "FAIL");
    }

    #[test]
    fn forbidden_arrival_state_fails_even_with_clean_trace() {
        let trace = vec![TraceStep {
            u: Some("NUDGE".to_string()),
            s: Some("1,2".to_string()),
        }];
        let w = verify_exec_proposal(&contract(), &skill(), "1,1", "STEP", &trace, "9,9", None);
        assert!(!w.checks.forbid_ok);
    }

    #[test]
    fn unknown_subaction_fails() {
        let trace = vec![TraceStep {
            u: Some("TELEPORT".to_string()),
            s: Some("1,2".to_string()),
        }];
        let w = verify_exec_proposal(&contract(), &skill(), "1,1", "STEP", &trace, "1,2", None);
        assert!(!w.checks.subactions_ok);
    }
}
