//! Γ_risk: selects which action actually executes. Quantizes every
//! `Q`/`R` value, restricts to the actions whose risk is admissible,
//! and picks the best of those — honoring the proposed action only when
//! it ties for best among the safe set, never as a blanket preference.

use crate::compat::BTreeMap;
use crate::math::{dequantize_scalar, quantize_scalar};
use crate::types::RiskConfig;
use crate::witness::{RiskChecks, RiskDerived, RiskInputs, RiskWitness};

pub fn risk_gate_select_action(
    contract: &RiskConfig,
    q_values: &BTreeMap<String, f64>,
    r_values: &BTreeMap<String, f64>,
    proposed_action: Option<&str>,
) -> RiskWitness {
    let q_int: BTreeMap<String, i64> = q_values
        .iter()
        .map(|(a, q)| (a.clone(), quantize_scalar(*q, contract.s)))
        .collect();
    let r_int: BTreeMap<String, i64> = r_values
        .iter()
        .map(|(a, r)| (a.clone(), quantize_scalar(*r, contract.s)))
        .collect();

    let action_set_ok: std::collections::BTreeSet<&String> = q_int.keys().collect::<std::collections::BTreeSet<_>>()
        == r_int.keys().collect::<std::collections::BTreeSet<_>>();
    let actions: Vec<String> = q_int.keys().cloned().collect();

    let rho_max_int = quantize_scalar(contract.rho_max, contract.s);
    let safe_actions: Vec<String> = actions
        .iter()
        .filter(|a| r_int.get(*a).copied().unwrap_or(i64::MAX) <= rho_max_int)
        .cloned()
        .collect();
    let safe_nonempty = !safe_actions.is_empty();

    let selected_action = if safe_nonempty {
        let best_q = safe_actions.iter().map(|a| q_int[a]).max().unwrap();
        let mut best_safe: Vec<String> = safe_actions.iter().filter(|a| q_int[*a] == best_q).cloned().collect();
        best_safe.sort();
        match proposed_action {
            Some(p) if best_safe.iter().any(|a| a == p) => p.to_string(),
            _ => best_safe[0].clone(),
        }
    } else {
        contract.abstain_action.clone()
    };

    let (regret, regret_ok) = if safe_nonempty {
        let q_max_safe = safe_actions.iter().map(|a| q_int[a]).max().unwrap();
        let q_sel = q_int[&selected_action];
        let regret_int = q_max_safe - q_sel;
        let eps_regret_int = quantize_scalar(contract.eps_regret, contract.s);
        (
            Some(dequantize_scalar(regret_int, contract.s)),
            regret_int <= eps_regret_int,
        )
    } else {
        (None, true)
    };

    let check_action = proposed_action.unwrap_or(&selected_action);
    let (selected_risk, risk_ok) = if check_action != contract.abstain_action {
        match r_int.get(check_action) {
            None => (None, false),
            Some(r) => (Some(dequantize_scalar(*r, contract.s)), *r <= rho_max_int),
        }
    } else {
        (None, true)
    };

    let proposal_ok = match proposed_action {
        Some(p) => p == selected_action,
        None => true,
    };

    let checks = RiskChecks {
        action_set_ok,
        safe_nonempty,
        risk_ok,
        regret_ok,
        proposal_ok,
    };
    let passed =
        checks.action_set_ok && checks.regret_ok && checks.risk_ok && checks.proposal_ok;

    RiskWitness {
        schema: "contract.risk_gate.v1",
        contract: contract.clone(),
        inputs: RiskInputs {
            q_int: actions.iter().map(|a| (a.clone(), q_int[a])).collect(),
            r_int: actions.iter().map(|a| (a.clone(), r_int[a])).collect(),
            proposed_action: proposed_action.map(String::from),
        },
        derived: RiskDerived {
            safe_actions,
            selected_action,
            selected_risk,
            regret,
        },
        checks,
        verdict: crate::witness::verdict_str(passed),
    }
}
