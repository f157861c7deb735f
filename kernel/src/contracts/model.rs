//! Γ_model: certifies a proposed world-model update against a reference
//! distribution (drift bound), an optional previously-verified
//! distribution (update-stability bound), a support-size cap, a
//! minimum-mass-per-outcome floor, and a forbidden-next-state mass cap.

use crate::compat::BTreeMap;
use crate::math::quantize_scalar;
use crate::types::ModelConfig;
use crate::witness::{ModelChecks, ModelInputs, ModelMetrics, ModelWitness};
use crate::KernelError;

/// Quantizes a sparse `(state, probability)` list to integer mass at
/// scale `S`, dropping zero-mass outcomes and sorting by state. Rejects
/// a negative probability or a distribution whose total mass quantizes
/// to zero (an all-but-impossible proposal the caller should never be
/// able to construct, so treating it as unrepresentable rather than a
/// witness FAIL is the right call).
pub fn canon_dist_sparse(pairs: &[(String, f64)], s: u32) -> Result<BTreeMap<String, i64>, KernelError> {
    let mut tmp: Vec<(String, i64)> = Vec::with_capacity(pairs.len());
    for (state, p) in pairs {
        if *p < 0.0 {
            return Err(KernelError::Canon(format!("negative probability for state {state}")));
        }
        tmp.push((state.clone(), quantize_scalar(*p, s)));
    }
    tmp.sort_by(|a, b| a.0.cmp(&b.0));
    let out: BTreeMap<String, i64> = tmp.into_iter().filter(|(_, m)| *m > 0).collect();
    if out.values().sum::<i64>() <= 0 {
        return Err(KernelError::Canon("zero total mass".to_string()));
    }
    Ok(out)
}

/// L1 distance between two sparse integer-mass distributions, each
/// renormalized to its own total before comparing.
pub fn l1_dist_from_intmass(p: &BTreeMap<String, i64>, q: &BTreeMap<String, i64>) -> f64 {
    let mp: i64 = p.values().sum();
    let mq: i64 = q.values().sum();
    let mut keys: Vec<&String> = p.keys().chain(q.keys()).collect();
    keys.sort();
    keys.dedup();
    let mut acc = 0.0;
    for k in keys {
        let ps = p.get(k).copied().unwrap_or(0) as f64 / mp as f64;
        let qs = q.get(k).copied().unwrap_or(0) as f64 / mq as f64;
        acc += (ps - qs).abs();
    }
    acc
}

pub fn verify_model_proposal(
    contract: &ModelConfig,
    proposal_pairs: &[(String, f64)],
    ref_pairs: &[(String, f64)],
    ver_pairs: Option<&[(String, f64)]>,
    forbidden_next_states: &[String],
) -> Result<ModelWitness, KernelError> {
    let cand_int = canon_dist_sparse(proposal_pairs, contract.s)?;
    let ref_int = canon_dist_sparse(ref_pairs, contract.s)?;

    let support_size = cand_int.len();
    let support_ok = support_size <= contract.k_max;

    let mc: i64 = cand_int.values().sum();
    let mut pi_min_ok = true;
    for m in cand_int.values() {
        if (*m as f64 / mc as f64) < contract.pi_min {
            pi_min_ok = false;
            break;
        }
    }

    let l1_ref = l1_dist_from_intmass(&cand_int, &ref_int);
    let l1_ref_ok = l1_ref <= contract.eps_t;

    let forbid_mass: i64 = forbidden_next_states
        .iter()
        .map(|s2| cand_int.get(s2).copied().unwrap_or(0))
        .sum();
    let forbidden_prob = forbid_mass as f64 / mc as f64;
    let forbid_ok = forbidden_prob <= contract.eta_forbid;

    let (l1_ver, l1_ver_ok) = if let Some(ver_pairs) = ver_pairs {
        let ver_int = canon_dist_sparse(ver_pairs, contract.s)?;
        let l1 = l1_dist_from_intmass(&cand_int, &ver_int);
        (Some(l1), l1 <= contract.eps_update)
    } else {
        (None, true)
    };

    let checks = ModelChecks {
        support_ok,
        pi_min_ok,
        l1_ref_ok,
        forbid_ok,
        l1_ver_ok,
    };
    let passed = checks.support_ok && checks.pi_min_ok && checks.l1_ref_ok && checks.forbid_ok && checks.l1_ver_ok;

    Ok(ModelWitness {
        schema: "contract.model.v1",
        contract: contract.clone(),
        inputs: ModelInputs {
            proposal_pairs: proposal_pairs.to_vec(),
            ref_pairs: ref_pairs.to_vec(),
            ver_pairs: ver_pairs.map(|p| p.to_vec()),
            forbidden_next_states: forbidden_next_states.to_vec(),
        },
        candidate_int_mass: cand_int,
        ref_int_mass: ref_int,
        metrics: ModelMetrics {
            support_size,
            l1_to_ref: l1_ref,
            forbidden_prob,
            l1_to_verified: l1_ver,
        },
        checks,
        verdict: crate::witness::verdict_str(passed),
    })
}
