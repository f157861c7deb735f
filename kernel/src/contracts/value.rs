//! Γ_value: re-derives `Q(s,a)`/`R(s,a)` by Monte Carlo rollout through
//! the verified transition table and certifies a proposed value pair
//! against the re-derived estimate within a quantized tolerance.

use crate::codec::canon::hash_value;
use crate::math::{dequantize_scalar, mean_int, quantize_scalar, sample_from_intmass, XorShift32};
use crate::types::{reward_key, tver_key, TVer, ValueConfig};
use crate::witness::{ValueChecks, ValueDiffs, ValueInputs, ValueMc, ValueWitness};

/// One Monte Carlo rollout from `(s0, a0)`: follows `contract.follow_action`
/// for every subsequent step, for `horizon` steps, accumulating a
/// discounted return and a violation flag. A missing `(s, a)` row in the
/// verified transition table defaults to a self-loop with full mass —
/// staying put is the only thing a verifier can certify about a
/// transition it was never shown.
pub fn rollout_return_and_violation_int(
    contract: &ValueConfig,
    rng: &mut XorShift32,
    s0: &str,
    a0: &str,
    t_ver: &TVer,
    reward_int: &std::collections::BTreeMap<String, i64>,
    violation_states: &[String],
) -> (i64, i64, Vec<String>) {
    let s_scale = contract.s;
    let gamma_int = quantize_scalar(contract.gamma_fp, s_scale);
    let mut gamma_pow: i64 = 1 << s_scale;

    let mut s = s0.to_string();
    let mut a = a0.to_string();
    let mut traj = vec![s0.to_string()];
    let mut violated = 0i64;
    let mut g_acc: i64 = 0;

    for _ in 0..contract.horizon {
        let key = tver_key(&s, &a);
        let default_row: std::collections::BTreeMap<String, i64> =
            [(s.clone(), 1i64 << s_scale)].into_iter().collect();
        let dist = t_ver.get(&key).unwrap_or(&default_row);
        let total: i64 = dist.values().sum();
        let s2 = sample_from_intmass(dist.iter().map(|(k, v)| (k.as_str(), *v)), total, rng).to_string();
        traj.push(s2.clone());

        let r_int = reward_int.get(&reward_key(&s, &a, &s2)).copied().unwrap_or(0);
        g_acc += (gamma_pow * r_int) >> s_scale;

        if violation_states.iter().any(|v| v == &s2) {
            violated = 1;
        }

        gamma_pow = (gamma_pow * gamma_int) >> s_scale;
        s = s2;
        a = contract.follow_action.clone();
    }

    let v_int = if violated == 1 { 1i64 << s_scale } else { 0 };
    (g_acc, v_int, traj)
}

pub fn verify_value_proposal_single(
    contract: &ValueConfig,
    s: &str,
    a: &str,
    proposed_q: f64,
    proposed_r: f64,
    t_ver: &TVer,
    reward_table: &std::collections::BTreeMap<String, f64>,
    violation_states: &[String],
    rollout_seed: u32,
) -> ValueWitness {
    let s_scale = contract.s;
    let reward_int: std::collections::BTreeMap<String, i64> = reward_table
        .iter()
        .map(|(k, v)| (k.clone(), quantize_scalar(*v, s_scale)))
        .collect();
    let mut rng = XorShift32::new(rollout_seed);

    let mut gs = Vec::with_capacity(contract.n_rollouts as usize);
    let mut vs = Vec::with_capacity(contract.n_rollouts as usize);
    let mut traj_hashes = Vec::with_capacity(contract.n_rollouts as usize);

    for _ in 0..contract.n_rollouts {
        let (g_int, v_int, traj) =
            rollout_return_and_violation_int(contract, &mut rng, s, a, t_ver, &reward_int, violation_states);
        gs.push(g_int);
        vs.push(v_int);
        traj_hashes.push(hash_value(&traj).expect("trajectory is always representable"));
    }

    let q_mc_int = mean_int(&gs);
    let r_mc_int = mean_int(&vs);

    let q_hat_int = quantize_scalar(proposed_q, s_scale);
    let r_hat_int = quantize_scalar(proposed_r, s_scale);

    let eps_q_int = quantize_scalar(contract.eps_q, s_scale);
    let eps_r_int = quantize_scalar(contract.eps_r, s_scale);

    let dq = (q_hat_int - q_mc_int).abs();
    let dr = (r_hat_int - r_mc_int).abs();

    let checks = ValueChecks {
        q_ok: dq <= eps_q_int,
        r_ok: dr <= eps_r_int,
    };
    let passed = checks.q_ok && checks.r_ok;

    ValueWitness {
        schema: "contract.value.v1",
        contract: contract.clone(),
        inputs: ValueInputs {
            s: s.to_string(),
            a: a.to_string(),
            proposed_q,
            proposed_r,
            rollout_seed,
            t_ver_hash: hash_value(t_ver).expect("t_ver is always representable"),
            reward_table_hash: hash_value(reward_table).expect("reward table is always representable"),
            violation_states: violation_states.to_vec(),
        },
        mc: ValueMc {
            q_mc_int,
            r_mc_int,
            q_mc: dequantize_scalar(q_mc_int, s_scale),
            r_mc: dequantize_scalar(r_mc_int, s_scale),
            traj_hashes_digest: hash_value(&traj_hashes).expect("hash list is always representable"),
        },
        diffs: ValueDiffs {
            q_hat_int,
            r_hat_int,
            dq_int: dq,
            dr_int: dr,
            dq: dequantize_scalar(dq, s_scale),
            dr: dequantize_scalar(dr, s_scale),
        },
        checks,
        verdict: crate::witness::verdict_str(passed),
    }
}
