//! The per-step seed derivation and the xorshift PRNG every rollout in
//! every contract is built on. Five independent sub-streams are derived
//! from one `(global_seed, step_counter)` pair so a tampered value
//! estimate can never be explained by the perception contract having
//! consumed a different number of random draws — each stage owns its
//! own stream.

/// `xorshift32`, the 32-bit xorshift variant (`13/17/5` shift triple).
/// A zero seed is degenerate (the generator would produce an endless
/// stream of zeros), so it is reseeded to a fixed non-zero constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    pub fn new(seed: u32) -> Self {
        XorShift32 {
            state: if seed == 0 { 0xA341_316C } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

/// Mixes two 32-bit values into one via Knuth's multiplicative hash
/// constant. `u32` arithmetic wraps at 32 bits natively in Rust, so this
/// needs no explicit masking.
pub fn mix32(a: u32, b: u32) -> u32 {
    a.wrapping_mul(0x9E37_79B9).wrapping_add(b)
}

/// Folds an arbitrary string (an action token, typically) down to a
/// 32-bit value by taking the first 4 bytes of its SHA-256 digest,
/// little-endian. Hashes the raw UTF-8 bytes directly — not the
/// canonical-JSON encoding of the string.
pub fn sha32(s: &str) -> u32 {
    let digest = crate::codec::sha256(s.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// The five independent PRNG seeds derived for one step: one per
/// contract stage, plus the shared base they all derive from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSeeds {
    pub base: u32,
    pub percept: u32,
    pub model: u32,
    pub value: u32,
    pub risk: u32,
    pub exec: u32,
}

/// Derives the five per-stage seeds for a step. `percept` uses the
/// constant `17`, not `0` or the next value in the `1..=4` sequence the
/// other four stages use — this is a deliberate, non-sequential choice
/// carried over unchanged; a verifier that "fixed" it to `0` would
/// silently diverge from every bundle it's asked to replay.
pub fn derive_seeds(global_seed: u32, step_counter: u32) -> StepSeeds {
    let base = mix32(global_seed, step_counter);
    StepSeeds {
        base,
        percept: mix32(base, 17),
        model: mix32(base, 1),
        value: mix32(base, 2),
        risk: mix32(base, 3),
        exec: mix32(base, 4),
    }
}

/// Draws a state from an integer probability mass table (state -> mass
/// out of some total), iterating candidates in ascending key order so
/// the draw is reproducible regardless of the caller's map type. Falls
/// back to the last candidate if accumulated mass never reaches `r`
/// (can only happen if the masses don't actually sum to `total`, which
/// callers are expected to have validated already).
pub fn sample_from_intmass<'a, I>(dist: I, total: i64, rng: &mut XorShift32) -> &'a str
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut entries: Vec<(&str, i64)> = dist.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let r = (rng.next_u32() as u64 % total.max(1) as u64) as i64;
    let mut acc: i64 = 0;
    for (state, mass) in &entries {
        acc += mass;
        if r < acc {
            return state;
        }
    }
    entries.last().map(|(s, _)| *s).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_seed_is_reseeded() {
        let mut rng = XorShift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn xorshift_is_deterministic() {
        let mut a = XorShift32::new(12345);
        let mut b = XorShift32::new(12345);
        for _ in 0..10 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn derive_seeds_percept_uses_constant_seventeen() {
        let seeds = derive_seeds(7, 3);
        assert_eq!(seeds.percept, mix32(seeds.base, 17));
        assert_eq!(seeds.model, mix32(seeds.base, 1));
        assert_eq!(seeds.value, mix32(seeds.base, 2));
        assert_eq!(seeds.risk, mix32(seeds.base, 3));
        assert_eq!(seeds.exec, mix32(seeds.base, 4));
    }

    #[test]
    fn derive_seeds_is_stable_across_calls() {
        assert_eq!(derive_seeds(1, 1), derive_seeds(1, 1));
    }

    #[test]
    fn sha32_hashes_raw_utf8_bytes() {
        let digest = crate::codec::sha256(b"MOVE_RIGHT");
        let expected = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        assert_eq!(sha32("MOVE_RIGHT"), expected);
    }

    #[test]
    fn sample_from_intmass_picks_within_range() {
        let mut rng = XorShift32::new(999);
        let dist = vec![("1,1", 3i64), ("1,2", 1i64)];
        let result = sample_from_intmass(dist, 4, &mut rng);
        assert!(result == "1,1" || result == "1,2");
    }

    #[test]
    fn sample_from_intmass_all_mass_on_one_state() {
        let mut rng = XorShift32::new(5);
        let dist = vec![("only", 4i64)];
        assert_eq!(sample_from_intmass(dist, 4, &mut rng), "only");
    }
}
