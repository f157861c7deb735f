//! Fixed-point quantization at a per-contract scale `S`: every contract
//! carries its own probabilities and rewards as floats on the wire, but
//! gates every verdict on the integer form so replay never depends on
//! floating-point rounding being bit-identical across platforms.

/// `quantize_scalar(x, s) = floor(x * 2^s + 0.5)` using round-half-up,
/// truncating toward zero the same way Python's `int()` does — which
/// for a value offset by `+0.5` produces round-half-up for positive `x`.
pub fn quantize_scalar(x: f64, s: u32) -> i64 {
    let scale = (1u64 << s) as f64;
    (x * scale + 0.5) as i64
}

/// Inverse of `quantize_scalar`: recovers the float a quantized integer
/// represents at scale `s`.
pub fn dequantize_scalar(q: i64, s: u32) -> f64 {
    let scale = (1u64 << s) as f64;
    q as f64 / scale
}

/// Integer division that floors toward negative infinity, matching
/// Python's `//`. Rust's `/` truncates toward zero, which disagrees with
/// `floor_div` exactly when the operands have opposite signs and the
/// division isn't exact.
pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// `mean_int(vals) = floor_div(sum(vals) + n/2, n)` — an integer mean
/// with round-half-up bias, used wherever a contract averages quantized
/// rollout outcomes. `n` is always positive here, so `n / 2` (plain
/// truncating division) is equivalent to a floor.
pub fn mean_int(vals: &[i64]) -> i64 {
    let n = vals.len() as i64;
    let sum: i64 = vals.iter().sum();
    floor_div(sum + n / 2, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_rounds_half_up() {
        assert_eq!(quantize_scalar(0.5, 1), 1);
        assert_eq!(quantize_scalar(0.25, 2), 1);
        assert_eq!(quantize_scalar(1.0, 8), 256);
    }

    #[test]
    fn dequantize_is_inverse_of_quantize_for_exact_values() {
        assert_eq!(dequantize_scalar(quantize_scalar(0.75, 8), 8), 0.75);
    }

    #[test]
    fn floor_div_matches_python_floor_semantics() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-7, -2), 3);
        assert_eq!(floor_div(6, 2), 3);
    }

    #[test]
    fn mean_int_rounds_half_up_on_the_sum() {
        // (1+2)/2 = 1.5 -> rounds to 2
        assert_eq!(mean_int(&[1, 2]), 2);
        // (1+1+2)/3 = 1.333 -> floors to 1
        assert_eq!(mean_int(&[1, 1, 2]), 1);
    }

    #[test]
    fn mean_int_single_value_is_identity() {
        assert_eq!(mean_int(&[42]), 42);
    }
}
