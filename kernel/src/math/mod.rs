//! Deterministic arithmetic: fixed-point quantization and the seeded
//! PRNG every contract's rollouts are derived from. Nothing here touches
//! a float once a comparison needs to gate a verdict — floats are
//! carried on the wire, but every decision is made on quantized integers.

pub mod fixed;
pub mod prng;

pub use fixed::{dequantize_scalar, floor_div, mean_int, quantize_scalar};
pub use prng::{derive_seeds, mix32, sample_from_intmass, sha32, StepSeeds, XorShift32};
