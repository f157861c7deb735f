//! Witness Kernel — deterministic decision verifier.
//! Version: 0.1.0
//!
//! Given an externally proposed action in a small stochastic world, this
//! crate independently re-derives and certifies every stage of the decision
//! (perception, model update, value estimate, risk admission, skill
//! execution) and emits a tamper-evident witness bundle chained to all
//! prior steps. No networking, no async, no threading: one step in, one
//! bundle out.
//!
//! INVARIANTS:
//! 1. All hashing goes through `codec::canon` + `codec::sha256`. Nothing is
//!    hashed from a language-native struct layout.
//! 2. BTreeMap is used everywhere a table needs deterministic iteration
//!    order. HashMap is forbidden in any path that feeds a hash.
//! 3. Floating point is used only for contract inputs/outputs as carried
//!    on the wire; every comparison that gates a verdict happens on
//!    quantized integers (`math::fixed`).
//! 4. Feature flags that would alter witness semantics are forbidden —
//!    an emitter and a verifier built from the same source must never
//!    diverge based on compile-time flags.

pub mod compat;
pub mod codec;
pub mod math;
pub mod types;
pub mod contracts;
pub mod merkle;
pub mod witness;
pub mod bundle;
pub mod orchestrator;
pub mod replay;
pub mod signer;
pub mod anomaly;
pub mod config;
pub mod error;

pub use error::KernelError;
