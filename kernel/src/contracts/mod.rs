//! The five independent verifiers. Each takes what a policy proposed
//! plus the kernel's own ground truth (a verified transition table, a
//! reward table, a skill library) and returns a witness — it never
//! trusts the proposal's own claims about whether it passed.

pub mod exec;
pub mod model;
pub mod percept;
pub mod risk;
pub mod value;

pub use exec::verify_exec_proposal;
pub use model::verify_model_proposal;
pub use percept::verify_percept_proposal;
pub use risk::risk_gate_select_action;
pub use value::verify_value_proposal_single;
