//! The canonical error type for everything that can go wrong outside a
//! contract verdict. A contract FAIL is data (see `witness`), never an
//! `Err` — this enum is reserved for conditions a contract cannot express
//! as a witness at all.

use crate::codec::canon::CanonError;
use crate::replay::ReplayReasonCode;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Input could not be normalized into canonical JSON: a non-finite
    /// float, or a probability/mass that is structurally invalid.
    #[error("canon error: {0}")]
    Canon(String),

    /// A step directory failed replay; carries the machine-readable code.
    #[error("replay failure: {0:?}")]
    Replay(ReplayReasonCode),

    /// A malformed key, bad signature, or unsupported signing scheme.
    #[error("signature error: {0}")]
    Signature(String),

    /// Missing/duplicate destination, or an I/O failure while persisting
    /// a step directory.
    #[error("storage error: {0}")]
    Storage(String),

    /// The risk gate selected a skill token with no matching `SkillSpec`.
    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    /// A red packet was missing a required field or had the wrong shape.
    #[error("malformed red packet: {0}")]
    MalformedPacket(String),
}

impl From<std::io::Error> for KernelError {
    fn from(e: std::io::Error) -> Self {
        KernelError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        KernelError::MalformedPacket(e.to_string())
    }
}

impl From<CanonError> for KernelError {
    fn from(e: CanonError) -> Self {
        KernelError::Canon(e.to_string())
    }
}
