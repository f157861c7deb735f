//! Stream configuration: everything the orchestrator and the demo
//! binary need that is not itself part of a red packet — contract
//! parameters, output paths, global seed, and signing mode.
//!
//! Loaded from a single JSON file (or built programmatically in tests)
//! and never read from the environment by this crate; a collaborator
//! wiring environment variables into one of these fields is an outer
//! concern, not this crate's.

use crate::types::ContractSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SigningConfig {
    pub enabled: bool,
    /// Hex-encoded 32-byte ed25519 private key seed. Required when
    /// `enabled` is true; ignored otherwise.
    #[serde(default)]
    pub private_key_hex: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        SigningConfig { enabled: false, private_key_hex: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    pub stream_id: String,
    pub global_seed: u32,
    pub out_root: String,
    #[serde(default)]
    pub signing: SigningConfig,
    pub contracts: ContractSet,
    pub skills: Vec<crate::types::SkillSpec>,
    pub state_vocab: Vec<String>,
}

impl StreamConfig {
    pub fn from_json_str(s: &str) -> Result<Self, crate::KernelError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Decodes `signing.private_key_hex` into a `SigningKey`, if signing
    /// is enabled. Returns `Ok(None)` when signing is disabled.
    pub fn signing_key(&self) -> Result<Option<ed25519_dalek::SigningKey>, crate::KernelError> {
        if !self.signing.enabled {
            return Ok(None);
        }
        let hex = self
            .signing
            .private_key_hex
            .as_deref()
            .ok_or_else(|| crate::KernelError::Signature("signing enabled but private_key_hex missing".into()))?;
        let bytes = decode_hex_32(hex)
            .map_err(|e| crate::KernelError::Signature(format!("malformed private_key_hex: {e}")))?;
        Ok(Some(ed25519_dalek::SigningKey::from_bytes(&bytes)))
    }
}

fn decode_hex_32(s: &str) -> Result<[u8; 32], String> {
    if s.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", s.len()));
    }
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|e| e.to_string())?;
    }
    Ok(out)
}
