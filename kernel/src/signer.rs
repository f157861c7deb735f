//! ed25519 signing over a step's Merkle root.
//!
//! The signed message is the root's lowercase hex string encoded as
//! UTF-8 bytes, not the raw 32-byte digest — matching a reference
//! signing utility so a bundle's `root.sig` verifies against the exact
//! same bytes a human reads in `root_hash.txt`.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("malformed signature bytes")]
    MalformedSignature,
    #[error("malformed public key bytes")]
    MalformedPublicKey,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Generates a fresh keypair. Not used on any replay-critical path —
/// a provisioning helper for whoever populates `signing.private_key_hex`
/// in a stream's configuration.
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Signs the merkle root's hex string bytes, returning the raw 64-byte
/// signature.
pub fn sign_merkle_root(signing_key: &SigningKey, merkle_root_hex: &str) -> [u8; 64] {
    let sig: Signature = signing_key.sign(merkle_root_hex.as_bytes());
    sig.to_bytes()
}

/// Verifies a signature over a merkle root's hex string bytes against a
/// raw 32-byte ed25519 public key.
pub fn verify_merkle_root_sig(
    verifying_key_bytes: &[u8; 32],
    merkle_root_hex: &str,
    sig_bytes: &[u8],
) -> Result<(), SignerError> {
    let verifying_key =
        VerifyingKey::from_bytes(verifying_key_bytes).map_err(|_| SignerError::MalformedPublicKey)?;
    let sig_array: [u8; 64] = sig_bytes.try_into().map_err(|_| SignerError::MalformedSignature)?;
    let signature = Signature::from_bytes(&sig_array);
    verifying_key
        .verify(merkle_root_hex.as_bytes(), &signature)
        .map_err(|_| SignerError::VerificationFailed)
}
