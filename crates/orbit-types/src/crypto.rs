//! Ed25519 keys and signatures, plus protocol address derivation.
//!
//! Thin wrappers around `ed25519-dalek` so the rest of the workspace can
//! derive SBOR encodings and stay independent of the backing library.

use ed25519_dalek::{Signer, Verifier};
use rand::RngCore;
use ripemd::Ripemd160;
use sbor::prelude::*;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length in bytes of a derived account address.
pub const ADDRESS_LENGTH: usize = 20;

/// An ed25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Construct from raw bytes without validation.
    ///
    /// Point validity is checked lazily at verification time; an invalid
    /// point simply fails every verification.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", &hex::encode(self.0)[..8])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// An ed25519 signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq, BasicSbor)]
#[sbor(transparent)]
pub struct Signature([u8; 64]);

impl Signature {
    /// All-zero signature, used as a placeholder in fixtures.
    pub fn zero() -> Self {
        Self([0u8; 64])
    }

    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &hex::encode(self.0)[..8])
    }
}

/// An ed25519 private key. Never serialized.
pub struct PrivateKey(ed25519_dalek::SigningKey);

impl PrivateKey {
    /// Construct from a 32-byte seed.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(bytes))
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message).to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(..)")
    }
}

/// A private/public keypair.
pub struct KeyPair {
    /// Signing half.
    pub private: PrivateKey,
    /// Verifying half.
    pub public: PublicKey,
}

/// Generate a fresh random keypair.
pub fn generate_keypair() -> KeyPair {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    keypair_from_seed(&seed)
}

/// Derive a keypair deterministically from a 32-byte seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let private = PrivateKey::from_bytes(seed);
    let public = private.public_key();
    KeyPair { private, public }
}

/// Signature verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The public key bytes do not decode to a valid curve point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The signature does not verify against the key and message.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify an ed25519 signature over `message`.
///
/// Precondition-free: malformed keys and signatures report as errors rather
/// than panicking.
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    let key = ed25519_dalek::VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(message, &sig)
        .map_err(|_| SignatureError::Mismatch)
}

/// A derived account address: `RIPEMD160(SHA256(public_key))`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Address bytes as a Vec, for argument passing.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Derive the account address for a public key.
pub fn derive_address(public_key: &PublicKey) -> Address {
    let sha = Sha256::digest(public_key.as_bytes());
    let ripemd = Ripemd160::digest(sha);
    let mut bytes = [0u8; ADDRESS_LENGTH];
    bytes.copy_from_slice(&ripemd);
    Address(bytes)
}
