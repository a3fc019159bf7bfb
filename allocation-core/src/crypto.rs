//! Credential hashing
//!
//! The engine never sees plaintext after registration: it stores whatever
//! [`CredentialHasher::hash`] returns and asks the hasher to compare later.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Pluggable credential hashing collaborator
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext credential for storage
    fn hash(&self, secret: &str) -> String;

    /// Check a plaintext credential against a stored hash
    fn verify(&self, stored_hash: &str, secret: &str) -> bool {
        stored_hash
            .as_bytes()
            .ct_eq(self.hash(secret).as_bytes())
            .into()
    }
}

/// Unsalted SHA-256, hex encoded
///
/// Matches the hash format already present in existing holder stores.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl CredentialHasher for Sha256Hasher {
    fn hash(&self, secret: &str) -> String {
        hex::encode(Sha256::digest(secret.as_bytes()))
    }
}
