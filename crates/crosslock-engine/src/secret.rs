//! # Secret Generation and Verification
//!
//! Cryptographic operations for HTLC secrets. The committed hashlock
//! is SHA-256 of the secret bytes on every chain of a swap; mixing
//! hash functions across legs would break the single-secret atomicity
//! argument.

use crosslock_types::{HashLock, SecretBytes};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Draw a fresh 32-byte secret from the thread CSPRNG.
pub fn generate_secret() -> SecretBytes {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    SecretBytes::new(bytes)
}

/// SHA-256 of the secret bytes.
pub fn hash_secret(secret: &SecretBytes) -> HashLock {
    let digest = Sha256::digest(secret.as_bytes());
    digest.into()
}

/// Constant-time check that `secret` is the pre-image of `hash_lock`.
pub fn verify_secret(secret: &SecretBytes, hash_lock: &HashLock) -> bool {
    let computed = hash_secret(secret);
    computed[..].ct_eq(&hash_lock[..]).into()
}

/// Mint a secret together with its hashlock.
pub fn mint() -> (SecretBytes, HashLock) {
    let secret = generate_secret();
    let hash = hash_secret(&secret);
    (secret, hash)
}

/// Mint `count` independent secret/hashlock pairs for a partial-fill
/// order. Revealing one part's pre-image discloses nothing about the
/// others.
pub fn mint_parts(count: u8) -> Vec<(SecretBytes, HashLock)> {
    (0..count).map(|_| mint()).collect()
}
