//! Cryptographic utilities shared across Luster crates
//!
//! Provides key hashing and verification using SHA-256 with random salts
//! and constant-time comparison to prevent timing attacks.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Verify an API key against a stored hash using constant-time comparison.
///
/// The stored hash format is `hex(salt):hex(sha256(key || salt))`.
pub fn verify_key_hash(candidate_key: &str, stored_hash: &str) -> bool {
    // Parse stored hash: salt:hash
    let parts: Vec<&str> = stored_hash.split(':').collect();
    if parts.len() != 2 {
        return false;
    }

    let salt = match hex::decode(parts[0]) {
        Ok(salt) => salt,
        Err(_) => return false,
    };

    let hash = match hex::decode(parts[1]) {
        Ok(hash) => hash,
        Err(_) => return false,
    };

    let mut hasher = Sha256::new();
    hasher.update(candidate_key.as_bytes());
    hasher.update(&salt);
    let candidate_hash = hasher.finalize();

    constant_time_eq(&hash, &candidate_hash)
}

/// Compare two byte slices in constant time. Returns false immediately on
/// length mismatch since length is not secret; the comparison of equal-length
/// content never short-circuits.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Verify an HMAC-SHA256 webhook signature against the raw request body.
///
/// `signature_hex` is the lowercase-hex digest the sender attached to the
/// delivery. Returns false on malformed hex as well as on mismatch; callers
/// should treat both identically.
pub fn verify_hmac_sha256(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    use hmac::{Hmac, Mac};
    type HmacSha256 = Hmac<Sha256>;

    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    constant_time_eq(&expected, &computed)
}
