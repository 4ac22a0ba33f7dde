//! Digest and comparison helpers shared by the token, CSRF and session code.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

pub type HmacSha256 = Hmac<Sha256>;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Build an HMAC-SHA256 instance keyed with `key`.
pub fn hmac_sha256(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC accepts any key length")
}

/// Derive a purpose-specific key from the process secret so that one
/// signature can never be replayed as another kind of token.
pub fn derive_key(secret: &[u8], label: &str) -> Vec<u8> {
    let mut mac = hmac_sha256(secret);
    mac.update(label.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Length is not secret: differing lengths return `false` immediately.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq(b"same-bytes", b"same-bytes"));
        assert!(!constant_time_eq(b"same-bytes", b"same-bytez"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn derived_keys_differ_by_label() {
        let a = derive_key(b"secret", "session");
        let b = derive_key(b"secret", "csrf");
        assert_ne!(a, b);
        assert_eq!(a, derive_key(b"secret", "session"));
    }
}
