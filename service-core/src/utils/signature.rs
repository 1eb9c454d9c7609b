//! HMAC-SHA256 helpers shared by webhook verifiers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(secret: &[u8], payload: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn hmac_sha256_hex(secret: &[u8], payload: &[u8]) -> Result<String, anyhow::Error> {
    Ok(hex::encode(hmac_sha256(secret, payload)?))
}

/// Base64-encoded (standard alphabet) HMAC-SHA256 of `payload`.
pub fn hmac_sha256_base64(secret: &[u8], payload: &[u8]) -> Result<String, anyhow::Error> {
    Ok(STANDARD.encode(hmac_sha256(secret, payload)?))
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Constant-time string comparison.
pub fn secure_compare(expected: &str, candidate: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let candidate_bytes = candidate.as_bytes();

    if expected_bytes.len() != candidate_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(candidate_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_signature_is_stable() {
        let first = hmac_sha256_hex(b"whsec_test", b"1700000000.{\"id\":\"evt_1\"}").unwrap();
        let second = hmac_sha256_hex(b"whsec_test", b"1700000000.{\"id\":\"evt_1\"}").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let signature = hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_tampered_payload_does_not_match() {
        let signature = hmac_sha256_base64(b"secret", b"{\"foo\":\"bar\"}").unwrap();
        let tampered = hmac_sha256_base64(b"secret", b"{\"foo\":\"baz\"}").unwrap();
        assert!(!secure_compare(&signature, &tampered));
        assert!(secure_compare(&signature, &signature.clone()));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(!secure_compare("abc", "abcd"));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
