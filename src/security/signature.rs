//! Webhook delivery signatures (`X-Hub-Signature` / `X-Hub-Signature-256`).
//!
//! The platform signs every POST body with the app secret and sends
//! `<algorithm>=<hex digest>` in the header.
//! See: <https://developers.facebook.com/docs/graph-api/webhooks/getting-started#verification-requests>

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-hub-signature";
pub const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature header is malformed")]
    Malformed,
    #[error("unsupported signature algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("signature does not match request body")]
    Mismatch,
}

/// How a delivery got past verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Signed,
    /// No header was sent and unsigned deliveries are allowed.
    Unsigned,
}

/// Verify one header value against `body`.
///
/// Accepts `sha1=<hex>` and `sha256=<hex>`. The algorithm prefix is
/// case-sensitive, matching what the platform sends.
pub fn verify_signature(
    app_secret: &str,
    body: &[u8],
    signature_header: &str,
) -> Result<(), SignatureError> {
    let (method, hex_sig) = signature_header
        .trim()
        .split_once('=')
        .ok_or(SignatureError::Malformed)?;
    let expected = hex::decode(hex_sig).map_err(|_| SignatureError::Malformed)?;

    match method {
        "sha1" => {
            let mut mac = Hmac::<Sha1>::new_from_slice(app_secret.as_bytes())
                .map_err(|_| SignatureError::Mismatch)?;
            mac.update(body);
            mac.verify_slice(&expected)
                .map_err(|_| SignatureError::Mismatch)
        }
        "sha256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
                .map_err(|_| SignatureError::Mismatch)?;
            mac.update(body);
            mac.verify_slice(&expected)
                .map_err(|_| SignatureError::Mismatch)
        }
        other => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Decide whether a webhook delivery is trusted.
///
/// The SHA-256 header wins when both carry a value; a blank header counts
/// as absent. With neither present the
/// delivery is rejected unless `allow_unsigned` is set.
pub fn verify_delivery(
    app_secret: &str,
    body: &[u8],
    sha1_header: Option<&str>,
    sha256_header: Option<&str>,
    allow_unsigned: bool,
) -> Result<Verification, SignatureError> {
    fn present(header: Option<&str>) -> Option<&str> {
        header.map(str::trim).filter(|h| !h.is_empty())
    }
    let header = present(sha256_header).or_else(|| present(sha1_header));

    match header {
        Some(header) => verify_signature(app_secret, body, header).map(|()| Verification::Signed),
        None if allow_unsigned => Ok(Verification::Unsigned),
        None => Err(SignatureError::Missing),
    }
}

/// Produce the `sha1=<hex>` header value the platform would send for `body`.
#[cfg(test)]
pub(crate) fn sign_sha1(app_secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(app_secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate a random hex secret at runtime to avoid hard-coded cryptographic values.
    fn generate_test_secret() -> String {
        let bytes: [u8; 32] = rand::random();
        hex::encode(bytes)
    }

    fn sign_sha256(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn sha1_signature_valid() {
        let secret = generate_test_secret();
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign_sha1(&secret, body);
        assert!(header.starts_with("sha1="));
        assert_eq!(verify_signature(&secret, body, &header), Ok(()));
    }

    #[test]
    fn sha1_signature_matches_known_vector() {
        // RFC 2202 test case 2.
        let header = sign_sha1("Jefe", b"what do ya want for nothing?");
        assert_eq!(header, "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn sha256_signature_valid() {
        let secret = generate_test_secret();
        let body = b"test body content";
        let header = sign_sha256(&secret, body);
        assert_eq!(verify_signature(&secret, body, &header), Ok(()));
    }

    #[test]
    fn wrong_secret_is_mismatch() {
        let secret = generate_test_secret();
        let other = generate_test_secret();
        let body = b"test body content";
        let header = sign_sha1(&other, body);
        assert_eq!(
            verify_signature(&secret, body, &header),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn any_single_byte_mutation_fails() {
        let secret = generate_test_secret();
        let body = br#"{"object":"page","entry":[{"id":"1","time":2,"messaging":[]}]}"#.to_vec();
        let header = sign_sha1(&secret, &body);

        for i in 0..body.len() {
            let mut tampered = body.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                verify_signature(&secret, &tampered, &header),
                Err(SignatureError::Mismatch),
                "mutation at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn missing_separator_is_malformed() {
        let secret = generate_test_secret();
        assert_eq!(
            verify_signature(&secret, b"body", "abc123def456"),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(&secret, b"body", ""),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn invalid_hex_is_malformed() {
        let secret = generate_test_secret();
        assert_eq!(
            verify_signature(&secret, b"body", "sha1=not_valid_hex_zzz"),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let secret = generate_test_secret();
        let hex_sig = sign_sha1(&secret, b"body").trim_start_matches("sha1=").to_string();
        assert_eq!(
            verify_signature(&secret, b"body", &format!("md5={hex_sig}")),
            Err(SignatureError::UnsupportedAlgorithm("md5".into()))
        );
        assert_eq!(
            verify_signature(&secret, b"body", &format!("SHA1={hex_sig}")),
            Err(SignatureError::UnsupportedAlgorithm("SHA1".into()))
        );
    }

    #[test]
    fn truncated_digest_is_mismatch() {
        let secret = generate_test_secret();
        let header = sign_sha1(&secret, b"body");
        let truncated = &header[..header.len() - 8];
        assert_eq!(
            verify_signature(&secret, b"body", truncated),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn missing_header_rejected_by_default() {
        let secret = generate_test_secret();
        assert_eq!(
            verify_delivery(&secret, b"body", None, None, false),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_delivery(&secret, b"body", Some("  "), None, false),
            Err(SignatureError::Missing)
        );
    }

    #[test]
    fn missing_header_allowed_when_configured() {
        let secret = generate_test_secret();
        assert_eq!(
            verify_delivery(&secret, b"body", None, None, true),
            Ok(Verification::Unsigned)
        );
    }

    #[test]
    fn bad_header_still_rejected_when_unsigned_allowed() {
        let secret = generate_test_secret();
        assert_eq!(
            verify_delivery(&secret, b"body", Some("sha1=00"), None, true),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn sha256_header_takes_precedence() {
        let secret = generate_test_secret();
        let body = b"payload";
        let good_256 = sign_sha256(&secret, body);
        assert_eq!(
            verify_delivery(&secret, body, Some("sha1=00"), Some(&good_256), false),
            Ok(Verification::Signed)
        );
    }

    #[test]
    fn blank_sha256_header_falls_back_to_sha1() {
        let secret = generate_test_secret();
        let body = b"payload";
        let good_sha1 = sign_sha1(&secret, body);
        assert_eq!(
            verify_delivery(&secret, body, Some(&good_sha1), Some(""), false),
            Ok(Verification::Signed)
        );
        assert_eq!(
            verify_delivery(&secret, body, Some(&good_sha1), Some("   "), false),
            Ok(Verification::Signed)
        );
    }

    #[test]
    fn blank_sha256_header_does_not_hide_bad_sha1() {
        let secret = generate_test_secret();
        assert_eq!(
            verify_delivery(&secret, b"payload", Some("sha1=deadbeef"), Some(""), true),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn blank_headers_count_as_missing() {
        let secret = generate_test_secret();
        assert_eq!(
            verify_delivery(&secret, b"payload", Some(" "), Some(""), false),
            Err(SignatureError::Missing)
        );
    }
}
