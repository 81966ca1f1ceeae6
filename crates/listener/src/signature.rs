//! Slack request signing, version `v0`.
//!
//! The signature is `v0=` followed by the hex HMAC-SHA256 of
//! `v0:{timestamp}:{raw body}` keyed with the app's signing secret.
//! Requests whose timestamp is more than five minutes away from the local
//! clock are refused regardless of signature, which stops replays.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature headers")]
    MissingHeaders,

    #[error("request timestamp is not a number")]
    BadTimestamp,

    #[error("request timestamp is outside the allowed window")]
    Stale,

    #[error("signature does not match")]
    Mismatch,
}

/// Checks one request. `now` is the local Unix time in seconds.
pub fn verify_signature(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(SignatureError::MissingHeaders);
    };
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    if (now - sent_at).abs() > MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::Stale);
    }

    let provided = signature
        .trim()
        .strip_prefix("v0=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
        .ok_or(SignatureError::Mismatch)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(b"v0:");
    mac.update(timestamp.trim().as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Produces the header value Slack would send. Used by tests.
#[cfg(test)]
pub(crate) fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"command=%2Flookup&text=acme&channel_id=C1&user_id=U1";

    #[test]
    fn test_valid_signature_is_accepted() {
        let sig = sign(SECRET, "1700000000", BODY);
        assert_eq!(
            verify_signature(SECRET, Some("1700000000"), Some(&sig), BODY, 1_700_000_100),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let sig = sign(SECRET, "1700000000", BODY);
        assert_eq!(
            verify_signature(SECRET, Some("1700000000"), Some(&sig), b"command=%2Fother", 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let sig = sign("another-secret", "1700000000", BODY);
        assert_eq!(
            verify_signature(SECRET, Some("1700000000"), Some(&sig), BODY, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_old_timestamp_is_stale_even_when_signed() {
        let sig = sign(SECRET, "1700000000", BODY);
        assert_eq!(
            verify_signature(SECRET, Some("1700000000"), Some(&sig), BODY, 1_700_000_301),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_missing_or_garbled_headers() {
        assert_eq!(
            verify_signature(SECRET, None, Some("v0=00"), BODY, 0),
            Err(SignatureError::MissingHeaders)
        );
        assert_eq!(
            verify_signature(SECRET, Some("soon"), Some("v0=00"), BODY, 0),
            Err(SignatureError::BadTimestamp)
        );
        assert_eq!(
            verify_signature(SECRET, Some("0"), Some("v1=zz"), BODY, 0),
            Err(SignatureError::Mismatch)
        );
    }
}
