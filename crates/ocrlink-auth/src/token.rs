//! Signed, time-bounded device tokens
//!
//! Token layout: `base64url(claims).base64url(hmac_sha256(secret, base64url(claims)))`
//! with `claims = {"sub": <device id>, "iat": <unix secs>, "exp": <unix secs>}`.
//! Verification is a pure function of the token, the secret and the clock.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::device::{Credential, DeviceId};
use crate::pairing::{PairingError, PairingResult};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime in days
pub const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    iat: i64,
    exp: i64,
}

/// Issues and verifies device tokens with a process-wide secret
#[derive(Clone)]
pub struct TokenAuthority {
    /// Keyed MAC, cloned for every sign/verify
    mac: HmacSha256,
    lifetime: Duration,
}

impl TokenAuthority {
    /// Create an authority from a configured secret
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration) -> Self {
        let mac =
            HmacSha256::new_from_slice(secret.as_ref()).expect("HMAC key can be any length");
        Self { mac, lifetime }
    }

    /// Create an authority with a random 32-byte secret
    ///
    /// Tokens issued by it stop verifying once the process exits.
    pub fn with_random_secret(lifetime: Duration) -> Self {
        let secret: [u8; 32] = rand::thread_rng().gen();
        Self::new(secret, lifetime)
    }

    /// Issue a token for `device_id`, valid from now for the configured lifetime
    pub fn issue(&self, device_id: &DeviceId) -> Credential {
        self.issue_at(device_id, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, device_id: &DeviceId, now: DateTime<Utc>) -> Credential {
        let claims = serde_json::json!({
            "sub": device_id.as_str(),
            "iat": now.timestamp(),
            "exp": (now + self.lifetime).timestamp(),
        });
        let payload = BASE64URL.encode(claims.to_string());
        let signature = BASE64URL.encode(self.sign(payload.as_bytes()));

        Credential {
            device_id: device_id.clone(),
            token: format!("{}.{}", payload, signature),
            issued_at: now,
        }
    }

    /// Verify a token and return the device identifier it was issued to
    ///
    /// Bad encoding, foreign secrets, tampering and expiry all yield
    /// [`PairingError::InvalidToken`].
    pub fn verify(&self, token: &str) -> PairingResult<DeviceId> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against the clock value `now`
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> PairingResult<DeviceId> {
        let (payload, signature) = token.split_once('.').ok_or(PairingError::InvalidToken)?;

        let signature = BASE64URL
            .decode(signature)
            .map_err(|_| PairingError::InvalidToken)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| PairingError::InvalidToken)?;

        let claims: Claims = BASE64URL
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(PairingError::InvalidToken)?;

        if claims.exp <= now.timestamp() {
            debug!("Rejected expired token for {}", claims.sub);
            return Err(PairingError::InvalidToken);
        }

        DeviceId::new(claims.sub).map_err(|_| PairingError::InvalidToken)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(b"test-secret", Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS))
    }

    fn device(id: &str) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let authority = authority();
        for id in ["dev-1", "a", "ünïcødé device", "with.dots.and spaces"] {
            let credential = authority.issue(&device(id));
            assert_eq!(credential.device_id, device(id));
            assert_eq!(authority.verify(&credential.token).unwrap(), device(id));
        }
    }

    #[test]
    fn test_any_single_byte_change_is_rejected() {
        let authority = authority();
        let token = authority.issue(&device("dev-1")).token;

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(
                matches!(authority.verify(&tampered), Err(PairingError::InvalidToken)),
                "tampered byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let ours = authority();
        let theirs = TokenAuthority::new(b"other-secret", Duration::days(365));
        let token = theirs.issue(&device("dev-1")).token;
        assert!(matches!(ours.verify(&token), Err(PairingError::InvalidToken)));
    }

    #[test]
    fn test_expiry() {
        let authority = authority();
        let issued = Utc::now();
        let token = authority.issue_at(&device("dev-1"), issued).token;

        let almost = issued + Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS) - Duration::seconds(1);
        assert!(authority.verify_at(&token, almost).is_ok());

        let expired = issued + Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS);
        assert!(matches!(
            authority.verify_at(&token, expired),
            Err(PairingError::InvalidToken)
        ));
    }

    #[test]
    fn test_malformed_input() {
        let authority = authority();
        for junk in ["", ".", "no-separator", "a.b", "!!!.???", "e30.e30"] {
            assert!(matches!(
                authority.verify(junk),
                Err(PairingError::InvalidToken)
            ));
        }
    }

    #[test]
    fn test_signed_empty_subject_is_rejected() {
        let authority = authority();
        let claims = serde_json::json!({"sub": "", "iat": 0, "exp": i64::MAX}).to_string();
        let payload = BASE64URL.encode(claims);
        let token = format!("{}.{}", payload, BASE64URL.encode(authority.sign(payload.as_bytes())));
        assert!(matches!(authority.verify(&token), Err(PairingError::InvalidToken)));
    }

    #[test]
    fn test_random_secrets_differ() {
        let a = TokenAuthority::with_random_secret(Duration::days(1));
        let b = TokenAuthority::with_random_secret(Duration::days(1));
        let token = a.issue(&device("dev-1")).token;
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }
}
