//! Pairing registry
//!
//! Keeps the current credential per device identifier so that pairing the same
//! device twice hands back the same token. The registry lives only in memory;
//! tokens it handed out keep verifying after a restart or an unpair because
//! verification never consults it.

use crate::device::{Credential, DeviceId};
use crate::token::TokenAuthority;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Pairing errors
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("deviceId is required")]
    EmptyDeviceId,
}

pub type PairingResult<T> = Result<T, PairingError>;

/// In-memory map from device identifier to its current credential
pub struct PairingRegistry {
    authority: Arc<TokenAuthority>,
    pairs: RwLock<HashMap<DeviceId, Credential>>,
}

impl PairingRegistry {
    /// Create an empty registry issuing through `authority`
    pub fn new(authority: Arc<TokenAuthority>) -> Self {
        Self {
            authority,
            pairs: RwLock::new(HashMap::new()),
        }
    }

    /// Pair a device, returning its existing credential if it has one
    ///
    /// Lookup, issue and insert happen under one write lock, so concurrent
    /// calls for the same device always agree on a single credential.
    pub async fn pair(&self, device_id: DeviceId) -> Credential {
        let mut pairs = self.pairs.write().await;
        if let Some(existing) = pairs.get(&device_id) {
            return existing.clone();
        }

        let credential = self.authority.issue(&device_id);
        pairs.insert(device_id.clone(), credential.clone());
        info!("Device {} paired", device_id);
        credential
    }

    /// Current credential for a device, if paired
    pub async fn lookup(&self, device_id: &DeviceId) -> Option<Credential> {
        let pairs = self.pairs.read().await;
        pairs.get(device_id).cloned()
    }

    /// Forget a device's credential. Returns whether one existed.
    ///
    /// The token itself stays valid until it expires.
    pub async fn unpair(&self, device_id: &DeviceId) -> bool {
        let removed = self.pairs.write().await.remove(device_id).is_some();
        if removed {
            info!("Device {} unpaired", device_id);
        }
        removed
    }

    /// Verify a token and return the device it was issued to
    pub fn verify_token(&self, token: &str) -> PairingResult<DeviceId> {
        self.authority.verify(token)
    }

    /// Number of paired devices
    pub async fn len(&self) -> usize {
        self.pairs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pairs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_registry() -> PairingRegistry {
        let authority = Arc::new(TokenAuthority::new(b"test-secret", Duration::days(365)));
        PairingRegistry::new(authority)
    }

    fn device(id: &str) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_pair_is_idempotent() {
        let registry = create_test_registry();

        let first = registry.pair(device("dev-1")).await;
        let second = registry.pair(device("dev-1")).await;
        assert_eq!(first, second);
        assert_eq!(registry.len().await, 1);

        assert_eq!(registry.verify_token(&first.token).unwrap(), device("dev-1"));
    }

    #[tokio::test]
    async fn test_lookup() {
        let registry = create_test_registry();
        assert!(registry.lookup(&device("dev-1")).await.is_none());

        let credential = registry.pair(device("dev-1")).await;
        assert_eq!(registry.lookup(&device("dev-1")).await, Some(credential));
        assert!(registry.lookup(&device("dev-2")).await.is_none());
    }

    #[tokio::test]
    async fn test_unpair() {
        let registry = create_test_registry();
        let credential = registry.pair(device("dev-1")).await;

        assert!(registry.unpair(&device("dev-1")).await);
        assert!(!registry.unpair(&device("dev-1")).await);
        assert!(registry.is_empty().await);

        // Unpairing forgets the record but the token still verifies
        assert_eq!(
            registry.verify_token(&credential.token).unwrap(),
            device("dev-1")
        );
    }

    #[tokio::test]
    async fn test_repair_after_unpair_issues_new_record() {
        let registry = create_test_registry();
        let first = registry.pair(device("dev-1")).await;
        registry.unpair(&device("dev-1")).await;

        let second = registry.pair(device("dev-1")).await;
        assert_eq!(registry.lookup(&device("dev-1")).await, Some(second.clone()));
        assert!(second.issued_at >= first.issued_at);
    }

    #[tokio::test]
    async fn test_concurrent_pairs_agree() {
        let registry = Arc::new(create_test_registry());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.pair(device("shared")).await })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().token);
        }
        tokens.dedup();
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_invalid_token() {
        let registry = create_test_registry();
        assert!(matches!(
            registry.verify_token("garbage"),
            Err(PairingError::InvalidToken)
        ));
    }
}
