//! Shared application state

use ocrlink_auth::{DeviceId, PairingRegistry, TokenAuthority};
use ocrlink_core::{Config, DeviceEvent};
use ocrlink_ocr::{OcrPipeline, TextExtractor};
use std::sync::Arc;
use tracing::info;

use crate::gateway::Gateway;

/// State handed to every HTTP and WebSocket handler
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Device identifier -> current credential
    pub registry: Arc<PairingRegistry>,
    /// Live connections and the receiver table
    pub gateway: Arc<Gateway>,
    /// Background text extraction reporting to the gateway
    pub pipeline: OcrPipeline,
}

impl AppState {
    /// Create a new application state
    pub fn new(
        config: Config,
        registry: Arc<PairingRegistry>,
        gateway: Arc<Gateway>,
        pipeline: OcrPipeline,
    ) -> Self {
        Self {
            config,
            registry,
            gateway,
            pipeline,
        }
    }

    /// Wire a registry, gateway and pipeline around one token authority
    pub fn build(
        config: Config,
        authority: Arc<TokenAuthority>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let registry = Arc::new(PairingRegistry::new(authority.clone()));
        let gateway = Arc::new(
            Gateway::new(authority).with_require_explicit_role(config.require_explicit_role),
        );
        let pipeline = OcrPipeline::new(extractor, gateway.clone());
        Self::new(config, registry, gateway, pipeline)
    }

    /// Verify a bearer token
    pub fn validate_token(&self, token: &str) -> Option<DeviceId> {
        self.registry.verify_token(token).ok()
    }

    /// Unpair a device: forget its credential, tell its desktop, then close it
    ///
    /// Returns whether the device had been paired.
    pub async fn unpair_device(&self, device_id: &DeviceId) -> bool {
        let removed = self.registry.unpair(device_id).await;
        if self
            .gateway
            .disconnect_device(device_id, &DeviceEvent::unpaired())
        {
            info!("Sent unpaired to desktop {}", device_id);
        }
        removed
    }
}
