//! Device identity and connection roles
//!
//! A device identifier names a pairing unit (one desktop plus its phone). It is
//! chosen by the caller and only has to be non-empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pairing::{PairingError, PairingResult};

/// Caller-chosen identifier shared by a paired desktop and mobile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier, rejecting the empty string
    pub fn new(id: impl Into<String>) -> PairingResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(PairingError::EmptyDeviceId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which side of a pair a connection speaks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Receives routed events
    #[default]
    Desktop,
    /// Uploads images; never routable
    Mobile,
}

impl Role {
    /// Resolve the role declared in a handshake.
    ///
    /// Only an exact `"mobile"` yields [`Role::Mobile`]; absent or unknown
    /// values, including other casings, fall back to desktop.
    pub fn from_declared(declared: Option<&str>) -> Self {
        match declared {
            Some("mobile") => Role::Mobile,
            _ => Role::Desktop,
        }
    }

    pub fn is_receiver(&self) -> bool {
        matches!(self, Role::Desktop)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Desktop => f.write_str("desktop"),
            Role::Mobile => f.write_str("mobile"),
        }
    }
}

/// A signed credential issued to a device identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub device_id: DeviceId,
    /// Opaque signed token, verifiable without any registry lookup
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_rejects_empty() {
        assert!(matches!(DeviceId::new(""), Err(PairingError::EmptyDeviceId)));
        assert_eq!(DeviceId::new("dev-1").unwrap().as_str(), "dev-1");
    }

    #[test]
    fn test_device_id_serializes_as_string() {
        let id = DeviceId::new("dev-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dev-1\"");
    }

    #[test]
    fn test_role_resolution() {
        assert_eq!(Role::from_declared(None), Role::Desktop);
        assert_eq!(Role::from_declared(Some("mobile")), Role::Mobile);
        assert_eq!(Role::from_declared(Some("MOBILE")), Role::Desktop);
        assert_eq!(Role::from_declared(Some("Mobile")), Role::Desktop);
        assert_eq!(Role::from_declared(Some("desktop")), Role::Desktop);
        assert_eq!(Role::from_declared(Some("tablet")), Role::Desktop);
        assert!(Role::Desktop.is_receiver());
        assert!(!Role::Mobile.is_receiver());
    }
}
