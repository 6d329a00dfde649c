//! Configuration types for OcrLink

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted token lifetime, in days
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 36_500;

/// Main configuration for OcrLink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Lifetime of issued pairing tokens, in days
    pub token_lifetime_days: i64,
    /// Seconds between liveness sweeps over open WebSocket connections
    pub heartbeat_interval_secs: u64,
    /// Largest accepted image upload in bytes
    pub max_upload_bytes: usize,
    /// Directory where uploads are written while OCR runs
    pub upload_dir: PathBuf,
    /// Reject WebSocket handshakes that omit `role` instead of assuming desktop
    pub require_explicit_role: bool,
    /// Tesseract language code
    pub ocr_language: String,
    /// Path or name of the tesseract executable
    pub tesseract_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            token_lifetime_days: 365,
            heartbeat_interval_secs: 30,
            max_upload_bytes: 10 * 1024 * 1024,
            upload_dir: PathBuf::from("uploads"),
            require_explicit_role: false,
            ocr_language: "eng".to_string(),
            tesseract_path: "tesseract".to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set token lifetime in days
    pub fn with_token_lifetime_days(mut self, days: i64) -> Self {
        self.token_lifetime_days = days;
        self
    }

    /// Builder pattern: set liveness sweep interval in seconds
    pub fn with_heartbeat_interval_secs(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    /// Builder pattern: set upload size limit
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Builder pattern: set upload directory
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Builder pattern: require clients to declare their role
    pub fn with_require_explicit_role(mut self, require: bool) -> Self {
        self.require_explicit_role = require;
        self
    }

    /// Builder pattern: set OCR language
    pub fn with_ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr_language = language.into();
        self
    }

    /// Builder pattern: set tesseract executable
    pub fn with_tesseract_path(mut self, path: impl Into<String>) -> Self {
        self.tesseract_path = path.into();
        self
    }

    /// Token lifetime as a chrono duration
    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.token_lifetime_days)
    }

    /// Liveness sweep interval
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> crate::Result<()> {
        if self.token_lifetime_days <= 0 {
            return Err(crate::Error::Config(
                "token lifetime must be at least one day".to_string(),
            ));
        }
        if self.token_lifetime_days > MAX_TOKEN_LIFETIME_DAYS {
            return Err(crate::Error::Config(format!(
                "token lifetime must not exceed {} days",
                MAX_TOKEN_LIFETIME_DAYS
            )));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(crate::Error::Config(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(crate::Error::Config(
                "upload limit must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.token_lifetime().num_days(), 365);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(!config.require_explicit_role);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_port(8080)
            .with_heartbeat_interval_secs(5)
            .with_require_explicit_role(true)
            .with_upload_dir("/tmp/ocr");
        assert_eq!(config.port, 8080);
        assert_eq!(config.heartbeat_interval_secs, 5);
        assert!(config.require_explicit_role);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/ocr"));
    }

    #[test]
    fn test_validate_bounds_token_lifetime() {
        assert!(Config::new().with_token_lifetime_days(0).validate().is_err());
        assert!(Config::new()
            .with_token_lifetime_days(MAX_TOKEN_LIFETIME_DAYS)
            .validate()
            .is_ok());
        assert!(Config::new()
            .with_token_lifetime_days(MAX_TOKEN_LIFETIME_DAYS + 1)
            .validate()
            .is_err());
        assert!(Config::new()
            .with_token_lifetime_days(i64::MAX)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config::new().with_heartbeat_interval_secs(0);
        assert!(config.validate().is_err());
    }
}
