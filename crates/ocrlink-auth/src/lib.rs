//! OcrLink Auth - Device pairing and signed credentials
//!
//! Pairing binds a caller-chosen device identifier to a signed, time-bounded
//! token. The same token authenticates the desktop's WebSocket connection and
//! the phone's HTTP uploads.
//!
//! # Pairing Flow
//!
//! 1. A device calls `POST /api/pair` with its identifier
//! 2. `PairingRegistry::pair()` returns the existing credential, or asks the
//!    `TokenAuthority` to issue one
//! 3. The desktop authenticates its WebSocket with the token
//! 4. The phone sends the same token as a bearer credential when uploading
//!
//! Tokens are HMAC-signed and verified without touching the registry, so they
//! survive an unpair (and a restart) until they expire.
//!
//! # Example
//!
//! ```no_run
//! use ocrlink_auth::{DeviceId, PairingRegistry, TokenAuthority};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let authority = Arc::new(TokenAuthority::new(b"secret", chrono::Duration::days(365)));
//!     let registry = PairingRegistry::new(authority.clone());
//!
//!     let device = DeviceId::new("living-room-pc").unwrap();
//!     let credential = registry.pair(device).await;
//!
//!     let verified = authority.verify(&credential.token).unwrap();
//!     println!("token belongs to {}", verified);
//! }
//! ```

pub mod device;
pub mod pairing;
pub mod token;

pub use device::{Credential, DeviceId, Role};
pub use pairing::{PairingError, PairingRegistry, PairingResult};
pub use token::{TokenAuthority, DEFAULT_TOKEN_LIFETIME_DAYS};
