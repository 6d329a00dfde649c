//! OcrLink Core - Shared types and protocol definitions
//!
//! This crate provides the configuration, error type and WebSocket message
//! types used across all OcrLink components.

pub mod config;
pub mod error;
pub mod protocol;

pub use config::Config;
pub use error::{Error, Result};
pub use protocol::{ClientMessage, DeviceEvent, ServerMessage};
