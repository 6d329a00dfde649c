//! OcrLink Server - Axum-based HTTP API and WebSocket gateway
//!
//! This crate provides the pairing endpoints, the image upload endpoint and
//! the persistent connection gateway that delivers OCR results to desktops.

pub mod error;
pub mod gateway;
pub mod http;
pub mod state;
pub mod tls;
pub mod websocket;

pub use error::ApiError;
pub use gateway::{ConnectionId, Gateway, Outbound};
pub use http::create_router;
pub use state::AppState;
pub use tls::{calculate_cert_fingerprint, create_rustls_config, load_or_generate_cert};
pub use websocket::handle_socket;
