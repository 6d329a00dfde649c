//! WebSocket protocol message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Messages sent from a client to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// In-band authentication handshake
    ///
    /// Absent or non-string fields decode as `None` so that every frame typed
    /// `authenticate` is answered, even one without a usable token.
    Authenticate {
        /// Token issued by `/api/pair`
        #[serde(default, deserialize_with = "string_or_none")]
        token: Option<String>,
        /// `"mobile"` for the uploading side; anything else means desktop
        #[serde(
            default,
            deserialize_with = "string_or_none",
            skip_serializing_if = "Option::is_none"
        )]
        role: Option<String>,
    },
    /// Any message type the gateway does not handle
    #[serde(other)]
    Unknown,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Handshake replies sent from the gateway to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication succeeded
    Authenticated {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    /// Authentication failed; the connection is closed right after
    AuthError { message: String },
}

/// Events routed to a device's receiver by background work
///
/// Timestamps are taken by the producer when the outcome is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// Text extracted from an uploaded image
    OcrResult {
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// Text extraction failed
    OcrError {
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The device identifier was unpaired
    Unpaired {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DeviceEvent {
    pub fn ocr_result(text: impl Into<String>) -> Self {
        DeviceEvent::OcrResult {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn ocr_error(error: impl Into<String>) -> Self {
        DeviceEvent::OcrError {
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn unpaired() -> Self {
        DeviceEvent::Unpaired {
            message: "Device has been unpaired".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Wire name of the event, as found in its `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::OcrResult { .. } => "ocr_result",
            DeviceEvent::OcrError { .. } => "ocr_error",
            DeviceEvent::Unpaired { .. } => "unpaired",
        }
    }
}
