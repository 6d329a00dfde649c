//! HTTP request handlers
//!
//! Pairing API, image upload and server info. The WebSocket gateway is
//! mounted on `/ws` and on `/`.

use axum::{
    async_trait,
    extract::{multipart::MultipartError, DefaultBodyLimit, FromRequestParts, Multipart, State},
    extract::rejection::JsonRejection,
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use ocrlink_auth::DeviceId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Room for multipart boundaries and headers on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        // WebSocket gateway
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        // Pairing API
        .route("/api/pair", post(pair_handler))
        .route("/api/unpair", post(unpair_handler))
        // Uploads
        .route("/api/ocr", post(ocr_handler))
        // Server info
        .route("/api/info", get(server_info_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Bearer authentication
// ============================================================================

/// Device identifier resolved from an `Authorization: Bearer` token
pub struct AuthenticatedDevice(pub DeviceId);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedDevice {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::MissingCredential)?;

        state
            .validate_token(token)
            .map(AuthenticatedDevice)
            .ok_or(ApiError::InvalidCredential)
    }
}

// ============================================================================
// Pairing API Handlers
// ============================================================================

/// Request body for `POST /api/pair`
#[derive(Debug, Deserialize)]
pub struct PairRequest {
    #[serde(rename = "deviceId", default)]
    device_id: Option<String>,
}

/// Response for `POST /api/pair`
#[derive(Debug, Serialize, Deserialize)]
pub struct PairResponse {
    pub success: bool,
    pub token: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

/// Acknowledgement returned by unpair and upload
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

impl AckResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

/// Pair a device identifier, returning its existing token if already paired
async fn pair_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<PairRequest>, JsonRejection>,
) -> Result<Json<PairResponse>, ApiError> {
    let device_id = request
        .ok()
        .and_then(|Json(request)| request.device_id)
        .and_then(|id| DeviceId::new(id).ok())
        .ok_or_else(|| ApiError::BadRequest("deviceId is required".to_string()))?;

    let credential = state.registry.pair(device_id).await;

    Ok(Json(PairResponse {
        success: true,
        token: credential.token,
        device_id: credential.device_id.to_string(),
    }))
}

/// Unpair the device named by the bearer token and notify its desktop
async fn unpair_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedDevice(device_id): AuthenticatedDevice,
) -> Json<AckResponse> {
    let was_paired = state.unpair_device(&device_id).await;
    debug!("Unpair {} (was paired: {})", device_id, was_paired);
    AckResponse::ok("Device unpaired successfully")
}

// ============================================================================
// Upload Handler
// ============================================================================

/// Accept an image and start OCR; the result arrives over the WebSocket
async fn ocr_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedDevice(device_id): AuthenticatedDevice,
    mut multipart: Multipart,
) -> Result<Json<AckResponse>, ApiError> {
    let mut saved = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let extension = image_extension(
            field.file_name().unwrap_or_default(),
            field.content_type().unwrap_or_default(),
        )
        .ok_or(ApiError::UnsupportedMediaType)?;

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > state.config.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge);
        }

        let upload_dir = &state.config.upload_dir;
        tokio::fs::create_dir_all(upload_dir).await?;
        let path = upload_dir.join(format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        ));
        tokio::fs::write(&path, &data).await?;

        saved = Some(path);
        break;
    }

    let path = saved.ok_or_else(|| ApiError::BadRequest("No image uploaded".to_string()))?;

    info!("Image received for {}, processing OCR", device_id);
    // Outcome is reported to the desktop, not to this request
    drop(state.pipeline.submit(device_id, path));

    Ok(AckResponse::ok("Image received, processing OCR"))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// Normalized extension for an accepted image upload
///
/// Both the file extension and the declared content type must name JPEG or PNG.
fn image_extension(file_name: &str, content_type: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())?;

    let content_type = content_type.to_ascii_lowercase();
    let mime_ok = matches!(
        content_type.as_str(),
        "image/jpeg" | "image/jpg" | "image/png"
    );
    if !mime_ok {
        return None;
    }

    match extension.as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        _ => None,
    }
}

// ============================================================================
// Server Info
// ============================================================================

/// Server information response
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server version
    pub version: String,
    /// Number of paired device identifiers
    pub paired_devices: usize,
    /// Number of devices with a connected desktop
    pub connected_receivers: usize,
    /// Number of open WebSocket connections
    pub connections: usize,
}

async fn server_info_handler(State(state): State<Arc<AppState>>) -> Json<ServerInfo> {
    Json(ServerInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        paired_devices: state.registry.len().await,
        connected_receivers: state.gateway.receiver_count(),
        connections: state.gateway.connection_count(),
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
