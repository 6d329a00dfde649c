//! End-to-end tests over a real WebSocket connection

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use ocrlink_auth::{DeviceId, TokenAuthority};
use ocrlink_core::{Config, DeviceEvent};
use ocrlink_ocr::{OcrResult, TextExtractor};
use ocrlink_server::{create_router, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct NoopExtractor;

#[async_trait]
impl TextExtractor for NoopExtractor {
    async fn extract(&self, _image: &Path) -> OcrResult<String> {
        Ok(String::new())
    }
}

async fn start_server() -> (Arc<AppState>, SocketAddr) {
    let authority = Arc::new(TokenAuthority::new(b"e2e-secret", chrono::Duration::days(365)));
    let state = Arc::new(AppState::build(
        Config::default(),
        authority,
        Arc::new(NoopExtractor),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (state, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

/// Next JSON text frame, skipping control frames
async fn next_json(client: &mut Client) -> Option<Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")?;
        match frame {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn authenticate(client: &mut Client, token: &str, role: Option<&str>) -> Option<Value> {
    let mut message = json!({ "type": "authenticate", "token": token });
    if let Some(role) = role {
        message["role"] = json!(role);
    }
    client
        .send(Message::Text(message.to_string()))
        .await
        .unwrap();
    next_json(client).await
}

async fn wait_for_receivers(state: &AppState, count: usize) {
    for _ in 0..100 {
        if state.gateway.receiver_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("receiver count never reached {}", count);
}

#[tokio::test]
async fn test_authenticate_and_receive_routed_event() {
    let (state, addr) = start_server().await;
    let token = state.registry.pair(DeviceId::new("dev-1").unwrap()).await.token;

    let mut desktop = connect(addr).await;

    // Garbage and unknown messages before the handshake are ignored
    desktop.send(Message::Text("{not json".into())).await.unwrap();
    desktop
        .send(Message::Text(r#"{"type":"hello"}"#.into()))
        .await
        .unwrap();

    let ack = authenticate(&mut desktop, &token, None).await.unwrap();
    assert_eq!(ack, json!({ "type": "authenticated", "deviceId": "dev-1" }));

    let device = DeviceId::new("dev-1").unwrap();
    assert!(state.gateway.route(&device, &DeviceEvent::ocr_result("abc")));

    let event = next_json(&mut desktop).await.unwrap();
    assert_eq!(event["type"], "ocr_result");
    assert_eq!(event["text"], "abc");
}

#[tokio::test]
async fn test_invalid_token_gets_error_and_close() {
    let (state, addr) = start_server().await;
    let mut client = connect(addr).await;

    let reply = authenticate(&mut client, "bogus", None).await.unwrap();
    assert_eq!(reply, json!({ "type": "auth_error", "message": "Invalid token" }));
    assert!(next_json(&mut client).await.is_none());
    assert_eq!(state.gateway.receiver_count(), 0);
}

#[tokio::test]
async fn test_reconnect_replaces_receiver() {
    let (state, addr) = start_server().await;
    let token = state.registry.pair(DeviceId::new("dev-1").unwrap()).await.token;
    let device = DeviceId::new("dev-1").unwrap();

    let mut first = connect(addr).await;
    authenticate(&mut first, &token, None).await.unwrap();
    let mut second = connect(addr).await;
    authenticate(&mut second, &token, None).await.unwrap();

    // The orphaned first connection closes; the second stays registered
    first.close(None).await.unwrap();
    drop(first);
    tokio::time::sleep(Duration::from_millis(100)).await;
    wait_for_receivers(&state, 1).await;

    assert!(state.gateway.route(&device, &json!({ "type": "ocr_result", "text": "x" })));
    assert_eq!(next_json(&mut second).await.unwrap()["text"], "x");
}

#[tokio::test]
async fn test_mobile_does_not_receive() {
    let (state, addr) = start_server().await;
    let token = state.registry.pair(DeviceId::new("dev-1").unwrap()).await.token;

    let mut mobile = connect(addr).await;
    let ack = authenticate(&mut mobile, &token, Some("mobile")).await.unwrap();
    assert_eq!(ack["type"], "authenticated");

    assert!(!state
        .gateway
        .route(&DeviceId::new("dev-1").unwrap(), &json!({ "type": "ocr_result" })));
}

#[tokio::test]
async fn test_desktop_close_removes_receiver() {
    let (state, addr) = start_server().await;
    let token = state.registry.pair(DeviceId::new("dev-1").unwrap()).await.token;

    let mut desktop = connect(addr).await;
    authenticate(&mut desktop, &token, None).await.unwrap();
    wait_for_receivers(&state, 1).await;

    desktop.close(None).await.unwrap();
    drop(desktop);
    wait_for_receivers(&state, 0).await;

    assert!(!state
        .gateway
        .route(&DeviceId::new("dev-1").unwrap(), &json!({})));
}
