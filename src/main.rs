//! OcrLink - Snap text on your phone, get it on your desktop
//!
//! Pairs a phone and a desktop under one device identifier, accepts image
//! uploads from the phone and pushes the recognised text to the desktop over
//! a WebSocket.

use anyhow::Result;
use clap::Parser;
use ocrlink_auth::TokenAuthority;
use ocrlink_core::Config;
use ocrlink_ocr::TesseractExtractor;
use ocrlink_server::{
    calculate_cert_fingerprint, create_router, create_rustls_config, load_or_generate_cert,
    tls::default_cert_dir, AppState,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// OcrLink - relay OCR results from your phone to your desktop
#[derive(Parser, Debug)]
#[command(name = "ocrlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Secret used to sign pairing tokens (random per process if unset)
    #[arg(long, env = "OCRLINK_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Lifetime of pairing tokens in days
    #[arg(long, default_value = "365")]
    token_lifetime_days: i64,

    /// Seconds between WebSocket liveness sweeps
    #[arg(long, default_value = "30")]
    heartbeat_interval: u64,

    /// Directory for uploaded images while OCR runs
    #[arg(long, default_value = "uploads")]
    upload_dir: PathBuf,

    /// Maximum upload size in bytes
    #[arg(long, default_value = "10485760")]
    max_upload_bytes: usize,

    /// Reject WebSocket handshakes that do not declare a role
    #[arg(long)]
    require_role: bool,

    /// Tesseract executable
    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language
    #[arg(long, default_value = "eng")]
    language: String,

    /// Serve HTTPS/WSS
    #[arg(long)]
    tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("OcrLink v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::new()
        .with_port(args.port)
        .with_token_lifetime_days(args.token_lifetime_days)
        .with_heartbeat_interval_secs(args.heartbeat_interval)
        .with_upload_dir(args.upload_dir)
        .with_max_upload_bytes(args.max_upload_bytes)
        .with_require_explicit_role(args.require_role)
        .with_tesseract_path(args.tesseract)
        .with_ocr_language(args.language);
    config.validate()?;

    let authority = match &args.secret {
        Some(secret) => TokenAuthority::new(secret, config.token_lifetime()),
        None => {
            warn!("OCRLINK_SECRET not set; tokens will stop working when the server restarts");
            TokenAuthority::with_random_secret(config.token_lifetime())
        }
    };

    let extractor = TesseractExtractor::new(&config.tesseract_path, &config.ocr_language);
    if !extractor.is_available().await {
        warn!(
            "'{}' could not be launched; uploads will report ocr_error",
            config.tesseract_path
        );
    }

    if !config.require_explicit_role {
        info!("Clients that omit a role are treated as desktops");
    }

    let state = Arc::new(AppState::build(
        config.clone(),
        Arc::new(authority),
        Arc::new(extractor),
    ));

    let liveness_handle = state
        .gateway
        .spawn_liveness_task(config.heartbeat_interval());

    let router = create_router(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));

    if args.tls {
        let (cert_pem, key_pem) = match (&args.cert, &args.key) {
            (Some(cert_path), Some(key_path)) => {
                info!("Loading TLS certificate from files...");
                (
                    std::fs::read_to_string(cert_path)?,
                    std::fs::read_to_string(key_path)?,
                )
            }
            _ => {
                let dir = default_cert_dir()
                    .map_err(|e| anyhow::anyhow!("Failed to locate config directory: {}", e))?;
                load_or_generate_cert(&dir, &["localhost".to_string()])
                    .map_err(|e| anyhow::anyhow!("Failed to load/generate certificate: {}", e))?
            }
        };
        info!("Certificate fingerprint: {}", calculate_cert_fingerprint(&cert_pem));

        let tls_config = create_rustls_config(&cert_pem, &key_pem)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create TLS config: {}", e))?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        info!("Listening on https://{} (WebSocket on /ws)", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(router.into_make_service())
            .await?;
    } else {
        let shutdown = async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        };

        info!("Listening on http://{} (WebSocket on /ws)", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
    }

    liveness_handle.abort();
    info!("Goodbye!");
    Ok(())
}
