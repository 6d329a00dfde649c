//! OCR error types

use thiserror::Error;

/// Errors that can occur while turning an image into text
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("Preprocessing task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OcrResult<T> = Result<T, OcrError>;
