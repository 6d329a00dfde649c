//! Text extraction engines

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{OcrError, OcrResult};
use crate::preprocess::preprocess_file;

/// Turns an image on disk into text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &Path) -> OcrResult<String>;
}

/// Runs the `tesseract` CLI on a preprocessed copy of the image
pub struct TesseractExtractor {
    binary: String,
    language: String,
}

impl TesseractExtractor {
    /// Create an extractor
    ///
    /// # Arguments
    /// * `binary` - Name or path of the tesseract executable
    /// * `language` - Tesseract language code, e.g. `eng`
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }

    /// Check if the tesseract executable can be launched
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    async fn recognize(&self, image: &Path) -> OcrResult<String> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", self.language.as_str()])
            .output()
            .await
            .map_err(|e| OcrError::EngineUnavailable(format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(OcrError::Engine(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn processed_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_owned();
    name.push(".processed.png");
    PathBuf::from(name)
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, image: &Path) -> OcrResult<String> {
        let input = image.to_path_buf();
        let processed = processed_path(image);

        let target = processed.clone();
        tokio::task::spawn_blocking(move || preprocess_file(&input, &target))
            .await
            .map_err(|e| OcrError::Task(e.to_string()))??;

        let result = self.recognize(&processed).await;

        if let Err(e) = tokio::fs::remove_file(&processed).await {
            warn!("Failed to remove {:?}: {}", processed, e);
        }

        let text = result?;
        debug!("Extracted {} characters from {:?}", text.len(), image);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_path() {
        assert_eq!(
            processed_path(Path::new("uploads/abc.jpg")),
            PathBuf::from("uploads/abc.jpg.processed.png")
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let extractor = TesseractExtractor::new("ocrlink-no-such-binary", "eng");
        assert!(!extractor.is_available().await);

        let err = extractor
            .recognize(Path::new("whatever.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable(_)));
    }
}
