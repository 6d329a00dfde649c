//! Background OCR jobs
//!
//! Each submitted image produces exactly one event: `ocr_result` with the text
//! or `ocr_error`. The uploaded file is deleted once the job finishes.

use ocrlink_auth::DeviceId;
use ocrlink_core::DeviceEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::extractor::TextExtractor;
use crate::sink::EventSink;

/// Message sent to the desktop when extraction fails
pub const OCR_FAILED_MESSAGE: &str = "OCR processing failed";

/// Runs extraction jobs and reports their outcome to an event sink
#[derive(Clone)]
pub struct OcrPipeline {
    extractor: Arc<dyn TextExtractor>,
    sink: Arc<dyn EventSink>,
}

impl OcrPipeline {
    pub fn new(extractor: Arc<dyn TextExtractor>, sink: Arc<dyn EventSink>) -> Self {
        Self { extractor, sink }
    }

    /// Start extracting text from `image` on behalf of `device_id`
    ///
    /// The returned handle resolves to whether the outcome reached a receiver.
    pub fn submit(&self, device_id: DeviceId, image: PathBuf) -> JoinHandle<bool> {
        let extractor = self.extractor.clone();
        let sink = self.sink.clone();

        tokio::spawn(async move {
            let event = match extractor.extract(&image).await {
                Ok(text) => {
                    info!("OCR finished for {} ({} chars)", device_id, text.len());
                    DeviceEvent::ocr_result(text)
                }
                Err(e) => {
                    warn!("OCR failed for {}: {}", device_id, e);
                    DeviceEvent::ocr_error(OCR_FAILED_MESSAGE)
                }
            };

            if let Err(e) = tokio::fs::remove_file(&image).await {
                warn!("Failed to remove upload {:?}: {}", image, e);
            }

            sink.emit(&device_id, &event)
        })
    }
}
