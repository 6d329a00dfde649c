//! OcrLink OCR - Text extraction for uploaded images
//!
//! The gateway does not care how text is produced. Work submitted to an
//! [`OcrPipeline`] runs in the background and reports exactly one
//! [`DeviceEvent`](ocrlink_core::DeviceEvent) per image to an [`EventSink`].

pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod preprocess;
pub mod sink;

pub use error::{OcrError, OcrResult};
pub use extractor::{TesseractExtractor, TextExtractor};
pub use pipeline::OcrPipeline;
pub use sink::EventSink;
