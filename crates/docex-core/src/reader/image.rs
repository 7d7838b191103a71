//! Raster image reader. Images carry no text layer; text comes from OCR.

use std::path::Path;
use std::sync::Arc;

use ::image::ImageFormat;
use tracing::{debug, warn};

use super::{io_error, validate_common, FormatStrategy, ReaderLimits, Result, ValidationReport};
use crate::error::ReaderError;
use crate::models::document::{ExtractedDocument, FileMetadata, TextSource};
use crate::ocr::OcrEngine;

const NAME: &str = "image";
const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp"];

/// Reader for scanned pages and screenshots.
pub struct ImageReader {
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl ImageReader {
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { ocr }
    }
}

impl Default for ImageReader {
    fn default() -> Self {
        Self::new(None)
    }
}

impl FormatStrategy for ImageReader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        70
    }

    fn extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn validate(&self, path: &Path, limits: &ReaderLimits) -> ValidationReport {
        validate_common(path, limits, "image", |header| {
            ::image::guess_format(header).is_ok()
        })
    }

    fn process(&self, path: &Path) -> Result<ExtractedDocument> {
        let header = super::read_header(path, 32).map_err(|e| io_error(path, e))?;
        let format = ::image::guess_format(&header)
            .map_err(|e| ReaderError::corrupt(path, e.to_string()))?;
        let (width, height) = ::image::image_dimensions(path)
            .map_err(|e| ReaderError::corrupt(path, e.to_string()))?;

        let metadata =
            FileMetadata::from_path(path, format.to_mime_type()).map_err(|e| io_error(path, e))?;
        let mut out = ExtractedDocument::empty(NAME, metadata);
        out.scanned = true;
        out.metadata
            .properties
            .insert("dimensions".to_string(), format!("{}x{}", width, height));
        out.metadata
            .properties
            .insert("format".to_string(), format_name(format).to_string());

        debug!("Image {}: {:?} {}x{}", path.display(), format, width, height);

        let Some(engine) = &self.ocr else {
            out.warnings.push("no text layer detected".to_string());
            out.warnings
                .push("OCR is not enabled; image content was not read".to_string());
            return Ok(out);
        };

        match engine.recognize(path) {
            Ok(result) => {
                debug!(
                    "OCR ({}) recognized {} chars in {}ms",
                    engine.name(),
                    result.text.len(),
                    result.processing_time_ms
                );
                out.text = result.text;
                out.text_source = if out.text.trim().is_empty() {
                    TextSource::None
                } else {
                    TextSource::Ocr
                };
                out.spans = (!result.spans.is_empty()).then_some(result.spans);
            }
            Err(e) => {
                warn!("OCR failed for {}: {}", path.display(), e);
                out.warnings.push("no text layer detected".to_string());
                out.warnings.push(format!("OCR failed: {}", e));
            }
        }

        Ok(out)
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("unknown")
}
