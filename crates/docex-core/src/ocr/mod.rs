//! OCR collaborator contract.
//!
//! Readers delegate documents without a text layer to an [`OcrEngine`].
//! OCR output is treated exactly like native text downstream.

mod tesseract;

pub use tesseract::TesseractEngine;

use std::path::Path;

use crate::error::OcrError;
use crate::models::document::TextSpan;

/// Result of OCR processing on a document.
#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    /// Full recognized text.
    pub text: String,

    /// Recognized words or lines with their positions.
    pub spans: Vec<TextSpan>,

    /// Resolution the spans were measured at, in pixels per inch.
    /// `None` when the spans are already in document units.
    pub raster_dpi: Option<u32>,

    /// Number of pages recognized.
    pub page_count: u32,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl OcrResult {
    /// Spans converted to points (1/72 inch), the unit of native PDF text.
    pub fn spans_in_points(&self) -> Vec<TextSpan> {
        let Some(dpi) = self.raster_dpi.filter(|d| *d > 0) else {
            return self.spans.clone();
        };
        let dpi = dpi as f32;
        let to_points = |v: f32| v * 72.0 / dpi;
        self.spans
            .iter()
            .map(|s| TextSpan {
                page: s.page,
                x: to_points(s.x),
                y: to_points(s.y),
                width: to_points(s.width),
                height: to_points(s.height),
                text: s.text.clone(),
            })
            .collect()
    }
}

/// An OCR backend.
pub trait OcrEngine: Send + Sync {
    /// Backend name for logs and warnings.
    fn name(&self) -> &str;

    /// Recognize text in the document at `path` (image or PDF).
    fn recognize(&self, path: &Path) -> Result<OcrResult, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(x: f32, y: f32) -> TextSpan {
        TextSpan { page: 1, x, y, width: 250.0, height: 40.0, text: "SEC-2025-001".to_string() }
    }

    #[test]
    fn test_raster_spans_scaled_to_points() {
        let result = OcrResult { spans: vec![word(300.0, 600.0)], raster_dpi: Some(300), ..Default::default() };
        let spans = result.spans_in_points();
        assert_eq!(spans[0].x, 72.0);
        assert_eq!(spans[0].y, 144.0);
        assert_eq!(spans[0].width, 60.0);
        assert_eq!(spans[0].height, 9.6);
    }

    #[test]
    fn test_document_unit_spans_unchanged() {
        let result = OcrResult { spans: vec![word(300.0, 600.0)], ..Default::default() };
        assert_eq!(result.spans_in_points(), result.spans);
    }
}
