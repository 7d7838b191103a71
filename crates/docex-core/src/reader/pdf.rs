//! PDF reader using lopdf and pdf-extract.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use lopdf::{Document, Object};
use tracing::{debug, warn};

use super::pdf_layout::extract_spans;
use super::{io_error, validate_common, FormatStrategy, ReaderLimits, Result, ValidationReport, PDF_MAGIC};
use crate::error::ReaderError;
use crate::models::document::{
    join_spans, EncryptionStatus, ExtractedDocument, FileMetadata, TextSource, TextSpan,
};
use crate::ocr::OcrEngine;

const NAME: &str = "pdf";
const MIME: &str = "application/pdf";
const EXTENSIONS: &[&str] = &["pdf"];

/// PDF document reader.
pub struct PdfReader {
    /// Minimum text length to consider the PDF as having a text layer.
    min_text_length: usize,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl PdfReader {
    /// Create a PDF reader; `ocr` handles PDFs without a text layer.
    pub fn new(min_text_length: usize, ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self {
            min_text_length,
            ocr,
        }
    }
}

impl Default for PdfReader {
    fn default() -> Self {
        Self::new(50, None)
    }
}

impl FormatStrategy for PdfReader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        100
    }

    fn extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn validate(&self, path: &Path, limits: &ReaderLimits) -> ValidationReport {
        validate_common(path, limits, "PDF", |header| header.starts_with(PDF_MAGIC))
    }

    fn process(&self, path: &Path) -> Result<ExtractedDocument> {
        let data = std::fs::read(path).map_err(|e| io_error(path, e))?;
        let metadata = FileMetadata::from_path(path, MIME).map_err(|e| io_error(path, e))?;

        let doc =
            Document::load_mem(&data).map_err(|e| ReaderError::corrupt(path, e.to_string()))?;

        self.read_document(path, doc, data, metadata)
    }
}

impl PdfReader {
    /// Read text from a parsed document; `data` holds the bytes it was parsed from.
    fn read_document(
        &self,
        path: &Path,
        mut doc: Document,
        data: Vec<u8>,
        metadata: FileMetadata,
    ) -> Result<ExtractedDocument> {
        let mut out = ExtractedDocument::empty(NAME, metadata);
        out.page_count = doc.get_pages().len() as u32;

        // Handle PDFs with empty password encryption
        let raw = if doc.is_encrypted() {
            out.encryption = EncryptionStatus::Encrypted;
            if doc.decrypt("").is_err() {
                out.warnings
                    .push("document is password protected; no text extracted".to_string());
                return Ok(out);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted).map_err(|e| {
                ReaderError::corrupt(path, format!("failed to save decrypted PDF: {}", e))
            })?;
            decrypted
        } else {
            data
        };

        if out.page_count == 0 {
            out.warnings.push("document has no pages".to_string());
            return Ok(out);
        }

        out.metadata.properties = info_properties(&doc);
        let spans = extract_spans(&doc);
        let text = extract_text(&raw, &spans, &mut out.warnings);
        let has_images = has_image_objects(&doc);

        debug!(
            "PDF analysis: {} pages, {} chars text, {} spans, images={}",
            out.page_count,
            text.trim().len(),
            spans.len(),
            has_images
        );

        if text.trim().len() < self.min_text_length && has_images {
            out.scanned = true;
            out.warnings.push("no text layer detected".to_string());

            match &self.ocr {
                Some(engine) => match engine.recognize(path) {
                    Ok(result) => {
                        debug!(
                            "OCR ({}) recognized {} chars in {}ms",
                            engine.name(),
                            result.text.len(),
                            result.processing_time_ms
                        );
                        let spans = result.spans_in_points();
                        out.text = result.text;
                        out.text_source = TextSource::Ocr;
                        out.spans = (!spans.is_empty()).then_some(spans);
                        return Ok(out);
                    }
                    Err(e) => {
                        warn!("OCR failed for {}: {}", path.display(), e);
                        out.warnings.push(format!("OCR failed: {}", e));
                    }
                },
                None => out
                    .warnings
                    .push("OCR is not enabled; scanned content was not read".to_string()),
            }
        }

        if text.trim().is_empty() {
            if !out.scanned {
                out.warnings.push("document contains no text".to_string());
            }
        } else {
            out.text_source = TextSource::Native;
        }
        out.text = text;
        out.spans = (!spans.is_empty()).then_some(spans);
        Ok(out)
    }
}

/// Extract text with pdf-extract, falling back to positional spans when it
/// fails. pdf-extract panics on some malformed fonts, so the call is isolated.
fn extract_text(raw: &[u8], spans: &[TextSpan], warnings: &mut Vec<String>) -> String {
    let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(raw)));

    match extracted {
        Ok(Ok(text)) if !text.trim().is_empty() => return text,
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warnings.push(format!("text extraction failed: {}", e)),
        Err(_) => warnings.push("text extraction aborted on a malformed font".to_string()),
    }

    let mut refs: Vec<&TextSpan> = spans.iter().collect();
    join_spans(&mut refs, 5.0)
}

fn has_image_objects(doc: &Document) -> bool {
    doc.objects.values().any(|object| match object {
        Object::Stream(stream) => matches!(
            stream.dict.get(b"Subtype").and_then(|o| o.as_name()),
            Ok(name) if name == b"Image".as_slice()
        ),
        _ => false,
    })
}

/// Title, author and similar entries from the document information dictionary.
fn info_properties(doc: &Document) -> std::collections::BTreeMap<String, String> {
    let mut properties = std::collections::BTreeMap::new();

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    if let Some(info) = info {
        for key in ["Title", "Author", "Subject", "Creator", "Producer"] {
            if let Ok(Object::String(bytes, _)) = info.get(key.as_bytes()) {
                let value = String::from_utf8_lossy(bytes).trim().to_string();
                if !value.is_empty() {
                    properties.insert(key.to_lowercase(), value);
                }
            }
        }
    }

    properties
}
