//! Plain-text reader for logs, notes and exported reports.

use std::path::Path;

use super::{io_error, validate_common, FormatStrategy, ReaderLimits, Result, ValidationReport};
use crate::models::document::{ExtractedDocument, FileMetadata, TextSource};

const NAME: &str = "text";
const EXTENSIONS: &[&str] = &["txt", "text", "log", "md", "csv", "tsv"];

/// Reader for UTF-8 text files. Invalid sequences are replaced.
#[derive(Debug, Default)]
pub struct PlainTextReader;

impl PlainTextReader {
    pub fn new() -> Self {
        Self
    }
}

impl FormatStrategy for PlainTextReader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        10
    }

    fn extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn validate(&self, path: &Path, limits: &ReaderLimits) -> ValidationReport {
        // NUL bytes in the header mean a binary file behind a text extension.
        validate_common(path, limits, "text", |header| !header.contains(&0))
    }

    fn process(&self, path: &Path) -> Result<ExtractedDocument> {
        let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
        let metadata = FileMetadata::from_path(path, "text/plain").map_err(|e| io_error(path, e))?;
        let mut out = ExtractedDocument::empty(NAME, metadata);

        out.text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                out.warnings
                    .push("file is not valid UTF-8; invalid bytes were replaced".to_string());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        // Strip a UTF-8 byte order mark.
        if let Some(stripped) = out.text.strip_prefix('\u{feff}') {
            out.text = stripped.to_string();
        }

        if out.has_text() {
            out.text_source = TextSource::Native;
        } else {
            out.warnings.push("document contains no text".to_string());
        }
        Ok(out)
    }
}
