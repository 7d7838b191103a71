//! Extracted document content produced by format readers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text and structure read from one document.
///
/// Produced once per document by a reader and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Raw text, possibly empty.
    pub text: String,

    /// Number of pages (sheets for spreadsheets, 1 when unpaginated).
    pub page_count: u32,

    /// Encryption state as reported by the reader.
    pub encryption: EncryptionStatus,

    /// No text layer was found (scanned PDF, image).
    pub scanned: bool,

    /// Where the text came from.
    pub text_source: TextSource,

    /// Positional text, when the reader can provide it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spans: Option<Vec<TextSpan>>,

    /// Basic file metadata.
    pub metadata: FileMetadata,

    /// Name of the strategy that read the document.
    pub reader: String,

    /// Non-fatal issues found while reading.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ExtractedDocument {
    /// Create an empty document read by `reader`.
    pub fn empty(reader: impl Into<String>, metadata: FileMetadata) -> Self {
        Self {
            text: String::new(),
            page_count: 1,
            encryption: EncryptionStatus::NotEncrypted,
            scanned: false,
            text_source: TextSource::None,
            spans: None,
            metadata,
            reader: reader.into(),
            warnings: Vec::new(),
        }
    }

    /// Whether any non-whitespace text was extracted.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Whether zone extraction can run against this document.
    pub fn has_positions(&self) -> bool {
        self.spans.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// Encryption state of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStatus {
    #[default]
    NotEncrypted,
    Encrypted,
    /// The reader could not tell; treated as not encrypted.
    Unknown,
}

impl EncryptionStatus {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, EncryptionStatus::Encrypted)
    }
}

/// Origin of a document's text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Text layer of the document itself.
    Native,
    /// Text produced by an OCR engine.
    Ocr,
    /// No text available.
    #[default]
    None,
}

/// A run of text with its position on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    /// Page number (1-indexed).
    pub page: u32,

    /// Left edge.
    pub x: f32,

    /// Top edge (top-left origin).
    pub y: f32,

    pub width: f32,

    pub height: f32,

    /// Text content.
    pub text: String,
}

impl TextSpan {
    /// Get the center point of the span.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Sort spans by reading order (top-to-bottom, left-to-right).
///
/// A span joins the current row when its top is within `row_tolerance`
/// of the row's first span, so rows never split on fixed boundaries.
pub fn sort_by_reading_order(spans: &mut [&TextSpan], row_tolerance: f32) {
    let ordered: Vec<&TextSpan> = group_rows(spans, row_tolerance).into_iter().flatten().collect();
    spans.copy_from_slice(&ordered);
}

/// Join spans into text: spans on one row are separated by spaces, rows
/// by newlines. The spans are sorted into reading order first.
pub fn join_spans(spans: &mut [&TextSpan], row_tolerance: f32) -> String {
    let rows = group_rows(spans, row_tolerance);

    let text = rows
        .iter()
        .map(|row| row.iter().map(|s| s.text.trim()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    let ordered: Vec<&TextSpan> = rows.into_iter().flatten().collect();
    spans.copy_from_slice(&ordered);
    text
}

/// Rows of spans, top to bottom, each ordered left to right.
fn group_rows<'a>(spans: &[&'a TextSpan], row_tolerance: f32) -> Vec<Vec<&'a TextSpan>> {
    let tolerance = row_tolerance.max(1.0);
    let mut sorted = spans.to_vec();
    sorted.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });

    let mut rows: Vec<Vec<&TextSpan>> = Vec::new();
    let mut row_start: Option<(u32, f32)> = None;

    for span in sorted {
        match row_start {
            Some((page, y)) if page == span.page && span.y - y <= tolerance => {
                if let Some(row) = rows.last_mut() {
                    row.push(span);
                }
            }
            _ => {
                row_start = Some((span.page, span.y));
                rows.push(vec![span]);
            }
        }
    }

    for row in &mut rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows
}

/// Basic file metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: PathBuf,

    pub file_name: String,

    pub size_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    pub mime_type: String,

    /// Format-specific properties (title, author, sheet names, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl FileMetadata {
    /// Build metadata from the file system entry at `path`.
    pub fn from_path(path: &Path, mime_type: &str) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: meta.len(),
            created: meta.created().ok().map(DateTime::<Utc>::from),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            mime_type: mime_type.to_string(),
            properties: BTreeMap::new(),
        })
    }
}
