//! Error types for the docex-core library.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::result::BatchResult;

/// Main error type for the docex library.
#[derive(Error, Debug)]
pub enum DocexError {
    /// Document reading error.
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Template definition or template source error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// OCR collaborator error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The batch was cancelled; carries the results of documents that ran.
    #[error(
        "batch cancelled after {} of {} documents",
        .0.processed_files,
        .0.total_files
    )]
    BatchCancelled(Box<BatchResult>),
}

/// Errors raised while reading a single document.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// No registered strategy claims the file.
    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The file is missing, locked or not readable.
    #[error("cannot access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is structurally invalid for its format.
    #[error("corrupt document {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl ReaderError {
    /// Build a file access error from an I/O error.
    pub fn access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReaderError::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Build a corruption error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ReaderError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReaderError::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
            ReaderError::FileAccess { .. } => ErrorCode::FileAccess,
            ReaderError::Corrupt { .. } => ErrorCode::CorruptDocument,
        }
    }
}

/// Errors related to template definitions and template sources.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// A template violates one of its invariants.
    #[error("invalid template '{id}': {reason}")]
    Invalid { id: String, reason: String },

    /// Two templates share the same id.
    #[error("duplicate template id: {0}")]
    DuplicateId(String),

    /// No template with this id exists.
    #[error("template not found: {0}")]
    NotFound(String),

    /// The template source could not be read.
    #[error("cannot read template source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template file could not be parsed.
    #[error("cannot parse template file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl TemplateError {
    pub(crate) fn invalid(id: &str, reason: impl Into<String>) -> Self {
        TemplateError::Invalid {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by an OCR collaborator.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR backend is not installed or not reachable.
    #[error("OCR backend not available: {0}")]
    Unavailable(String),

    /// The backend ran but failed.
    #[error("OCR failed: {0}")]
    Failed(String),

    /// I/O error while preparing OCR input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, user-facing error codes carried on results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnsupportedFormat,
    #[serde(rename = "FILE_ACCESS_ERROR")]
    FileAccess,
    CorruptDocument,
    NoTemplateMatch,
    #[serde(rename = "NO_EXTRACTION_METHOD_SUCCEEDED")]
    NoExtractionMethodSucceeded,
    BatchCancelled,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorCode {
    /// The wire/display form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorCode::FileAccess => "FILE_ACCESS_ERROR",
            ErrorCode::CorruptDocument => "CORRUPT_DOCUMENT",
            ErrorCode::NoTemplateMatch => "NO_TEMPLATE_MATCH",
            ErrorCode::NoExtractionMethodSucceeded => "NO_EXTRACTION_METHOD_SUCCEEDED",
            ErrorCode::BatchCancelled => "BATCH_CANCELLED",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether this code stops admission when a batch runs fail-fast.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCode::UnsupportedFormat
                | ErrorCode::FileAccess
                | ErrorCode::CorruptDocument
                | ErrorCode::Internal
        )
    }

    /// Guidance shown to users next to the error.
    pub fn remediation(&self) -> &'static str {
        match self {
            ErrorCode::UnsupportedFormat => {
                "Convert the document to PDF, DOCX, XLSX, an image or plain text"
            }
            ErrorCode::FileAccess => {
                "Check that the file exists, is not locked and is readable, then retry"
            }
            ErrorCode::CorruptDocument => {
                "Re-export or re-download the document; the file structure is damaged"
            }
            ErrorCode::NoTemplateMatch => {
                "Lower the template confidence threshold, add keywords, or enable OCR for scanned documents"
            }
            ErrorCode::NoExtractionMethodSucceeded => {
                "Adjust the zone coordinates, relax the regex pattern, or add proximity keywords"
            }
            ErrorCode::BatchCancelled => "Re-run the batch for the remaining documents",
            ErrorCode::Internal => "Report the document; an unexpected error occurred while reading it",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for the docex library.
pub type Result<T> = std::result::Result<T, DocexError>;
