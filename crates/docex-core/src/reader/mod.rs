//! Document readers: one strategy per format, selected through a registry.

mod image;
mod pdf;
mod pdf_layout;
mod registry;
mod spreadsheet;
mod text;
mod word;

pub use self::image::ImageReader;
pub use pdf::PdfReader;
pub use registry::{ReaderRegistry, StrategyInfo};
pub use spreadsheet::SpreadsheetReader;
pub use text::PlainTextReader;
pub use word::WordReader;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::{ErrorCode, ReaderError};

/// Result type for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// PDF file signature.
pub const PDF_MAGIC: &[u8] = b"%PDF";
/// ZIP container signature (OOXML, ODF).
pub const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// OLE2 compound file signature (legacy Office, encrypted OOXML).
pub const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Strategy for validating and reading one document format.
pub trait FormatStrategy: Send + Sync {
    /// Unique strategy name.
    fn name(&self) -> &str;

    /// Higher priorities win when several strategies claim a file.
    fn priority(&self) -> i32;

    /// Lowercase extensions handled by this strategy.
    fn extensions(&self) -> &[&'static str];

    /// Whether this strategy can read the file at `path`.
    fn can_process(&self, path: &Path) -> bool {
        has_extension(path, self.extensions())
    }

    /// Check that the file is readable and well-formed enough to process.
    fn validate(&self, path: &Path, limits: &ReaderLimits) -> ValidationReport;

    /// Extract text and metadata.
    fn process(&self, path: &Path) -> Result<crate::models::document::ExtractedDocument>;
}

/// Caller-supplied limits for validation.
#[derive(Debug, Clone, Copy)]
pub struct ReaderLimits {
    /// Files above this size get a warning.
    pub max_file_size_bytes: u64,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 50 * 1024 * 1024,
        }
    }
}

/// A validation error with its error code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub code: ErrorCode,
    pub message: String,
}

/// Outcome of [`FormatStrategy::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A passing report with no findings.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    /// Record an error and mark the report invalid.
    pub fn error(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(ValidationIssue {
            code,
            message: message.into(),
        });
    }
}

/// Lowercase extension of `path`.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Read up to `len` leading bytes of a file.
pub(crate) fn read_header(path: &Path, len: usize) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Checks shared by every strategy: existence, emptiness, size and signature.
///
/// `signature_ok` receives the first 16 bytes of the file.
pub(crate) fn validate_common(
    path: &Path,
    limits: &ReaderLimits,
    format: &str,
    signature_ok: impl Fn(&[u8]) -> bool,
) -> ValidationReport {
    let mut report = ValidationReport::valid();

    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            report.error(
                ErrorCode::FileAccess,
                format!("cannot access {}: {}", path.display(), e),
            );
            return report;
        }
    };

    if !meta.is_file() {
        report.error(ErrorCode::FileAccess, format!("{} is not a file", path.display()));
        return report;
    }

    if meta.len() == 0 {
        report.error(ErrorCode::CorruptDocument, "file is empty");
        return report;
    }

    if meta.len() > limits.max_file_size_bytes {
        report.warnings.push(format!(
            "file size {} bytes exceeds the {} byte limit",
            meta.len(),
            limits.max_file_size_bytes
        ));
    }

    match read_header(path, 16) {
        Ok(header) if !signature_ok(&header) => {
            report.error(
                ErrorCode::CorruptDocument,
                format!("file signature does not match the {} format", format),
            );
        }
        Ok(_) => {}
        Err(e) => report.error(
            ErrorCode::FileAccess,
            format!("cannot read {}: {}", path.display(), e),
        ),
    }

    report
}

/// Map an I/O error from reading `path` to a reader error.
pub(crate) fn io_error(path: &Path, e: std::io::Error) -> ReaderError {
    match e.kind() {
        std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
            ReaderError::corrupt(path, e.to_string())
        }
        _ => ReaderError::access(path, e),
    }
}
