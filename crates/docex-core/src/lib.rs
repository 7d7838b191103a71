//! Core library for threat-intelligence document classification.
//!
//! This crate provides:
//! - Format readers for PDF, Word, spreadsheets, images and plain text
//! - Template matching with keyword scoring and an ambiguity policy
//! - Field extraction through regex, zone and keyword-proximity methods
//! - Batch processing with bounded concurrency and progress reporting

pub mod batch;
pub mod error;
pub mod extraction;
pub mod matcher;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod reader;
pub mod template;

pub use batch::{BatchProcessor, ProgressCallback};
pub use error::{DocexError, ErrorCode, ReaderError, Result, TemplateError};
pub use extraction::{FieldExtractionPipeline, TemplateExtraction};
pub use matcher::{TemplateMatcher, TemplateScore};
pub use models::config::DocexConfig;
pub use models::document::{EncryptionStatus, ExtractedDocument, FileMetadata, TextSource, TextSpan};
pub use models::result::{
    BatchProgress, BatchResult, DecisionReason, DocumentProcessingResult, DocumentStatus,
    FieldExtractionResult, MatchCandidate, MatchResult,
};
pub use models::template::{ExtractionMethod, FieldRule, MethodSpec, Template};
pub use ocr::{OcrEngine, OcrResult, TesseractEngine};
pub use pipeline::{CancellationToken, DocumentPipeline};
pub use reader::{FormatStrategy, ReaderRegistry};
pub use template::{TemplateDirectory, TemplateSnapshot, TemplateSource, TemplateStore};
