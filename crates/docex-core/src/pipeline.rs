//! Single-document pipeline: read, match, extract.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::extraction::FieldExtractionPipeline;
use crate::matcher::TemplateMatcher;
use crate::models::config::DocexConfig;
use crate::models::result::{
    DecisionReason, DocumentProcessingResult, DocumentStatus, ProcessingIssue,
};
use crate::models::template::Template;
use crate::reader::{ReaderLimits, ReaderRegistry};

/// Cooperative cancellation flag shared between a caller and running work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Running documents stop at their next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Reader registry, matcher and extractor wired together.
pub struct DocumentPipeline {
    registry: Arc<ReaderRegistry>,
    matcher: TemplateMatcher,
    extractor: FieldExtractionPipeline,
    limits: ReaderLimits,
}

impl DocumentPipeline {
    /// Create a pipeline with default matching and extraction settings.
    pub fn new(registry: Arc<ReaderRegistry>) -> Self {
        Self {
            registry,
            matcher: TemplateMatcher::default(),
            extractor: FieldExtractionPipeline::default(),
            limits: ReaderLimits::default(),
        }
    }

    /// Create a pipeline from configuration.
    pub fn from_config(config: &DocexConfig, registry: Arc<ReaderRegistry>) -> Self {
        Self::new(registry)
            .with_matcher(TemplateMatcher::new(config.matching.clone()))
            .with_extractor(FieldExtractionPipeline::new(config.extraction.clone()))
            .with_limits(ReaderLimits {
                max_file_size_bytes: config.reader.max_file_size_bytes,
            })
    }

    pub fn with_matcher(mut self, matcher: TemplateMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_extractor(mut self, extractor: FieldExtractionPipeline) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_limits(mut self, limits: ReaderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &ReaderRegistry {
        &self.registry
    }

    pub fn matcher(&self) -> &TemplateMatcher {
        &self.matcher
    }

    /// Process one document against `templates`.
    pub fn process(&self, path: &Path, templates: &[Template]) -> DocumentProcessingResult {
        self.run(path, templates, None)
    }

    /// Process one document, stopping at a checkpoint once `cancel` is set.
    pub fn process_with_cancel(
        &self,
        path: &Path,
        templates: &[Template],
        cancel: &CancellationToken,
    ) -> DocumentProcessingResult {
        self.run(path, templates, Some(cancel))
    }

    fn run(
        &self,
        path: &Path,
        templates: &[Template],
        cancel: Option<&CancellationToken>,
    ) -> DocumentProcessingResult {
        let start = Instant::now();
        let cancelled = || cancel.is_some_and(|c| c.is_cancelled());
        let mut result = self.run_stages(path, templates, &cancelled);
        result.elapsed_ms = start.elapsed().as_millis() as u64;

        match result.status {
            DocumentStatus::Failed => warn!(
                "{}: failed ({})",
                result.document_id,
                result
                    .errors
                    .iter()
                    .map(|e| e.code.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            status => info!(
                "{}: {:?}, confidence {:.2} in {}ms",
                result.document_id, status, result.confidence, result.elapsed_ms
            ),
        }
        result
    }

    fn run_stages(
        &self,
        path: &Path,
        templates: &[Template],
        cancelled: &dyn Fn() -> bool,
    ) -> DocumentProcessingResult {
        let path_buf = path.to_path_buf();

        let Some(strategy) = self.registry.get_strategy(path) else {
            return DocumentProcessingResult::failed(
                path_buf,
                ProcessingIssue::new(
                    ErrorCode::UnsupportedFormat,
                    format!("no reader supports {}", path.display()),
                ),
            );
        };

        let report = strategy.validate(path, &self.limits);
        if !report.is_valid {
            let code = report
                .errors
                .first()
                .map(|e| e.code)
                .unwrap_or(ErrorCode::CorruptDocument);
            let message = report
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            let mut failed =
                DocumentProcessingResult::failed(path_buf, ProcessingIssue::new(code, message));
            failed.warnings = report.warnings;
            return failed;
        }

        let document = match strategy.process(path) {
            Ok(document) => document,
            Err(e) => {
                let mut failed = DocumentProcessingResult::failed(
                    path_buf,
                    ProcessingIssue::new(e.code(), e.to_string()),
                );
                failed.warnings = report.warnings;
                return failed;
            }
        };
        debug!(
            "{} read by '{}': {} chars, {} pages",
            path.display(),
            strategy.name(),
            document.text.len(),
            document.page_count
        );

        let mut result = DocumentProcessingResult::new(path_buf);
        result.warnings = report.warnings;
        result.warnings.extend(document.warnings.iter().cloned());

        if cancelled() {
            result.errors.push(cancelled_issue());
            result.document = Some(document);
            return result;
        }

        let match_result = self.matcher.match_document(templates, &document.text);
        result.requires_confirmation = match_result.requires_confirmation();

        if cancelled() {
            result.errors.push(cancelled_issue());
            result.document = Some(document);
            result.match_result = Some(match_result);
            return result;
        }

        let template = match_result
            .selected
            .as_deref()
            .and_then(|id| templates.iter().find(|t| t.id == id));

        match template {
            None => {
                let message = match match_result.decision {
                    DecisionReason::NoTemplatesConfigured => "no active templates are configured",
                    _ => "no template matched above its minimum confidence",
                };
                result
                    .errors
                    .push(ProcessingIssue::new(ErrorCode::NoTemplateMatch, message));
            }
            Some(template) => {
                let extraction = self.extractor.extract(template, &document);
                for field in extraction.fields.iter().filter(|f| f.required && !f.is_success()) {
                    result.errors.push(ProcessingIssue::new(
                        ErrorCode::NoExtractionMethodSucceeded,
                        format!("required field '{}' was not extracted", field.field),
                    ));
                }
                result.status = extraction.status;
                result.confidence = extraction.confidence;
                result.fields = extraction.fields;
            }
        }

        result.document = Some(document);
        result.match_result = Some(match_result);
        result
    }
}

fn cancelled_issue() -> ProcessingIssue {
    ProcessingIssue::new(
        ErrorCode::BatchCancelled,
        "processing stopped because the batch was cancelled",
    )
}
