//! Field extraction: per-field method chains with validation and confidence.

pub mod methods;
pub mod patterns;
pub mod validation;

pub use methods::{run_method, MethodOutcome};
pub use validation::{matches_format, parse_number, validate_value, ValidationError};

use tracing::{debug, trace};

use crate::error::ErrorCode;
use crate::models::config::ExtractionConfig;
use crate::models::document::ExtractedDocument;
use crate::models::result::{
    AttemptOutcome, DocumentStatus, FieldExtractionResult, MethodAttempt, ValidationOutcome,
};
use crate::models::template::{FieldRule, Template};

/// Extracted fields of one document with their aggregate confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateExtraction {
    pub fields: Vec<FieldExtractionResult>,
    /// Mean of per-field confidence; 0.0 for a template without fields.
    pub confidence: f64,
    pub status: DocumentStatus,
}

/// Resolves template field rules against an extracted document.
///
/// Each field's methods run in ascending priority; the first non-empty
/// value that passes validation wins and later methods are not tried.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractionPipeline {
    config: ExtractionConfig,
}

impl FieldExtractionPipeline {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract every field of `template`.
    pub fn extract(&self, template: &Template, doc: &ExtractedDocument) -> TemplateExtraction {
        let fields: Vec<FieldExtractionResult> = template
            .fields
            .iter()
            .map(|rule| self.extract_field(rule, doc))
            .collect();

        let confidence = if fields.is_empty() {
            0.0
        } else {
            fields.iter().map(|f| f.confidence).sum::<f64>() / fields.len() as f64
        };
        let status = field_status(&fields);

        debug!(
            "Template '{}': {}/{} fields extracted, confidence {:.2}, {:?}",
            template.id,
            fields.iter().filter(|f| f.is_success()).count(),
            fields.len(),
            confidence,
            status
        );

        TemplateExtraction {
            fields,
            confidence,
            status,
        }
    }

    /// Run the method chain of one field.
    pub fn extract_field(&self, rule: &FieldRule, doc: &ExtractedDocument) -> FieldExtractionResult {
        let mut attempts = Vec::with_capacity(rule.methods.len());

        for method in rule.ordered_methods() {
            let outcome = run_method(&method.spec, doc, self.config.default_proximity_window);
            trace!(
                "Field '{}' {:?} (priority {}): {:?}",
                rule.name,
                method.kind(),
                method.priority,
                outcome
            );

            let attempt = |outcome| MethodAttempt {
                method: method.kind(),
                priority: method.priority,
                outcome,
            };

            let value = match outcome {
                MethodOutcome::Value(value) => value,
                MethodOutcome::NoMatch => {
                    attempts.push(attempt(AttemptOutcome::NoMatch));
                    continue;
                }
                MethodOutcome::Skipped(reason) => {
                    attempts.push(attempt(AttemptOutcome::Skipped { reason }));
                    continue;
                }
                MethodOutcome::Error(message) => {
                    attempts.push(attempt(AttemptOutcome::Error { message }));
                    continue;
                }
            };

            let (validation, confidence) = match &rule.validation {
                None => (ValidationOutcome::NotConfigured, self.config.unvalidated_confidence),
                Some(check) => match validate_value(&value, check) {
                    Ok(()) => (ValidationOutcome::Passed, self.config.validated_confidence),
                    Err(e) => {
                        attempts.push(attempt(AttemptOutcome::ValidationFailed {
                            value,
                            reason: e.to_string(),
                        }));
                        continue;
                    }
                },
            };

            attempts.push(attempt(AttemptOutcome::Extracted));
            return FieldExtractionResult {
                field: rule.name.clone(),
                required: rule.required,
                value: Some(value),
                method: Some(method.kind()),
                confidence,
                validation,
                error: None,
                attempts,
            };
        }

        debug!("No extraction method succeeded for field '{}'", rule.name);
        FieldExtractionResult {
            field: rule.name.clone(),
            required: rule.required,
            value: None,
            method: None,
            confidence: 0.0,
            validation: ValidationOutcome::Failed,
            error: Some(ErrorCode::NoExtractionMethodSucceeded),
            attempts,
        }
    }
}

/// Document status from field results: every required field valid is
/// `Success`; a failed required field is `PartialSuccess` while any field
/// succeeded and `Failed` otherwise.
pub fn field_status(fields: &[FieldExtractionResult]) -> DocumentStatus {
    let required_failed = fields.iter().any(|f| f.required && !f.is_success());
    if !required_failed {
        DocumentStatus::Success
    } else if fields.iter().any(|f| f.is_success()) {
        DocumentStatus::PartialSuccess
    } else {
        DocumentStatus::Failed
    }
}
