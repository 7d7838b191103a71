//! Matching, extraction and batch result types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::models::document::ExtractedDocument;
use crate::models::template::MethodKind;

/// A template that passed the required-keyword gate and the confidence floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub template_id: String,
    pub template_name: String,
    /// Score in 0.0 - 1.0.
    pub score: f64,
    pub matched_required: usize,
    pub matched_optional: usize,
    pub total_optional: usize,
    /// Keywords found in the document, required first.
    pub matched_keywords: Vec<String>,
}

/// Why the matcher selected (or did not select) a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Clear winner above its auto-application threshold.
    AutoSelected,
    /// Clear winner, but below its auto-application threshold.
    SelectedBelowAutoThreshold,
    /// Top candidates are within the minimum gap of each other.
    AmbiguousRequiresConfirmation,
    /// Active templates exist but none qualified.
    BelowThreshold,
    /// No active templates.
    NoTemplatesConfigured,
}

/// Why an active template did not become a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    MissingRequiredKeywords { missing: Vec<String> },
    BelowMinimumConfidence { score: f64, threshold: f64 },
}

/// An active template that was dropped from the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedTemplate {
    pub template_id: String,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// Outcome of matching one document against a template set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Candidates by descending score.
    pub candidates: Vec<MatchCandidate>,
    /// Id of the selected template, if any.
    pub selected: Option<String>,
    pub decision: DecisionReason,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<ExcludedTemplate>,
}

impl MatchResult {
    /// The selected candidate.
    pub fn selected_candidate(&self) -> Option<&MatchCandidate> {
        let id = self.selected.as_deref()?;
        self.candidates.iter().find(|c| c.template_id == id)
    }

    /// Whether a human must confirm the selection before it is applied.
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self.decision,
            DecisionReason::AmbiguousRequiresConfirmation | DecisionReason::SelectedBelowAutoThreshold
        )
    }
}

/// Outcome of one method attempt within a field's fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Extracted,
    NoMatch,
    ValidationFailed { value: String, reason: String },
    Skipped { reason: String },
    Error { message: String },
}

/// One entry of a field's attempt trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodAttempt {
    pub method: MethodKind,
    pub priority: u32,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Validation state of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Passed,
    /// The field has no validation rule.
    NotConfigured,
    /// No value was accepted.
    Failed,
}

/// Result of extracting one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExtractionResult {
    pub field: String,
    pub required: bool,
    pub value: Option<String>,
    pub method: Option<MethodKind>,
    pub confidence: f64,
    pub validation: ValidationOutcome,
    pub error: Option<ErrorCode>,
    pub attempts: Vec<MethodAttempt>,
}

impl FieldExtractionResult {
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// Overall status of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Success,
    PartialSuccess,
    Failed,
}

/// A structured error attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingIssue {
    pub code: ErrorCode,
    pub message: String,
    pub remediation: String,
}

impl ProcessingIssue {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            remediation: code.remediation().to_string(),
        }
    }
}

/// Everything produced for one document in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentProcessingResult {
    /// Document identity (the path as given).
    pub document_id: String,
    pub path: PathBuf,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<ExtractedDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_result: Option<MatchResult>,
    #[serde(default)]
    pub fields: Vec<FieldExtractionResult>,
    /// Mean per-field confidence.
    pub confidence: f64,
    pub requires_confirmation: bool,
    #[serde(default)]
    pub errors: Vec<ProcessingIssue>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,
}

impl DocumentProcessingResult {
    /// An empty result for `path`; the status stays `Failed` until
    /// extraction sets it.
    pub fn new(path: PathBuf) -> Self {
        Self {
            document_id: path.display().to_string(),
            path,
            status: DocumentStatus::Failed,
            document: None,
            match_result: None,
            fields: Vec::new(),
            confidence: 0.0,
            requires_confirmation: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            elapsed_ms: 0,
        }
    }

    /// A failed result carrying a single issue.
    pub fn failed(path: PathBuf, issue: ProcessingIssue) -> Self {
        let mut result = Self::new(path);
        result.errors.push(issue);
        result
    }

    /// Whether the result has an error that stops a fail-fast batch.
    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.code.is_fatal())
    }

    /// Look up an extracted field value by name.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field == name)
            .and_then(|f| f.value.as_deref())
    }
}

/// Progress notification sent after each document completes.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub document_id: String,
    pub status: DocumentStatus,
}

/// Aggregate of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Documents submitted.
    pub total_files: usize,
    /// Documents that produced a result.
    pub processed_files: usize,
    /// `Success` plus `PartialSuccess`.
    pub successful_files: usize,
    pub partial_files: usize,
    pub failed_files: usize,
    /// Per-document results in submission order.
    pub results: Vec<DocumentProcessingResult>,
    /// Errors keyed by document id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<ProcessingIssue>>,
    /// Documents never admitted because the batch stopped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_files: Vec<PathBuf>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success_rate: f64,
}

impl BatchResult {
    /// Assemble a batch result from completed documents.
    pub fn from_results(
        total_files: usize,
        results: Vec<DocumentProcessingResult>,
        skipped_files: Vec<PathBuf>,
        cancelled: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        let count = |status: DocumentStatus| results.iter().filter(|r| r.status == status).count();
        let partial_files = count(DocumentStatus::PartialSuccess);
        let successful_files = count(DocumentStatus::Success) + partial_files;
        let failed_files = count(DocumentStatus::Failed);

        let errors = results
            .iter()
            .filter(|r| !r.errors.is_empty())
            .map(|r| (r.document_id.clone(), r.errors.clone()))
            .collect();

        let success_rate = if total_files == 0 {
            0.0
        } else {
            successful_files as f64 / total_files as f64
        };

        Self {
            total_files,
            processed_files: results.len(),
            successful_files,
            partial_files,
            failed_files,
            results,
            errors,
            skipped_files,
            cancelled,
            started_at,
            finished_at: Utc::now(),
            success_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: DocumentStatus) -> DocumentProcessingResult {
        let mut r = DocumentProcessingResult::failed(
            PathBuf::from(name),
            ProcessingIssue::new(ErrorCode::FileAccess, "missing"),
        );
        r.status = status;
        if status != DocumentStatus::Failed {
            r.errors.clear();
        }
        r
    }

    #[test]
    fn test_batch_counts() {
        let results = vec![
            result("a", DocumentStatus::Success),
            result("b", DocumentStatus::PartialSuccess),
            result("c", DocumentStatus::Failed),
            result("d", DocumentStatus::Success),
        ];
        let batch = BatchResult::from_results(5, results, vec![PathBuf::from("e")], true, Utc::now());

        assert_eq!(batch.processed_files, 4);
        assert_eq!(batch.successful_files, 3);
        assert_eq!(batch.partial_files, 1);
        assert_eq!(batch.failed_files, 1);
        assert_eq!(batch.errors.len(), 1);
        assert!(batch.errors.contains_key("c"));
        assert!((batch.success_rate - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_rate() {
        let batch = BatchResult::from_results(0, Vec::new(), Vec::new(), false, Utc::now());
        assert_eq!(batch.success_rate, 0.0);
    }

    #[test]
    fn test_issue_carries_remediation() {
        let issue = ProcessingIssue::new(ErrorCode::NoTemplateMatch, "no candidates");
        assert!(issue.remediation.contains("confidence threshold"));
    }
}
