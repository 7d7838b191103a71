//! Batch orchestration with bounded concurrency.
//!
//! Each admitted document holds one semaphore permit for the whole
//! read, match and extract chain, and runs on the blocking thread pool.
//! A permit is acquired only when the next document is about to start.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DocexError, ErrorCode, Result};
use crate::models::config::BatchConfig;
use crate::models::result::{BatchProgress, BatchResult, DocumentProcessingResult, ProcessingIssue};
use crate::pipeline::{CancellationToken, DocumentPipeline};
use crate::template::{TemplateSnapshot, TemplateSource};

/// Callback invoked once per completed document, in completion order.
pub type ProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

/// Runs the document pipeline over many documents.
pub struct BatchProcessor {
    pipeline: Arc<DocumentPipeline>,
    max_concurrent: usize,
    continue_on_error: bool,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl BatchProcessor {
    pub fn new(pipeline: Arc<DocumentPipeline>) -> Self {
        Self::from_config(&BatchConfig::default(), pipeline)
    }

    pub fn from_config(config: &BatchConfig, pipeline: Arc<DocumentPipeline>) -> Self {
        Self {
            pipeline,
            max_concurrent: config.max_concurrent.max(1),
            continue_on_error: config.continue_on_error,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Maximum documents in flight; values below 1 are raised to 1.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// When false, the first fatal document failure stops admission.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BatchProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Observe `token` before admission and at each pipeline checkpoint.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process `paths` against a snapshot taken from `source`.
    ///
    /// A template source failure aborts the batch before any document runs.
    pub async fn process<S>(&self, paths: Vec<PathBuf>, source: &S) -> Result<BatchResult>
    where
        S: TemplateSource + ?Sized,
    {
        let templates = source.snapshot()?;
        self.process_snapshot(paths, templates).await
    }

    /// Process `paths` against a fixed template snapshot.
    ///
    /// Returns [`DocexError::BatchCancelled`] with the partial result when
    /// fail-fast or external cancellation stopped the batch.
    pub async fn process_snapshot(
        &self,
        paths: Vec<PathBuf>,
        templates: TemplateSnapshot,
    ) -> Result<BatchResult> {
        let started_at = Utc::now();
        let total = paths.len();
        info!(
            "Processing {} documents against {} templates (max {} concurrent)",
            total,
            templates.len(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let stop_admission = CancellationToken::new();
        let completed = Arc::new(Mutex::new(0usize));

        let mut handles: Vec<(PathBuf, JoinHandle<DocumentProcessingResult>)> =
            Vec::with_capacity(total);
        let mut skipped = Vec::new();
        let mut queue = paths.into_iter();

        while let Some(path) = queue.next() {
            let permit = if self.admission_closed(&stop_admission) {
                None
            } else {
                semaphore.clone().acquire_owned().await.ok()
            };

            // Re-check: a failure may have completed while waiting for the permit.
            let Some(permit) = permit.filter(|_| !self.admission_closed(&stop_admission)) else {
                skipped.push(path);
                skipped.extend(queue.by_ref());
                break;
            };

            debug!("Admitting {}", path.display());
            let pipeline = Arc::clone(&self.pipeline);
            let templates = Arc::clone(&templates);
            let cancel = self.cancel.clone();
            let stop = stop_admission.clone();
            let progress = self.progress.clone();
            let completed = Arc::clone(&completed);
            let continue_on_error = self.continue_on_error;
            let task_path = path.clone();

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;

                let result = catch_unwind(AssertUnwindSafe(|| {
                    pipeline.process_with_cancel(&task_path, &templates, &cancel)
                }))
                .unwrap_or_else(|panic| internal_failure(task_path.clone(), panic_message(&*panic)));

                if !continue_on_error && result.has_fatal_error() {
                    warn!(
                        "Stopping admission after fatal failure of {}",
                        result.document_id
                    );
                    stop.cancel();
                }

                report_progress(&completed, total, &result, progress.as_ref());
                result
            });
            handles.push((path, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => internal_failure(path, format!("document task failed: {}", e)),
            };
            results.push(result);
        }

        if !skipped.is_empty() {
            warn!("{} documents were not started", skipped.len());
        }

        let cancelled = stop_admission.is_cancelled() || self.cancel.is_cancelled();
        let batch = BatchResult::from_results(total, results, skipped, cancelled, started_at);
        info!(
            "Batch finished: {}/{} successful, {} failed, {} skipped",
            batch.successful_files,
            batch.total_files,
            batch.failed_files,
            batch.skipped_files.len()
        );

        if cancelled {
            Err(DocexError::BatchCancelled(Box::new(batch)))
        } else {
            Ok(batch)
        }
    }

    fn admission_closed(&self, stop_admission: &CancellationToken) -> bool {
        stop_admission.is_cancelled() || self.cancel.is_cancelled()
    }
}

/// Bump the completion counter and notify under one lock, so counts reach
/// the callback in order and once per document. A panicking callback is
/// logged and does not affect the document's result.
fn report_progress(
    completed: &Mutex<usize>,
    total: usize,
    result: &DocumentProcessingResult,
    progress: Option<&ProgressCallback>,
) {
    let mut count = completed.lock().unwrap_or_else(|e| e.into_inner());
    *count += 1;
    if let Some(callback) = progress {
        let update = BatchProgress {
            completed: *count,
            total,
            document_id: result.document_id.clone(),
            status: result.status,
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&update))) {
            warn!(
                "Progress callback panicked for {}: {}",
                result.document_id,
                panic_message(&*panic)
            );
        }
    }
}

fn internal_failure(path: PathBuf, message: String) -> DocumentProcessingResult {
    DocumentProcessingResult::failed(path, ProcessingIssue::new(ErrorCode::Internal, message))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("processing panicked: {}", detail)
}
