//! Batch processing command for many documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use docex_core::reader::extension_of;
use docex_core::{BatchProcessor, BatchResult, DocexError, DocumentProcessingResult};

use super::process::{format_result, label, OutputFormat};
use super::{build_pipeline, load_config, load_templates};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Directory of template JSON files
    #[arg(short, long)]
    templates: PathBuf,

    /// Output directory for per-document results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each document
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of documents processed concurrently
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Keep going after a document fails
    #[arg(long)]
    continue_on_error: bool,

    /// Stop admitting documents after the first unreadable one
    #[arg(long, conflicts_with = "continue_on_error")]
    fail_fast: bool,

    /// Run OCR on documents without a text layer
    #[arg(long)]
    ocr: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let templates = load_templates(&args.templates)?;
    let pipeline = build_pipeline(&config, args.ocr);

    let supported = pipeline.registry().supported_extensions();
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| extension_of(p).is_some_and(|ext| supported.contains(&ext)))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let progress_bar = ProgressBar::new(files.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );

    let bar = progress_bar.clone();
    let mut processor = BatchProcessor::from_config(&config.batch, pipeline).with_progress(
        move |progress| {
            bar.set_position(progress.completed as u64);
            bar.set_message(progress.document_id.clone());
        },
    );
    if let Some(jobs) = args.jobs {
        processor = processor.with_max_concurrent(jobs);
    }
    if args.continue_on_error {
        processor = processor.with_continue_on_error(true);
    }
    if args.fail_fast {
        processor = processor.with_continue_on_error(false);
    }

    let batch = match processor.process_snapshot(files, templates).await {
        Ok(batch) => batch,
        Err(DocexError::BatchCancelled(batch)) => {
            warn!("Batch stopped early, {} files not started", batch.skipped_files.len());
            *batch
        }
        Err(e) => return Err(e.into()),
    };

    progress_bar.finish_with_message("Complete");

    if let Some(output_dir) = &args.output_dir {
        for result in &batch.results {
            write_document_output(output_dir, result, args.format)?;
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &batch)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    print_report(&batch, start);

    if batch.cancelled {
        anyhow::bail!(
            "Batch stopped after a failure; {} files were not processed",
            batch.skipped_files.len()
        );
    }

    Ok(())
}

fn write_document_output(
    output_dir: &Path,
    result: &DocumentProcessingResult,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let output_name = result
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    let output_path = output_dir.join(format!("{}.{}", output_name, format.extension()));
    fs::write(&output_path, format_result(result, format)?)?;
    debug!("Wrote output to {}", output_path.display());
    Ok(())
}

fn print_report(batch: &BatchResult, start: Instant) {
    println!();
    println!(
        "{} Processed {} of {} files in {:?}",
        style("✓").green(),
        batch.processed_files,
        batch.total_files,
        start.elapsed()
    );
    println!(
        "   {} successful ({} partial), {} failed, {} skipped",
        style(batch.successful_files).green(),
        style(batch.partial_files).yellow(),
        style(batch.failed_files).red(),
        style(batch.skipped_files.len()).dim()
    );
    println!("   success rate {:.1}%", batch.success_rate * 100.0);

    let confirm: Vec<_> = batch
        .results
        .iter()
        .filter(|r| r.requires_confirmation)
        .collect();
    if !confirm.is_empty() {
        println!();
        println!("{}", style("Needs template confirmation:").yellow());
        for result in confirm {
            println!("  - {}", result.document_id);
        }
    }

    if !batch.errors.is_empty() {
        println!();
        println!("{}", style("Errors:").red());
        for (document, issues) in &batch.errors {
            for issue in issues {
                println!("  - {}: {} {}", document, issue.code, issue.message);
            }
        }
    }
}

fn write_summary(path: &Path, batch: &BatchResult) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "template",
        "decision",
        "confidence",
        "fields_extracted",
        "fields_total",
        "requires_confirmation",
        "processing_time_ms",
        "error",
    ])?;

    for result in &batch.results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let template = result
            .match_result
            .as_ref()
            .and_then(|m| m.selected.clone())
            .unwrap_or_default();
        let decision = result
            .match_result
            .as_ref()
            .map(|m| label(&m.decision))
            .unwrap_or_default();
        let errors: Vec<&str> = result.errors.iter().map(|e| e.code.as_str()).collect();

        wtr.write_record([
            filename,
            &label(&result.status),
            &template,
            &decision,
            &format!("{:.2}", result.confidence),
            &result.fields.iter().filter(|f| f.is_success()).count().to_string(),
            &result.fields.len().to_string(),
            &result.requires_confirmation.to_string(),
            &result.elapsed_ms.to_string(),
            &errors.join(";"),
        ])?;
    }

    for skipped in &batch.skipped_files {
        let filename = skipped.file_name().and_then(|s| s.to_str()).unwrap_or("");
        wtr.write_record([filename, "skipped", "", "", "", "", "", "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
