//! Process command - classify one document and extract its fields.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use docex_core::{DocumentProcessingResult, DocumentStatus};

use super::{build_pipeline, load_config, load_templates};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input document
    #[arg(required = true)]
    input: PathBuf,

    /// Directory of template JSON files
    #[arg(short, long)]
    templates: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show match and extraction confidence
    #[arg(long)]
    show_confidence: bool,

    /// Run OCR on documents without a text layer
    #[arg(long)]
    ocr: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per field
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let templates = load_templates(&args.templates)?;
    let pipeline = build_pipeline(&config, args.ocr);

    info!("Processing file: {}", args.input.display());
    let input = args.input.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.process(&input, &templates)).await?;

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        print_confidence(&result);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    if result.status == DocumentStatus::Failed {
        let codes: Vec<&str> = result.errors.iter().map(|e| e.code.as_str()).collect();
        anyhow::bail!("Processing failed: {}", codes.join(", "));
    }

    Ok(())
}

fn print_confidence(result: &DocumentProcessingResult) {
    println!();
    if let Some(candidate) = result
        .match_result
        .as_ref()
        .and_then(|m| m.selected_candidate())
    {
        println!(
            "{} Template match: {} ({:.1}%)",
            style("ℹ").blue(),
            candidate.template_name,
            candidate.score * 100.0
        );
    }
    println!(
        "{} Extraction confidence: {:.1}%",
        style("ℹ").blue(),
        result.confidence * 100.0
    );
    if result.requires_confirmation {
        println!(
            "{} Template selection requires confirmation",
            style("!").yellow()
        );
    }
    println!(
        "{} Processing time: {}ms",
        style("ℹ").blue(),
        result.elapsed_ms
    );
}

/// Render one result in `format`.
pub fn format_result(
    result: &DocumentProcessingResult,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_result_csv(result),
        OutputFormat::Text => Ok(format_result_text(result)),
    }
}

fn format_result_csv(result: &DocumentProcessingResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["field", "value", "method", "confidence", "validation", "error"])?;

    for field in &result.fields {
        wtr.write_record([
            field.field.as_str(),
            field.value.as_deref().unwrap_or(""),
            &field.method.map(|m| label(&m)).unwrap_or_default(),
            &format!("{:.2}", field.confidence),
            &label(&field.validation),
            field.error.map(|e| e.as_str()).unwrap_or(""),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_result_text(result: &DocumentProcessingResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("Document: {}\n", result.document_id));
    out.push_str(&format!("Status: {}\n", label(&result.status)));

    if let Some(matched) = &result.match_result {
        let template = matched
            .selected_candidate()
            .map(|c| format!("{} ({:.2})", c.template_name, c.score))
            .unwrap_or_else(|| "none".to_string());
        out.push_str(&format!("Template: {}\n", template));
        out.push_str(&format!("Decision: {}\n", label(&matched.decision)));
    }

    if !result.fields.is_empty() {
        out.push_str("\nFields:\n");
        for field in &result.fields {
            let value = field.value.as_deref().unwrap_or("-");
            let marker = if field.required { "*" } else { " " };
            out.push_str(&format!(
                "  {}{}: {} [{:.2}]\n",
                marker, field.field, value, field.confidence
            ));
        }
    }

    if !result.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for issue in &result.errors {
            out.push_str(&format!("  {}: {}\n", issue.code, issue.message));
            out.push_str(&format!("    hint: {}\n", issue.remediation));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &result.warnings {
            out.push_str(&format!("  - {}\n", warning));
        }
    }

    out
}

/// snake_case name of a serde unit variant.
pub fn label<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
