//! Templates command - list, validate and test templates.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use docex_core::{DocumentStatus, TemplateError, TemplateMatcher, TemplateScore};

use super::process::label;
use super::{build_pipeline, load_config, load_templates};

/// Arguments for the templates command.
#[derive(Args)]
pub struct TemplatesArgs {
    /// Directory of template JSON files
    #[arg(short, long, global = true, default_value = "templates")]
    templates: PathBuf,

    #[command(subcommand)]
    command: TemplatesCommand,
}

#[derive(Subcommand)]
enum TemplatesCommand {
    /// List loaded templates
    List,

    /// Check every template for configuration errors
    Validate,

    /// Show how a document ranks against the templates
    Match {
        /// Document to match
        file: PathBuf,

        /// Run OCR on documents without a text layer
        #[arg(long)]
        ocr: bool,
    },
}

pub async fn run(args: TemplatesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        TemplatesCommand::List => list_templates(&args.templates),
        TemplatesCommand::Validate => validate_templates(&args.templates),
        TemplatesCommand::Match { file, ocr } => {
            match_document(&args.templates, file, ocr, config_path).await
        }
    }
}

fn list_templates(dir: &Path) -> anyhow::Result<()> {
    let templates = load_templates(dir)?;

    if templates.is_empty() {
        println!("{} No templates in {}", style("ℹ").blue(), dir.display());
        return Ok(());
    }

    println!("{}", style("Templates:").bold());
    for template in templates.iter() {
        let state = if template.active {
            style("active").green()
        } else {
            style("inactive").dim()
        };
        println!(
            "  {} - {} [{}] {} fields, floor {:.2}, auto {:.2}",
            style(&template.id).cyan(),
            template.name,
            state,
            template.fields.len(),
            template.minimum_confidence_threshold,
            template.auto_application_threshold
        );
    }

    Ok(())
}

fn validate_templates(dir: &Path) -> anyhow::Result<()> {
    match load_templates(dir) {
        Ok(templates) => {
            println!(
                "{} {} templates are valid",
                style("✓").green(),
                templates.len()
            );
            Ok(())
        }
        Err(e) => {
            let hint = match e.downcast_ref::<TemplateError>() {
                Some(TemplateError::DuplicateId(_)) => "template ids must be unique",
                Some(TemplateError::Parse { .. }) => "check the JSON syntax and field names",
                _ => "fix the template and run validate again",
            };
            println!("{} {}", style("✗").red(), e);
            println!("  {}", hint);
            Err(e)
        }
    }
}

async fn match_document(
    dir: &Path,
    file: PathBuf,
    ocr: bool,
    config_path: Option<&str>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let templates = load_templates(dir)?;
    let pipeline = build_pipeline(&config, ocr);

    let result = {
        let templates = templates.clone();
        let file = file.clone();
        tokio::task::spawn_blocking(move || pipeline.process(&file, &templates)).await?
    };

    let Some(document) = &result.document else {
        let codes: Vec<&str> = result.errors.iter().map(|e| e.code.as_str()).collect();
        anyhow::bail!("Could not read {}: {}", file.display(), codes.join(", "));
    };

    let matcher = TemplateMatcher::new(config.matching.clone());
    println!("{} {}", style("Document:").bold(), file.display());
    println!();

    for template in templates.iter().filter(|t| t.active) {
        match matcher.score_template(template, &document.text) {
            TemplateScore::Candidate(candidate) => println!(
                "  {} {:.2} {} (required {}, optional {}/{})",
                style("●").green(),
                candidate.score,
                template.id,
                candidate.matched_required,
                candidate.matched_optional,
                candidate.total_optional
            ),
            TemplateScore::Excluded(reason) => println!(
                "  {} {} {}",
                style("○").dim(),
                template.id,
                style(serde_json::to_string(&reason)?).dim()
            ),
        }
    }

    if let Some(matched) = &result.match_result {
        println!();
        println!("Decision: {}", label(&matched.decision));
        match matched.selected_candidate() {
            Some(candidate) => println!(
                "Selected: {} ({:.2})",
                style(&candidate.template_id).cyan(),
                candidate.score
            ),
            None => println!("Selected: {}", style("none").yellow()),
        }
        if matched.requires_confirmation() {
            println!("{}", style("Selection requires confirmation").yellow());
        }
    }

    if result.status != DocumentStatus::Failed {
        println!(
            "Fields extracted: {}/{}",
            result.fields.iter().filter(|f| f.is_success()).count(),
            result.fields.len()
        );
    }

    Ok(())
}
