//! Formats command - show registered document readers.

use console::style;

use docex_core::TesseractEngine;

use super::{build_registry, load_config};

pub async fn run(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config, false);

    println!("{}", style("Readers (highest priority first):").bold());
    for info in registry.strategies() {
        println!(
            "  {:<12} priority {:>3}  .{}",
            style(&info.name).cyan(),
            info.priority,
            info.extensions.join(" .")
        );
    }

    let ocr = if !config.reader.enable_ocr {
        style("disabled").dim()
    } else if TesseractEngine::is_available() {
        style("tesseract").green()
    } else {
        style("tesseract not found").yellow()
    };
    println!();
    println!("OCR: {}", ocr);

    Ok(())
}
