//! CLI command implementations.

pub mod batch;
pub mod config;
pub mod formats;
pub mod process;
pub mod templates;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use docex_core::{
    DocexConfig, DocumentPipeline, OcrEngine, ReaderRegistry, TemplateDirectory, TemplateSnapshot,
    TemplateSource, TesseractEngine,
};

/// Load the configuration named by `--config`, else the default file if it
/// exists, else built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<DocexConfig> {
    let path = match config_path {
        Some(path) => PathBuf::from(path),
        None => {
            let default = config::default_config_path();
            if !default.exists() {
                return Ok(DocexConfig::default());
            }
            default
        }
    };

    debug!("Loading configuration from {}", path.display());
    DocexConfig::from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))
}

/// Build the reader registry, attaching Tesseract when OCR is enabled.
pub fn build_registry(config: &DocexConfig, force_ocr: bool) -> Arc<ReaderRegistry> {
    let ocr: Option<Arc<dyn OcrEngine>> = if force_ocr || config.reader.enable_ocr {
        if !TesseractEngine::is_available() {
            warn!("OCR requested but the tesseract binary was not found");
        }
        Some(Arc::new(
            TesseractEngine::new(config.reader.ocr_language.clone())
                .with_render_dpi(config.reader.ocr_render_dpi),
        ))
    } else {
        None
    };
    Arc::new(ReaderRegistry::with_defaults(&config.reader, ocr))
}

/// Build the document pipeline for `config`.
pub fn build_pipeline(config: &DocexConfig, force_ocr: bool) -> Arc<DocumentPipeline> {
    Arc::new(DocumentPipeline::from_config(
        config,
        build_registry(config, force_ocr),
    ))
}

/// Load a template snapshot from a directory of JSON files.
pub fn load_templates(dir: &Path) -> anyhow::Result<TemplateSnapshot> {
    if !dir.is_dir() {
        anyhow::bail!("Template directory not found: {}", dir.display());
    }
    let snapshot = TemplateDirectory::new(dir).snapshot()?;
    debug!("Loaded {} templates from {}", snapshot.len(), dir.display());
    Ok(snapshot)
}
