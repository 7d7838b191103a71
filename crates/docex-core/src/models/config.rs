//! Configuration structures for the extraction engine.

use serde::{Deserialize, Serialize};

/// Main configuration for the docex engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocexConfig {
    /// Template matching configuration.
    pub matching: MatchingConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Document reader configuration.
    pub reader: ReaderConfig,

    /// Batch orchestration configuration.
    pub batch: BatchConfig,
}

/// Template matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Score awarded for satisfying every required keyword (0.0 - 1.0).
    /// The optional-keyword fraction fills the remaining range.
    pub base_weight: f64,

    /// Minimum lead of the best candidate over the runner-up for a
    /// clear selection.
    pub min_confidence_gap: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            base_weight: 0.6,
            min_confidence_gap: 0.2,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Confidence contributed by a field that passed its validation rule.
    pub validated_confidence: f64,

    /// Confidence contributed by a field without a validation rule.
    pub unvalidated_confidence: f64,

    /// Window used by keyword-proximity methods that do not set one.
    pub default_proximity_window: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            validated_confidence: 1.0,
            unvalidated_confidence: 0.8,
            default_proximity_window: 64,
        }
    }
}

/// Document reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Files larger than this produce a validation warning.
    pub max_file_size_bytes: u64,

    /// Minimum text length to consider a PDF as having a text layer.
    pub min_text_length: usize,

    /// Delegate documents without a text layer to the OCR engine.
    pub enable_ocr: bool,

    /// OCR language passed to the OCR engine.
    pub ocr_language: String,

    /// DPI for rasterising PDF pages before OCR.
    pub ocr_render_dpi: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 50 * 1024 * 1024,
            min_text_length: 50,
            enable_ocr: false,
            ocr_language: "eng".to_string(),
            ocr_render_dpi: 300,
        }
    }
}

/// Batch orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of documents in flight at once.
    pub max_concurrent: usize,

    /// Keep admitting documents after a fatal per-document failure.
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            continue_on_error: true,
        }
    }
}

impl DocexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DocexConfig =
            serde_json::from_str(r#"{"batch": {"max_concurrent": 8}}"#).unwrap();
        assert_eq!(config.batch.max_concurrent, 8);
        assert!(config.batch.continue_on_error);
        assert_eq!(config.matching.base_weight, 0.6);
        assert_eq!(config.matching.min_confidence_gap, 0.2);
        assert_eq!(config.reader.min_text_length, 50);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = DocexConfig::default();
        config.reader.enable_ocr = true;
        config.save(&path).unwrap();

        let loaded = DocexConfig::from_file(&path).unwrap();
        assert!(loaded.reader.enable_ocr);
        assert_eq!(loaded.reader.ocr_language, "eng");
    }
}
