//! Tesseract OCR backend.
//!
//! Runs the `tesseract` binary in TSV mode so word boxes are available for
//! zone extraction. PDFs are rasterised with `pdftoppm` first.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tempfile::TempDir;
use tracing::{debug, trace};

use super::{OcrEngine, OcrResult};
use crate::error::OcrError;
use crate::models::document::TextSpan;

/// Tesseract command-line OCR engine.
pub struct TesseractEngine {
    language: String,
    render_dpi: u32,
}

impl TesseractEngine {
    /// Create an engine for `language` (e.g. "eng").
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            render_dpi: 300,
        }
    }

    /// Set the DPI used when rasterising PDF pages.
    pub fn with_render_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi;
        self
    }

    /// Check whether the tesseract binary can be executed.
    pub fn is_available() -> bool {
        Command::new("tesseract")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .arg("tsv")
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => Err(OcrError::Failed(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::Unavailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    /// Rasterise every PDF page into `dir`, returning the images in page order.
    fn render_pdf(&self, pdf_path: &Path, dir: &TempDir) -> Result<Vec<PathBuf>, OcrError> {
        let prefix = dir.path().join("page");
        let output = Command::new("pdftoppm")
            .args(["-r", &self.render_dpi.to_string(), "-png"])
            .arg(pdf_path)
            .arg(&prefix)
            .output();

        match output {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                return Err(OcrError::Failed(format!(
                    "pdftoppm failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::Unavailable(
                    "pdftoppm not found (install poppler-utils)".to_string(),
                ))
            }
            Err(e) => return Err(OcrError::Io(e)),
        }

        let mut pages: Vec<PathBuf> = std::fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        // pdftoppm zero-pads page numbers, so lexical order is page order
        pages.sort();
        debug!("Rendered {} PDF pages for OCR", pages.len());
        Ok(pages)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, path: &Path) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

        // Keeps rendered pages alive until recognition finishes.
        let render_dir;
        let images = if is_pdf {
            render_dir = TempDir::new()?;
            self.render_pdf(path, &render_dir)?
        } else {
            vec![path.to_path_buf()]
        };

        let mut result = OcrResult::default();
        for (idx, image) in images.iter().enumerate() {
            let page = idx as u32 + 1;
            let tsv = self.run_tesseract(image)?;
            let (text, spans) = parse_tsv(&tsv, page);
            trace!("OCR page {}: {} words", page, spans.len());

            if !text.is_empty() {
                if !result.text.is_empty() {
                    result.text.push_str("\n\n");
                }
                result.text.push_str(&text);
            }
            result.spans.extend(spans);
        }

        if is_pdf {
            result.raster_dpi = Some(self.render_dpi);
        }
        result.page_count = images.len().max(1) as u32;
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

/// Parse tesseract TSV output into line-joined text and word spans.
pub(crate) fn parse_tsv(tsv: &str, page: u32) -> (String, Vec<TextSpan>) {
    let mut spans = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut current_key: Option<(u32, u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<f32>().unwrap_or(0.0);
        let key = (num(2) as u32, num(3) as u32, num(4) as u32);

        if current_key == Some(key) {
            if let Some(line) = lines.last_mut() {
                line.push(' ');
                line.push_str(word);
            }
        } else {
            lines.push(word.to_string());
            current_key = Some(key);
        }

        spans.push(TextSpan {
            page,
            x: num(6),
            y: num(7),
            width: num(8),
            height: num(9),
            text: word.to_string(),
        });
    }

    (lines.join("\n"), spans)
}
