//! Templates loaded from a directory of JSON files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::{check_templates, TemplateSnapshot, TemplateSource};
use crate::error::TemplateError;
use crate::models::template::Template;

/// A file holds either one template or an array of templates.
#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateFile {
    Many(Vec<Template>),
    One(Box<Template>),
}

/// Reads every `*.json` file in a directory on each snapshot.
#[derive(Debug, Clone)]
pub struct TemplateDirectory {
    dir: PathBuf,
}

impl TemplateDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Load and validate all templates, sorted by file name.
    pub fn load(&self) -> Result<Vec<Template>, TemplateError> {
        let source_error = |source| TemplateError::Source {
            path: self.dir.clone(),
            source,
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(source_error)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
            })
            .collect();
        files.sort();

        let mut templates = Vec::new();
        for file in files {
            let content = std::fs::read_to_string(&file).map_err(|source| TemplateError::Source {
                path: file.clone(),
                source,
            })?;
            let parsed: TemplateFile =
                serde_json::from_str(&content).map_err(|source| TemplateError::Parse {
                    path: file.clone(),
                    source,
                })?;
            let loaded = match parsed {
                TemplateFile::Many(list) => list,
                TemplateFile::One(template) => vec![*template],
            };
            debug!("Loaded {} templates from {}", loaded.len(), file.display());
            templates.extend(loaded);
        }

        check_templates(&templates)?;
        info!(
            "Loaded {} templates from {}",
            templates.len(),
            self.dir.display()
        );
        Ok(templates)
    }
}

impl TemplateSource for TemplateDirectory {
    fn snapshot(&self) -> Result<TemplateSnapshot, TemplateError> {
        Ok(Arc::from(self.load()?))
    }
}
