//! Registry mapping documents to the strategy that reads them.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, trace};

use super::{
    FormatStrategy, ImageReader, PdfReader, PlainTextReader, SpreadsheetReader, WordReader,
};
use crate::models::config::ReaderConfig;
use crate::ocr::OcrEngine;

/// Summary of a registered strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    pub name: String,
    pub priority: i32,
    pub extensions: Vec<String>,
}

/// Ordered table of format strategies.
///
/// Lookups take a read lock; registration takes the write lock, so
/// registrations never race with lookups.
#[derive(Default)]
pub struct ReaderRegistry {
    strategies: RwLock<Vec<Arc<dyn FormatStrategy>>>,
}

impl ReaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in PDF, Word, spreadsheet, image
    /// and plain-text readers.
    pub fn with_defaults(config: &ReaderConfig, ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(PdfReader::new(config.min_text_length, ocr.clone())));
        registry.register(Arc::new(WordReader::new()));
        registry.register(Arc::new(SpreadsheetReader::new()));
        registry.register(Arc::new(ImageReader::new(ocr)));
        registry.register(Arc::new(PlainTextReader::new()));
        registry
    }

    /// Register a strategy, replacing any strategy with the same name.
    pub fn register(&self, strategy: Arc<dyn FormatStrategy>) {
        let mut strategies = self.strategies.write().unwrap_or_else(|e| e.into_inner());
        strategies.retain(|s| s.name() != strategy.name());
        debug!(
            "Registered reader '{}' (priority {}) for {:?}",
            strategy.name(),
            strategy.priority(),
            strategy.extensions()
        );
        strategies.push(strategy);
    }

    /// Remove the strategy named `name`. Returns whether one was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut strategies = self.strategies.write().unwrap_or_else(|e| e.into_inner());
        let before = strategies.len();
        strategies.retain(|s| s.name() != name);
        strategies.len() != before
    }

    /// Select the highest-priority strategy that can process `path`.
    ///
    /// On equal priority the earlier registration wins.
    pub fn get_strategy(&self, path: &Path) -> Option<Arc<dyn FormatStrategy>> {
        let strategies = self.strategies.read().unwrap_or_else(|e| e.into_inner());
        let mut best: Option<&Arc<dyn FormatStrategy>> = None;

        for strategy in strategies.iter() {
            if !strategy.can_process(path) {
                continue;
            }
            if best.map_or(true, |b| strategy.priority() > b.priority()) {
                best = Some(strategy);
            }
        }

        match best {
            Some(s) => trace!("Selected reader '{}' for {}", s.name(), path.display()),
            None => debug!("No reader claims {}", path.display()),
        }
        best.cloned()
    }

    /// All extensions any registered strategy handles.
    pub fn supported_extensions(&self) -> BTreeSet<String> {
        let strategies = self.strategies.read().unwrap_or_else(|e| e.into_inner());
        strategies
            .iter()
            .flat_map(|s| s.extensions().iter().map(|e| e.to_string()))
            .collect()
    }

    /// Registered strategies by descending priority.
    pub fn strategies(&self) -> Vec<StrategyInfo> {
        let strategies = self.strategies.read().unwrap_or_else(|e| e.into_inner());
        let mut infos: Vec<StrategyInfo> = strategies
            .iter()
            .map(|s| StrategyInfo {
                name: s.name().to_string(),
                priority: s.priority(),
                extensions: s.extensions().iter().map(|e| e.to_string()).collect(),
            })
            .collect();
        infos.sort_by(|a, b| b.priority.cmp(&a.priority));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{ExtractedDocument, FileMetadata};
    use crate::reader::{ReaderLimits, Result, ValidationReport};

    struct Dummy {
        name: &'static str,
        priority: i32,
        extensions: Vec<&'static str>,
    }

    impl FormatStrategy for Dummy {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn extensions(&self) -> &[&'static str] {
            &self.extensions
        }
        fn validate(&self, _path: &Path, _limits: &ReaderLimits) -> ValidationReport {
            ValidationReport::valid()
        }
        fn process(&self, path: &Path) -> Result<ExtractedDocument> {
            Ok(ExtractedDocument::empty(self.name, FileMetadata { path: path.to_path_buf(), ..Default::default() }))
        }
    }

    fn dummy(name: &'static str, priority: i32, extensions: Vec<&'static str>) -> Arc<dyn FormatStrategy> {
        Arc::new(Dummy { name, priority, extensions })
    }

    #[test]
    fn test_highest_priority_wins() {
        let registry = ReaderRegistry::new();
        registry.register(dummy("generic", 1, vec!["txt", "log"]));
        registry.register(dummy("special", 5, vec!["log"]));

        let s = registry.get_strategy(Path::new("a.LOG")).unwrap();
        assert_eq!(s.name(), "special");
        let s = registry.get_strategy(Path::new("a.txt")).unwrap();
        assert_eq!(s.name(), "generic");
        assert!(registry.get_strategy(Path::new("a.xyz")).is_none());
        assert!(registry.get_strategy(Path::new("noext")).is_none());
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ReaderRegistry::new();
        registry.register(dummy("first", 1, vec!["abc"]));
        registry.register(dummy("second", 1, vec!["abc"]));
        assert_eq!(registry.get_strategy(Path::new("x.abc")).unwrap().name(), "first");

        assert!(registry.unregister("first"));
        assert!(!registry.unregister("first"));
        assert_eq!(registry.get_strategy(Path::new("x.abc")).unwrap().name(), "second");
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = ReaderRegistry::new();
        registry.register(dummy("custom", 1, vec!["abc"]));
        registry.register(dummy("custom", 1, vec!["def"]));
        assert_eq!(registry.strategies().len(), 1);
        assert!(registry.get_strategy(Path::new("x.abc")).is_none());
    }

    #[test]
    fn test_default_extensions() {
        let registry = ReaderRegistry::with_defaults(&ReaderConfig::default(), None);
        let exts = registry.supported_extensions();
        for ext in ["pdf", "docx", "xlsx", "xls", "png", "txt", "csv"] {
            assert!(exts.contains(ext), "missing {}", ext);
        }
        assert_eq!(registry.strategies()[0].name, "pdf");
    }
}
