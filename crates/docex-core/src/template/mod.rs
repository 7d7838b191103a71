//! Template sources.
//!
//! The engine reads templates through [`TemplateSource::snapshot`], which
//! hands out an immutable slice. Edits build a new slice, so a snapshot
//! taken for a batch run never changes underneath it.

mod directory;
mod store;

pub use directory::TemplateDirectory;
pub use store::TemplateStore;

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::TemplateError;
use crate::models::template::Template;

/// Immutable template list shared by every document in a run.
pub type TemplateSnapshot = Arc<[Template]>;

/// Supplies the template list for a run.
pub trait TemplateSource: Send + Sync {
    /// Current templates. Errors abort a batch before any document runs.
    fn snapshot(&self) -> Result<TemplateSnapshot, TemplateError>;
}

impl TemplateSource for TemplateSnapshot {
    fn snapshot(&self) -> Result<TemplateSnapshot, TemplateError> {
        Ok(Arc::clone(self))
    }
}

/// Validate every template and reject duplicate ids.
pub(crate) fn check_templates(templates: &[Template]) -> Result<(), TemplateError> {
    let mut ids = HashSet::new();
    for template in templates {
        template.validate()?;
        if !ids.insert(template.id.as_str()) {
            return Err(TemplateError::DuplicateId(template.id.clone()));
        }
    }
    Ok(())
}
