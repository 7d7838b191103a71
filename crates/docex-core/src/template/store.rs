//! In-memory copy-on-write template store.

use std::sync::{Arc, RwLock};

use tracing::debug;

use super::{check_templates, TemplateSnapshot, TemplateSource};
use crate::error::TemplateError;
use crate::models::template::Template;

/// Editable template collection.
///
/// Every edit validates the new list and swaps in a fresh slice; readers
/// holding an older snapshot keep seeing the old templates.
pub struct TemplateStore {
    templates: RwLock<TemplateSnapshot>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self {
            templates: RwLock::new(Arc::from(Vec::new())),
        }
    }
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from an initial template list.
    pub fn from_templates(templates: Vec<Template>) -> Result<Self, TemplateError> {
        check_templates(&templates)?;
        Ok(Self {
            templates: RwLock::new(Arc::from(templates)),
        })
    }

    /// Insert a template or replace the one with the same id.
    pub fn upsert(&self, template: Template) -> Result<(), TemplateError> {
        template.validate()?;
        self.update(|templates| {
            match templates.iter_mut().find(|t| t.id == template.id) {
                Some(existing) => *existing = template,
                None => templates.push(template),
            }
            Ok(())
        })
    }

    /// Remove the template with `id`.
    pub fn remove(&self, id: &str) -> Result<Template, TemplateError> {
        let mut removed = None;
        self.update(|templates| {
            let index = templates
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;
            removed = Some(templates.remove(index));
            Ok(())
        })?;
        removed.ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// Activate or deactivate the template with `id`.
    pub fn set_active(&self, id: &str, active: bool) -> Result<(), TemplateError> {
        self.update(|templates| {
            let template = templates
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;
            template.active = active;
            Ok(())
        })
    }

    /// Look up a template by id.
    pub fn get(&self, id: &str) -> Option<Template> {
        self.read().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> TemplateSnapshot {
        Arc::clone(&self.templates.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn update(
        &self,
        edit: impl FnOnce(&mut Vec<Template>) -> Result<(), TemplateError>,
    ) -> Result<(), TemplateError> {
        let mut guard = self.templates.write().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.to_vec();
        edit(&mut next)?;
        check_templates(&next)?;
        debug!("Template store now holds {} templates", next.len());
        *guard = Arc::from(next);
        Ok(())
    }
}

impl TemplateSource for TemplateStore {
    fn snapshot(&self) -> Result<TemplateSnapshot, TemplateError> {
        Ok(self.read())
    }
}
