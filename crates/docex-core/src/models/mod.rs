//! Data models for templates, documents and results.

pub mod config;
pub mod document;
pub mod result;
pub mod template;
