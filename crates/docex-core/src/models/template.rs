//! Template and field rule definitions.
//!
//! Templates are authored outside the engine (JSON files or a template
//! management UI) and are read-only for the duration of a matching run.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// A named rule set identifying a document class and its fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Stable identifier, unique within a template source.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Inactive templates are ignored by the matcher.
    #[serde(default = "default_true")]
    pub active: bool,

    /// Free-form category tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Generic catch-all templates may omit required keywords.
    #[serde(default)]
    pub catch_all: bool,

    /// Keywords that must all appear in the document (case-insensitive).
    #[serde(default)]
    pub required_keywords: Vec<String>,

    /// Keywords that raise the score when present.
    #[serde(default)]
    pub optional_keywords: Vec<String>,

    /// Score floor for becoming a candidate (0.0 - 1.0).
    pub minimum_confidence_threshold: f64,

    /// Score above which the template applies without confirmation.
    pub auto_application_threshold: f64,

    /// Field rules in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldRule>,
}

fn default_true() -> bool {
    true
}

/// One named extraction target within a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field name, unique within the template.
    pub name: String,

    /// Whether the document status depends on this field.
    #[serde(default)]
    pub required: bool,

    /// Extraction methods; tried in ascending priority.
    pub methods: Vec<ExtractionMethod>,

    /// Validation applied to the raw value of each method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

impl FieldRule {
    /// Methods sorted by priority; equal priorities keep declaration order.
    pub fn ordered_methods(&self) -> Vec<&ExtractionMethod> {
        let mut methods: Vec<&ExtractionMethod> = self.methods.iter().collect();
        methods.sort_by_key(|m| m.priority);
        methods
    }
}

/// An extraction technique with its priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMethod {
    /// Lower numbers are tried first.
    pub priority: u32,

    #[serde(flatten)]
    pub spec: MethodSpec,
}

impl ExtractionMethod {
    pub fn kind(&self) -> MethodKind {
        match self.spec {
            MethodSpec::Regex { .. } => MethodKind::Regex,
            MethodSpec::Zone { .. } => MethodKind::Zone,
            MethodSpec::KeywordProximity { .. } => MethodKind::KeywordProximity,
        }
    }
}

/// Parameters of an extraction method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MethodSpec {
    /// Regular expression over the full text.
    Regex {
        pattern: String,
        /// Capture group to return; defaults to 1 when the pattern has groups.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<usize>,
        #[serde(default)]
        case_insensitive: bool,
        #[serde(skip)]
        compiled: CompiledPattern,
    },

    /// Rectangle on a page; requires positional text.
    Zone { page: u32, rect: ZoneRect },

    /// Text window next to the first keyword found.
    KeywordProximity {
        keywords: Vec<String>,
        /// Window size; the engine default applies when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window: Option<usize>,
        #[serde(default)]
        unit: ProximityUnit,
        #[serde(default)]
        direction: ProximityDirection,
        #[serde(default = "default_true")]
        stop_at_line_end: bool,
    },
}

/// Discriminant of [`MethodSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Regex,
    Zone,
    KeywordProximity,
}

/// Axis-aligned rectangle, top-left origin, in reader units
/// (PDF points for PDFs, pixels for images).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ZoneRect {
    /// Check whether a point lies inside the rectangle (edges included).
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

/// Regex compiled on first use and kept with its rule.
///
/// The cache remembers the pattern and flags it was built from; a rule
/// edited after compilation is recompiled instead of served stale.
#[derive(Debug, Clone, Default)]
pub struct CompiledPattern(OnceLock<CachedRegex>);

#[derive(Debug, Clone)]
struct CachedRegex {
    pattern: String,
    case_insensitive: bool,
    multi_line: bool,
    regex: Regex,
}

impl CompiledPattern {
    /// The compiled form of `pattern` with the given flags.
    pub fn regex(
        &self,
        pattern: &str,
        case_insensitive: bool,
        multi_line: bool,
    ) -> Result<Cow<'_, Regex>, regex::Error> {
        let matches = |c: &CachedRegex| {
            c.pattern == pattern
                && c.case_insensitive == case_insensitive
                && c.multi_line == multi_line
        };

        if let Some(cached) = self.0.get() {
            return if matches(cached) {
                Ok(Cow::Borrowed(&cached.regex))
            } else {
                build_regex(pattern, case_insensitive, multi_line).map(Cow::Owned)
            };
        }

        let regex = build_regex(pattern, case_insensitive, multi_line)?;
        let cached = self.0.get_or_init(|| CachedRegex {
            pattern: pattern.to_string(),
            case_insensitive,
            multi_line,
            regex,
        });
        if matches(cached) {
            Ok(Cow::Borrowed(&cached.regex))
        } else {
            build_regex(pattern, case_insensitive, multi_line).map(Cow::Owned)
        }
    }

    /// Whether a compiled regex is cached.
    pub fn is_compiled(&self) -> bool {
        self.0.get().is_some()
    }
}

fn build_regex(pattern: &str, case_insensitive: bool, multi_line: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .multi_line(multi_line)
        .build()
}

/// Unit of a keyword-proximity window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityUnit {
    #[default]
    Characters,
    Words,
}

/// Where the window sits relative to the keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityDirection {
    #[default]
    After,
    Around,
}

/// Validation applied to an extracted raw value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldValidation {
    /// The value must match the pattern.
    Regex {
        pattern: String,
        #[serde(skip)]
        compiled: CompiledPattern,
    },

    /// The value must parse as a number within the inclusive bounds.
    NumericRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<Decimal>,
    },

    /// The value must have a well-known shape.
    Format { format: ValueFormat },

    /// The value must be one of the listed values (case-insensitive).
    OneOf { values: Vec<String> },
}

/// Enumerated value formats common in threat-intelligence reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Email,
    Url,
    Domain,
    Ipv4,
    Ipv6,
    Md5,
    Sha1,
    Sha256,
    Cve,
    Date,
}

impl Template {
    /// Check the template invariants.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let id = self.id.as_str();
        if id.trim().is_empty() {
            return Err(TemplateError::invalid(id, "id must not be empty"));
        }

        for (label, value) in [
            ("minimum_confidence_threshold", self.minimum_confidence_threshold),
            ("auto_application_threshold", self.auto_application_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TemplateError::invalid(
                    id,
                    format!("{} must be within 0..=1, got {}", label, value),
                ));
            }
        }

        if self.auto_application_threshold < self.minimum_confidence_threshold {
            return Err(TemplateError::invalid(
                id,
                "auto_application_threshold must not be below minimum_confidence_threshold",
            ));
        }

        if self.required_keywords.is_empty() && !self.catch_all {
            return Err(TemplateError::invalid(
                id,
                "required_keywords must not be empty unless the template is a catch-all",
            ));
        }

        if self
            .required_keywords
            .iter()
            .chain(&self.optional_keywords)
            .any(|k| k.trim().is_empty())
        {
            return Err(TemplateError::invalid(id, "keywords must not be blank"));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(TemplateError::invalid(
                    id,
                    format!("duplicate field name '{}'", field.name),
                ));
            }
            field.validate(id)?;
        }

        Ok(())
    }

    /// Lowercased, trimmed required keywords.
    pub fn normalized_required(&self) -> Vec<String> {
        normalize_keywords(&self.required_keywords)
    }

    /// Lowercased, trimmed optional keywords.
    pub fn normalized_optional(&self) -> Vec<String> {
        normalize_keywords(&self.optional_keywords)
    }
}

impl FieldRule {
    fn validate(&self, template_id: &str) -> Result<(), TemplateError> {
        let field = self.name.as_str();
        if field.trim().is_empty() {
            return Err(TemplateError::invalid(template_id, "field name must not be empty"));
        }
        if self.methods.is_empty() {
            return Err(TemplateError::invalid(
                template_id,
                format!("field '{}' has no extraction method", field),
            ));
        }

        for method in &self.methods {
            match &method.spec {
                MethodSpec::Regex {
                    pattern,
                    case_insensitive,
                    compiled,
                    ..
                } => {
                    compiled.regex(pattern, *case_insensitive, true).map_err(|e| {
                        TemplateError::invalid(
                            template_id,
                            format!("field '{}': invalid regex: {}", field, e),
                        )
                    })?;
                }
                MethodSpec::Zone { page, rect } => {
                    if *page == 0 {
                        return Err(TemplateError::invalid(
                            template_id,
                            format!("field '{}': zone pages are 1-based", field),
                        ));
                    }
                    if rect.width <= 0.0 || rect.height <= 0.0 {
                        return Err(TemplateError::invalid(
                            template_id,
                            format!("field '{}': zone rectangle must have a positive size", field),
                        ));
                    }
                }
                MethodSpec::KeywordProximity { keywords, window, .. } => {
                    if keywords.iter().all(|k| k.trim().is_empty()) {
                        return Err(TemplateError::invalid(
                            template_id,
                            format!("field '{}': proximity method needs a keyword", field),
                        ));
                    }
                    if *window == Some(0) {
                        return Err(TemplateError::invalid(
                            template_id,
                            format!("field '{}': proximity window must be positive", field),
                        ));
                    }
                }
            }
        }

        if let Some(FieldValidation::Regex { pattern, compiled }) = &self.validation {
            compiled.regex(pattern, false, false).map_err(|e| {
                TemplateError::invalid(
                    template_id,
                    format!("field '{}': invalid validation regex: {}", field, e),
                )
            })?;
        }

        Ok(())
    }
}

fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_json() -> &'static str {
        r#"{
            "id": "incident-report",
            "name": "Incident Report",
            "required_keywords": ["Incident"],
            "optional_keywords": ["threat", "analysis"],
            "minimum_confidence_threshold": 0.5,
            "auto_application_threshold": 0.8,
            "fields": [
                {
                    "name": "incident_id",
                    "required": true,
                    "methods": [
                        {"kind": "zone", "priority": 2, "page": 1,
                         "rect": {"x": 0, "y": 0, "width": 200, "height": 40}},
                        {"kind": "regex", "priority": 1,
                         "pattern": "Incident ID:\\s*([A-Z0-9-]+)"}
                    ],
                    "validation": {"kind": "regex", "pattern": "^[A-Z]+-\\d{4}-\\d+$"}
                },
                {
                    "name": "severity",
                    "methods": [
                        {"kind": "keyword_proximity", "priority": 1, "keywords": ["Severity"]}
                    ],
                    "validation": {"kind": "one_of", "values": ["low", "medium", "high"]}
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_template() {
        let template: Template = serde_json::from_str(template_json()).unwrap();
        assert!(template.active);
        assert!(template.validate().is_ok());
        assert_eq!(template.normalized_required(), vec!["incident".to_string()]);

        let ordered = template.fields[0].ordered_methods();
        assert_eq!(ordered[0].kind(), MethodKind::Regex);
        assert_eq!(ordered[1].kind(), MethodKind::Zone);

        match &template.fields[1].methods[0].spec {
            MethodSpec::KeywordProximity {
                window,
                unit,
                direction,
                stop_at_line_end,
                ..
            } => {
                assert_eq!(*window, None);
                assert_eq!(*unit, ProximityUnit::Characters);
                assert_eq!(*direction, ProximityDirection::After);
                assert!(*stop_at_line_end);
            }
            other => panic!("unexpected method {:?}", other),
        }
    }

    #[test]
    fn test_numeric_range_accepts_numbers() {
        let validation: FieldValidation =
            serde_json::from_str(r#"{"kind": "numeric_range", "min": 0, "max": 10.5}"#).unwrap();
        match validation {
            FieldValidation::NumericRange { min, max } => {
                assert_eq!(min, Some(Decimal::ZERO));
                assert_eq!(max, Some(Decimal::new(105, 1)));
            }
            other => panic!("unexpected validation {:?}", other),
        }
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let mut template: Template = serde_json::from_str(template_json()).unwrap();
        template.auto_application_threshold = 0.4;
        assert!(matches!(template.validate(), Err(TemplateError::Invalid { .. })));
    }

    #[test]
    fn test_required_keywords_needed_unless_catch_all() {
        let mut template: Template = serde_json::from_str(template_json()).unwrap();
        template.required_keywords.clear();
        assert!(template.validate().is_err());

        template.catch_all = true;
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_field_rules() {
        let mut template: Template = serde_json::from_str(template_json()).unwrap();
        template.fields[1].name = "incident_id".to_string();
        assert!(template.validate().is_err());

        let mut template: Template = serde_json::from_str(template_json()).unwrap();
        template.fields[0].methods.clear();
        assert!(template.validate().is_err());

        let mut template: Template = serde_json::from_str(template_json()).unwrap();
        template.fields[0].methods[1].spec = MethodSpec::Regex {
            pattern: "([unclosed".to_string(),
            group: None,
            case_insensitive: false,
            compiled: CompiledPattern::default(),
        };
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_validate_compiles_patterns_once() {
        let template: Template = serde_json::from_str(template_json()).unwrap();
        template.validate().unwrap();

        let MethodSpec::Regex { compiled, .. } = &template.fields[0].methods[1].spec else {
            panic!("expected a regex method");
        };
        assert!(compiled.is_compiled());
        let Some(FieldValidation::Regex { compiled, .. }) = &template.fields[0].validation else {
            panic!("expected a regex validation");
        };
        assert!(compiled.is_compiled());

        // Clones carry the compiled form along.
        let copy = template.clone();
        let MethodSpec::Regex { compiled, .. } = &copy.fields[0].methods[1].spec else {
            panic!("expected a regex method");
        };
        assert!(compiled.is_compiled());
    }

    #[test]
    fn test_compiled_pattern_follows_edits() {
        let cache = CompiledPattern::default();
        assert!(cache.regex(r"^SEC-\d+$", false, false).unwrap().is_match("SEC-1"));
        assert!(matches!(cache.regex(r"^SEC-\d+$", false, false).unwrap(), Cow::Borrowed(_)));

        let edited = cache.regex(r"^CVE-\d+$", true, false).unwrap();
        assert!(edited.is_match("cve-7"));
        assert!(!edited.is_match("SEC-1"));
        assert!(cache.regex("(", false, false).is_err());
    }

    #[test]
    fn test_zone_rect_contains() {
        let rect = ZoneRect { x: 10.0, y: 10.0, width: 100.0, height: 20.0 };
        assert!(rect.contains(10.0, 10.0));
        assert!(rect.contains(60.0, 25.0));
        assert!(!rect.contains(60.0, 31.0));
        assert!(!rect.contains(5.0, 15.0));
    }
}
