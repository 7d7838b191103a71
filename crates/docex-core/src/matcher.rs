//! Template matcher: keyword scoring and selection policy.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::models::config::MatchingConfig;
use crate::models::result::{
    DecisionReason, ExcludedTemplate, ExclusionReason, MatchCandidate, MatchResult,
};
use crate::models::template::Template;

/// Tolerance for score comparisons.
const EPSILON: f64 = 1e-9;

/// Scores templates against document text and picks a winner.
///
/// Stateless apart from its configuration, so one matcher can be shared
/// across concurrently processed documents.
#[derive(Debug, Clone, Default)]
pub struct TemplateMatcher {
    config: MatchingConfig,
}

/// Outcome of scoring a single template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateScore {
    Candidate(MatchCandidate),
    Excluded(ExclusionReason),
}

impl TemplateMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Score one template against `text`.
    ///
    /// A template missing any required keyword is excluded outright. The
    /// score is `base + (1 - base) * optional_fraction`, clamped to 0..=1.
    pub fn score_template(&self, template: &Template, text: &str) -> TemplateScore {
        let haystack = text.to_lowercase();
        self.score_lowered(template, &haystack)
    }

    fn score_lowered(&self, template: &Template, haystack: &str) -> TemplateScore {
        let required = template.normalized_required();
        let missing: Vec<String> = required
            .iter()
            .filter(|k| !haystack.contains(k.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return TemplateScore::Excluded(ExclusionReason::MissingRequiredKeywords { missing });
        }

        let optional = template.normalized_optional();
        let matched_optional: Vec<String> = optional
            .iter()
            .filter(|k| haystack.contains(k.as_str()))
            .cloned()
            .collect();

        let base = self.config.base_weight.clamp(0.0, 1.0);
        let fraction = matched_optional.len() as f64 / optional.len().max(1) as f64;
        let score = (base + (1.0 - base) * fraction).clamp(0.0, 1.0);

        if score + EPSILON < template.minimum_confidence_threshold {
            return TemplateScore::Excluded(ExclusionReason::BelowMinimumConfidence {
                score,
                threshold: template.minimum_confidence_threshold,
            });
        }

        let mut matched_keywords = required.clone();
        matched_keywords.extend(matched_optional.iter().cloned());

        TemplateScore::Candidate(MatchCandidate {
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            score,
            matched_required: required.len(),
            matched_optional: matched_optional.len(),
            total_optional: optional.len(),
            matched_keywords,
        })
    }

    /// Rank all active templates for `text` and apply the decision policy.
    pub fn match_document(&self, templates: &[Template], text: &str) -> MatchResult {
        let haystack = text.to_lowercase();
        let mut candidates = Vec::new();
        let mut excluded = Vec::new();
        let mut active = 0usize;

        for template in templates.iter().filter(|t| t.active) {
            active += 1;
            match self.score_lowered(template, &haystack) {
                TemplateScore::Candidate(candidate) => {
                    trace!("Template '{}' scored {:.3}", template.id, candidate.score);
                    candidates.push(candidate);
                }
                TemplateScore::Excluded(reason) => {
                    debug!("Template '{}' excluded: {:?}", template.id, reason);
                    excluded.push(ExcludedTemplate {
                        template_id: template.id.clone(),
                        reason,
                    });
                }
            }
        }

        candidates.sort_by(rank);

        let (selected, decision) = if active == 0 {
            (None, DecisionReason::NoTemplatesConfigured)
        } else if candidates.is_empty() {
            (None, DecisionReason::BelowThreshold)
        } else {
            let top = &candidates[0];
            let clear = match candidates.get(1) {
                None => true,
                Some(second) => top.score - second.score + EPSILON >= self.config.min_confidence_gap,
            };
            let decision = if !clear {
                DecisionReason::AmbiguousRequiresConfirmation
            } else if self.clears_auto_threshold(templates, top) {
                DecisionReason::AutoSelected
            } else {
                DecisionReason::SelectedBelowAutoThreshold
            };
            (Some(top.template_id.clone()), decision)
        };

        debug!(
            "Matched {} candidates of {} active templates: {:?} -> {:?}",
            candidates.len(),
            active,
            selected,
            decision
        );

        MatchResult {
            candidates,
            selected,
            decision,
            excluded,
        }
    }

    fn clears_auto_threshold(&self, templates: &[Template], candidate: &MatchCandidate) -> bool {
        templates
            .iter()
            .find(|t| t.id == candidate.template_id)
            .is_some_and(|t| candidate.score + EPSILON >= t.auto_application_threshold)
    }
}

/// Descending score, then more required matches, then more optional
/// matches, then ascending id.
fn rank(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.matched_required.cmp(&a.matched_required))
        .then_with(|| b.matched_optional.cmp(&a.matched_optional))
        .then_with(|| a.template_id.cmp(&b.template_id))
}
