//! The three extraction techniques: regex, zone and keyword proximity.

use regex::{Regex, RegexBuilder};

use crate::models::document::{join_spans, ExtractedDocument, TextSpan};
use crate::models::template::{
    CompiledPattern, MethodSpec, ProximityDirection, ProximityUnit, ZoneRect,
};

/// Characters skipped between a keyword and its value.
const LABEL_SEPARATORS: &[char] = &[':', '-', '#', '='];

/// Raw outcome of running one method, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutcome {
    /// A non-empty, trimmed value.
    Value(String),
    NoMatch,
    /// The method does not apply to this document.
    Skipped(String),
    /// The method is misconfigured.
    Error(String),
}

/// Run `spec` against `doc`.
pub fn run_method(spec: &MethodSpec, doc: &ExtractedDocument, default_window: usize) -> MethodOutcome {
    match spec {
        MethodSpec::Regex {
            pattern,
            group,
            case_insensitive,
            compiled,
        } => match compiled.regex(pattern, *case_insensitive, true) {
            Ok(re) => capture_value(&re, &doc.text, *group),
            Err(e) => MethodOutcome::Error(format!("invalid pattern: {}", e)),
        },
        MethodSpec::Zone { page, rect } => match &doc.spans {
            Some(spans) if !spans.is_empty() => zone_value(spans, *page, rect),
            _ => MethodOutcome::Skipped("document has no positional text".to_string()),
        },
        MethodSpec::KeywordProximity {
            keywords,
            window,
            unit,
            direction,
            stop_at_line_end,
        } => proximity_value(
            &doc.text,
            keywords,
            window.unwrap_or(default_window),
            *unit,
            *direction,
            *stop_at_line_end,
        ),
    }
}

/// First match whose selected group is non-empty after trimming.
///
/// Without an explicit group, group 1 is used when the pattern has one.
pub fn regex_value(text: &str, pattern: &str, group: Option<usize>, case_insensitive: bool) -> MethodOutcome {
    let compiled = CompiledPattern::default();
    match compiled.regex(pattern, case_insensitive, true) {
        Ok(re) => capture_value(&re, text, group),
        Err(e) => MethodOutcome::Error(format!("invalid pattern: {}", e)),
    }
}

fn capture_value(re: &Regex, text: &str, group: Option<usize>) -> MethodOutcome {
    let group = group.unwrap_or(if re.captures_len() > 1 { 1 } else { 0 });
    if group >= re.captures_len() {
        return MethodOutcome::Error(format!("pattern has no capture group {}", group));
    }

    let found = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(group))
        .map(|m| m.as_str().trim())
        .find(|v| !v.is_empty())
        .map(|v| v.to_string());
    match found {
        Some(value) => MethodOutcome::Value(value),
        None => MethodOutcome::NoMatch,
    }
}

/// Text of the spans on `page` whose centre lies inside `rect`.
pub fn zone_value(spans: &[TextSpan], page: u32, rect: &ZoneRect) -> MethodOutcome {
    let mut inside: Vec<&TextSpan> = spans
        .iter()
        .filter(|s| s.page == page)
        .filter(|s| {
            let (cx, cy) = s.center();
            rect.contains(cx, cy)
        })
        .collect();

    if inside.is_empty() {
        return MethodOutcome::NoMatch;
    }

    // Half the average span height groups spans into rows.
    let avg_height = inside.iter().map(|s| s.height).sum::<f32>() / inside.len() as f32;
    let text = join_spans(&mut inside, avg_height / 2.0);
    let text = text.trim();

    if text.is_empty() {
        MethodOutcome::NoMatch
    } else {
        MethodOutcome::Value(text.to_string())
    }
}

/// Window of text next to the first listed keyword present in `text`.
pub fn proximity_value(
    text: &str,
    keywords: &[String],
    window: usize,
    unit: ProximityUnit,
    direction: ProximityDirection,
    stop_at_line_end: bool,
) -> MethodOutcome {
    let anchor = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .find_map(|k| {
            RegexBuilder::new(&regex::escape(k))
                .case_insensitive(true)
                .build()
                .ok()?
                .find(text)
                .map(|m| (m.start(), m.end()))
        });

    let Some((start, end)) = anchor else {
        return MethodOutcome::NoMatch;
    };

    let value = match direction {
        ProximityDirection::After => {
            let rest = text[end..]
                .trim_start_matches(|c: char| c.is_whitespace() || LABEL_SEPARATORS.contains(&c));
            let rest = if stop_at_line_end {
                rest.split(['\n', '\r']).next().unwrap_or_default()
            } else {
                rest
            };
            take_forward(rest, window, unit)
        }
        ProximityDirection::Around => {
            let before = take_backward(&text[..start], window, unit);
            let after = take_forward(&text[end..], window, unit);
            format!("{}{}{}", before, &text[start..end], after)
        }
    };

    let value = value.trim();
    if value.is_empty() {
        MethodOutcome::NoMatch
    } else {
        MethodOutcome::Value(value.to_string())
    }
}

fn take_forward(text: &str, window: usize, unit: ProximityUnit) -> String {
    if window == 0 {
        return String::new();
    }
    match unit {
        ProximityUnit::Characters => text.chars().take(window).collect(),
        ProximityUnit::Words => {
            let mut taken = 0;
            let mut cut = text.len();
            let mut in_word = false;
            for (i, c) in text.char_indices() {
                if c.is_whitespace() {
                    if in_word {
                        taken += 1;
                        in_word = false;
                        if taken == window {
                            cut = i;
                            break;
                        }
                    }
                } else {
                    in_word = true;
                }
            }
            text[..cut].to_string()
        }
    }
}

fn take_backward(text: &str, window: usize, unit: ProximityUnit) -> String {
    match unit {
        ProximityUnit::Characters => {
            let skip = text.chars().count().saturating_sub(window);
            text.chars().skip(skip).collect()
        }
        ProximityUnit::Words => {
            let words: Vec<&str> = text.split_whitespace().collect();
            let from = words.len().saturating_sub(window);
            let mut joined = words[from..].join(" ");
            if !joined.is_empty() && text.ends_with(char::is_whitespace) {
                joined.push(' ');
            }
            joined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    fn span(page: u32, x: f32, y: f32, text: &str) -> TextSpan {
        TextSpan { page, x, y, width: 40.0, height: 10.0, text: text.to_string() }
    }

    #[test]
    fn test_regex_default_group() {
        let text = "Incident ID: SEC-2025-001";
        assert_eq!(
            regex_value(text, r"Incident ID:\s*([A-Z0-9-]+)", None, false),
            MethodOutcome::Value("SEC-2025-001".to_string())
        );
        assert_eq!(
            regex_value(text, r"SEC-\d+-\d+", None, false),
            MethodOutcome::Value("SEC-2025-001".to_string())
        );
        assert_eq!(
            regex_value(text, r"incident id:\s*(\S+)", None, true),
            MethodOutcome::Value("SEC-2025-001".to_string())
        );
        assert_eq!(regex_value(text, r"Ticket:\s*(\S+)", None, false), MethodOutcome::NoMatch);
    }

    #[test]
    fn test_regex_skips_empty_groups_and_bad_config() {
        let text = "Actor: \nActor: APT29";
        assert_eq!(
            regex_value(text, r"Actor:[ \t]*(\S*)", None, false),
            MethodOutcome::Value("APT29".to_string())
        );
        assert!(matches!(regex_value(text, r"Actor", Some(2), false), MethodOutcome::Error(_)));
        assert!(matches!(regex_value(text, r"(", None, false), MethodOutcome::Error(_)));
    }

    #[test]
    fn test_proximity_after() {
        let text = "Report\nSeverity: High\nStatus - open";
        let kw = keywords(&["priority", "severity"]);
        assert_eq!(
            proximity_value(text, &kw, 64, ProximityUnit::Characters, ProximityDirection::After, true),
            MethodOutcome::Value("High".to_string())
        );
        assert_eq!(
            proximity_value(text, &keywords(&["status"]), 2, ProximityUnit::Characters, ProximityDirection::After, true),
            MethodOutcome::Value("op".to_string())
        );
    }

    #[test]
    fn test_proximity_value_on_next_line() {
        let text = "Threat Actor:\nAPT29 (Cozy Bear)\nMotivation: espionage";
        assert_eq!(
            proximity_value(text, &keywords(&["threat actor"]), 64, ProximityUnit::Characters, ProximityDirection::After, true),
            MethodOutcome::Value("APT29 (Cozy Bear)".to_string())
        );
    }

    #[test]
    fn test_proximity_words_and_around() {
        let text = "the sample beacons to evil.example.com over HTTPS daily";
        assert_eq!(
            proximity_value(text, &keywords(&["beacons to"]), 2, ProximityUnit::Words, ProximityDirection::After, true),
            MethodOutcome::Value("evil.example.com over".to_string())
        );
        assert_eq!(
            proximity_value(text, &keywords(&["over"]), 1, ProximityUnit::Words, ProximityDirection::Around, true),
            MethodOutcome::Value("evil.example.com over HTTPS".to_string())
        );
        assert_eq!(
            proximity_value(text, &keywords(&["missing"]), 5, ProximityUnit::Words, ProximityDirection::After, true),
            MethodOutcome::NoMatch
        );
    }

    #[test]
    fn test_proximity_without_value() {
        let text = "Severity:\n";
        assert_eq!(
            proximity_value(text, &keywords(&["severity"]), 10, ProximityUnit::Characters, ProximityDirection::After, true),
            MethodOutcome::NoMatch
        );
    }

    #[test]
    fn test_zone_selects_by_centre() {
        let spans = vec![
            span(1, 10.0, 10.0, "Incident"),
            span(1, 55.0, 11.0, "SEC-7"),
            span(1, 10.0, 200.0, "Footer"),
            span(2, 10.0, 10.0, "Other page"),
        ];
        let rect = ZoneRect { x: 0.0, y: 0.0, width: 120.0, height: 30.0 };
        assert_eq!(zone_value(&spans, 1, &rect), MethodOutcome::Value("Incident SEC-7".to_string()));
        assert_eq!(zone_value(&spans, 3, &rect), MethodOutcome::NoMatch);
    }

    #[test]
    fn test_zone_keeps_slightly_offset_spans_on_one_row() {
        let spans = vec![span(1, 60.0, 9.8, "SEC-7"), span(1, 10.0, 10.2, "Incident")];
        let rect = ZoneRect { x: 0.0, y: 0.0, width: 120.0, height: 30.0 };
        assert_eq!(zone_value(&spans, 1, &rect), MethodOutcome::Value("Incident SEC-7".to_string()));
    }

    #[test]
    fn test_run_regex_method_uses_compiled_pattern() {
        let mut doc = ExtractedDocument::empty("text", Default::default());
        doc.text = "Incident ID: SEC-2025-001".to_string();
        let spec: MethodSpec = serde_json::from_str(
            r#"{"kind": "regex", "pattern": "incident id:\\s*(\\S+)", "case_insensitive": true}"#,
        )
        .unwrap();

        for _ in 0..2 {
            assert_eq!(run_method(&spec, &doc, 64), MethodOutcome::Value("SEC-2025-001".to_string()));
        }
        let MethodSpec::Regex { compiled, .. } = &spec else {
            unreachable!()
        };
        assert!(compiled.is_compiled());
    }

    #[test]
    fn test_zone_without_positions_is_skipped() {
        let doc = ExtractedDocument::empty("text", Default::default());
        let spec = MethodSpec::Zone {
            page: 1,
            rect: ZoneRect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
        };
        assert!(matches!(run_method(&spec, &doc, 64), MethodOutcome::Skipped(_)));
    }
}
