//! Validation rules applied to raw field values.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use super::patterns::{self, refang, DATE_FORMATS, NUMERIC_NOISE};
use crate::models::template::{FieldValidation, ValueFormat};

/// Why a value did not pass validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The value does not satisfy the rule.
    #[error("{0}")]
    Rejected(String),

    /// The rule itself cannot be applied.
    #[error("invalid validation rule: {0}")]
    InvalidRule(String),
}

/// Check `value` against `rule`.
pub fn validate_value(value: &str, rule: &FieldValidation) -> Result<(), ValidationError> {
    match rule {
        FieldValidation::Regex { pattern, compiled } => {
            let re = compiled
                .regex(pattern, false, false)
                .map_err(|e| ValidationError::InvalidRule(e.to_string()))?;
            if re.is_match(value) {
                Ok(())
            } else {
                Err(ValidationError::Rejected(format!(
                    "value does not match pattern '{}'",
                    pattern
                )))
            }
        }
        FieldValidation::NumericRange { min, max } => {
            let number = parse_number(value).ok_or_else(|| {
                ValidationError::Rejected(format!("'{}' is not a number", value))
            })?;
            if let Some(min) = min {
                if number < *min {
                    return Err(ValidationError::Rejected(format!(
                        "{} is below the minimum {}",
                        number, min
                    )));
                }
            }
            if let Some(max) = max {
                if number > *max {
                    return Err(ValidationError::Rejected(format!(
                        "{} is above the maximum {}",
                        number, max
                    )));
                }
            }
            Ok(())
        }
        FieldValidation::Format { format } => {
            if matches_format(value, *format) {
                Ok(())
            } else {
                Err(ValidationError::Rejected(format!(
                    "value is not a valid {:?}",
                    format
                )))
            }
        }
        FieldValidation::OneOf { values } => {
            if values.iter().any(|v| v.trim().eq_ignore_ascii_case(value.trim())) {
                Ok(())
            } else {
                Err(ValidationError::Rejected(format!(
                    "value is not one of {}",
                    values.join(", ")
                )))
            }
        }
    }
}

/// Parse a decimal number, ignoring thousands separators and currency marks.
pub fn parse_number(value: &str) -> Option<Decimal> {
    let cleaned = NUMERIC_NOISE.replace_all(value.trim(), "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Whether `value` has the shape of `format`.
pub fn matches_format(value: &str, format: ValueFormat) -> bool {
    let value = value.trim();
    match format {
        ValueFormat::Email => patterns::EMAIL.is_match(value),
        ValueFormat::Url => patterns::URL.is_match(&refang(value)),
        ValueFormat::Domain => patterns::DOMAIN.is_match(&refang(value)),
        ValueFormat::Ipv4 => Ipv4Addr::from_str(&refang(value)).is_ok(),
        ValueFormat::Ipv6 => Ipv6Addr::from_str(value.trim_start_matches('[').trim_end_matches(']')).is_ok(),
        ValueFormat::Md5 => patterns::MD5.is_match(value),
        ValueFormat::Sha1 => patterns::SHA1.is_match(value),
        ValueFormat::Sha256 => patterns::SHA256.is_match(value),
        ValueFormat::Cve => patterns::CVE.is_match(value),
        ValueFormat::Date => DATE_FORMATS
            .iter()
            .any(|f| NaiveDate::parse_from_str(value, f).is_ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::CompiledPattern;

    fn range(min: Option<i64>, max: Option<i64>) -> FieldValidation {
        FieldValidation::NumericRange {
            min: min.map(Decimal::from),
            max: max.map(Decimal::from),
        }
    }

    #[test]
    fn test_regex_rule() {
        let rule = FieldValidation::Regex {
            pattern: r"^SEC-\d{4}-\d+$".to_string(),
            compiled: CompiledPattern::default(),
        };
        assert!(validate_value("SEC-2025-001", &rule).is_ok());
        assert!(matches!(validate_value("SEC-25", &rule), Err(ValidationError::Rejected(_))));

        let broken = FieldValidation::Regex {
            pattern: "(".to_string(),
            compiled: CompiledPattern::default(),
        };
        assert!(matches!(validate_value("x", &broken), Err(ValidationError::InvalidRule(_))));
    }

    #[test]
    fn test_regex_rule_reuses_compiled_pattern() {
        let rule = FieldValidation::Regex {
            pattern: r"^CVE-\d{4}-\d+$".to_string(),
            compiled: CompiledPattern::default(),
        };
        for _ in 0..3 {
            assert!(validate_value("CVE-2024-3094", &rule).is_ok());
        }
        let FieldValidation::Regex { compiled, .. } = &rule else {
            unreachable!()
        };
        assert!(compiled.is_compiled());
    }

    #[test]
    fn test_numeric_range() {
        assert!(validate_value("7", &range(Some(0), Some(10))).is_ok());
        assert!(validate_value("10", &range(Some(0), Some(10))).is_ok());
        assert!(validate_value("10.01", &range(Some(0), Some(10))).is_err());
        assert!(validate_value("-1", &range(Some(0), None)).is_err());
        assert!(validate_value("$1,250,000", &range(None, Some(2_000_000))).is_ok());
        assert!(validate_value("high", &range(None, None)).is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("USD 1,250.50"), Some(Decimal::new(125050, 2)));
        assert_eq!(parse_number(" 42 "), Some(Decimal::from(42)));
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_formats() {
        assert!(matches_format("198.51.100.7", ValueFormat::Ipv4));
        assert!(matches_format("198[.]51[.]100[.]7", ValueFormat::Ipv4));
        assert!(!matches_format("999.1.1.1", ValueFormat::Ipv4));
        assert!(matches_format("2001:db8::1", ValueFormat::Ipv6));
        assert!(matches_format("hxxp://evil[.]example/x", ValueFormat::Url));
        assert!(matches_format("2025-03-14", ValueFormat::Date));
        assert!(matches_format("14.03.2025", ValueFormat::Date));
        assert!(matches_format("March 14, 2025", ValueFormat::Date));
        assert!(!matches_format("2025-13-40", ValueFormat::Date));
        assert!(matches_format("CVE-2021-44228", ValueFormat::Cve));
    }

    #[test]
    fn test_one_of_is_case_insensitive() {
        let rule = FieldValidation::OneOf {
            values: vec!["Low".to_string(), "Medium".to_string(), "High".to_string()],
        };
        assert!(validate_value("HIGH", &rule).is_ok());
        assert!(validate_value("critical", &rule).is_err());
    }
}
