//! Shared form and entity validation.
//!
//! Rules are evaluated per field in order. A failing `Required` stops evaluation for that
//! field; an empty optional field skips the remaining rules. Lengths are counted in
//! characters, not bytes, so "Ñandú" has length 5.
//!
//! Rules can also be written in the compact `required|min:2|max:100|email` form:
//!
//! ```rust
//! use elfaro::validation::{Rule, Validator};
//!
//! let rules = Rule::parse_list("required|min:2|max:100").unwrap();
//! let mut v = Validator::new();
//! v.check("nombre", "A", &rules);
//! assert!(v.finish().is_err());
//! ```

use crate::error::ValidationErrors;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email regex should be valid")
});

/// True when `value` looks like a deliverable address (`local@domain.tld`).
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 254 && EMAIL_REGEX.is_match(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    Min(usize),
    Max(usize),
    Email,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid rule {rule:?} in {spec:?}")]
pub struct RuleParseError {
    pub spec: String,
    pub rule: String,
}

impl Rule {
    /// Parse a `|`-separated rule list such as `required|min:10|max:1000`.
    pub fn parse_list(spec: &str) -> Result<Vec<Rule>, RuleParseError> {
        spec.split('|')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|raw| {
                let bad = || RuleParseError {
                    spec: spec.to_string(),
                    rule: raw.to_string(),
                };
                match raw.split_once(':') {
                    None if raw == "required" => Ok(Rule::Required),
                    None if raw == "email" => Ok(Rule::Email),
                    Some(("min", n)) => n.parse().map(Rule::Min).map_err(|_| bad()),
                    Some(("max", n)) => n.parse().map(Rule::Max).map_err(|_| bad()),
                    _ => Err(bad()),
                }
            })
            .collect()
    }
}

/// Accumulates field errors across several checks.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `value` using the field name in messages.
    pub fn check(&mut self, field: &str, value: &str, rules: &[Rule]) -> &mut Self {
        self.check_labeled(field, field, value, rules)
    }

    /// Check `value`, naming the field `label` in user-facing messages.
    pub fn check_labeled(
        &mut self,
        field: &str,
        label: &str,
        value: &str,
        rules: &[Rule],
    ) -> &mut Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            if rules.contains(&Rule::Required) {
                self.errors
                    .add(field, format!("El campo {label} es requerido"));
            }
            return self;
        }

        let length = trimmed.chars().count();
        for rule in rules {
            let failure = match rule {
                Rule::Required => None,
                Rule::Min(min) if length < *min => Some(format!(
                    "El campo {label} debe tener al menos {min} caracteres"
                )),
                Rule::Max(max) if length > *max => Some(format!(
                    "El campo {label} no puede tener más de {max} caracteres"
                )),
                Rule::Email if !is_valid_email(trimmed) => {
                    Some(format!("El campo {label} debe ser un email válido"))
                }
                Rule::OneOf(allowed) if !allowed.contains(&trimmed) => {
                    Some(format!("El campo {label} no es válido"))
                }
                _ => None,
            };
            if let Some(message) = failure {
                self.errors.add(field, message);
                break;
            }
        }
        self
    }

    /// Record a message produced by a check that is not a plain rule.
    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.add(field, message);
        self
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        self.errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_list() {
        assert_eq!(
            Rule::parse_list("required|min:2|max:100|email").unwrap(),
            vec![Rule::Required, Rule::Min(2), Rule::Max(100), Rule::Email]
        );
        assert!(Rule::parse_list("required|min:x").is_err());
        assert!(Rule::parse_list("unknown").is_err());
    }

    #[test]
    fn test_required_stops_field() {
        let mut v = Validator::new();
        v.check("nombre", "   ", &[Rule::Required, Rule::Min(2)]);
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("nombre"), Some("El campo nombre es requerido"));
    }

    #[test]
    fn test_optional_empty_field_skips_rules() {
        let mut v = Validator::new();
        v.check("imagen", "", &[Rule::Max(10)]);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_lengths_count_characters() {
        let mut v = Validator::new();
        v.check("nombre", "Ñandú", &[Rule::Min(5), Rule::Max(5)]);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_min_max_messages() {
        let mut v = Validator::new();
        v.check_labeled("mensaje", "mensaje", "corto", &[Rule::Min(10)]);
        v.check("nombre", &"x".repeat(101), &[Rule::Max(100)]);
        let errors = v.finish().unwrap_err();
        assert_eq!(
            errors.get("mensaje"),
            Some("El campo mensaje debe tener al menos 10 caracteres")
        );
        assert_eq!(
            errors.get("nombre"),
            Some("El campo nombre no puede tener más de 100 caracteres")
        );
    }

    #[test]
    fn test_email_rule() {
        assert!(is_valid_email("lector@elfaro.cl"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("lector@elfaro"));
        assert!(!is_valid_email("sin-arroba.cl"));
        assert!(!is_valid_email("dos@@elfaro.cl"));
    }

    #[test]
    fn test_one_of() {
        let mut v = Validator::new();
        v.check("plan", "gold", &[Rule::OneOf(&["free", "premium"])]);
        assert!(v.has_errors());
    }
}
