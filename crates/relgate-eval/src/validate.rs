//! Single-field validation rules.
//!
//! A rule is a comma separated list of validators, each optionally
//! parameterised: `required,length(3|10),matches(^ZZZ-)`. A `~message`
//! suffix on a validator is accepted and ignored. Empty values (null, `""`,
//! empty collections) fail `required` and pass every other validator.

use crate::value::{Value, cached_regex};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty validation rule")]
    EmptyRule,

    #[error("unknown validator `{name}`")]
    UnknownValidator { name: String },

    #[error("validator `{validator}` expects {expected} argument(s), got {found}")]
    Arguments {
        validator: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid argument `{argument}` for `{validator}`: {reason}")]
    BadArgument {
        validator: String,
        argument: String,
        reason: String,
    },

    #[error("validator `{validator}` cannot check a {type_name}")]
    UnsupportedValue {
        validator: String,
        type_name: &'static str,
    },
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email pattern")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:https?|ftp)://[^\s/?#.][^\s]*$").expect("url pattern")
});

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern")
});

static SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^v?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-(0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(\.(0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*)?(\+[0-9a-zA-Z-]+(\.[0-9a-zA-Z-]+)*)?$",
    )
    .expect("semver pattern")
});

static INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?\d+$").expect("int pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
struct Validator<'r> {
    name: &'r str,
    args: Vec<&'r str>,
}

/// Applies `rule` to the one-entry mapping `{field: value}`.
pub fn validate_field(field: &str, value: &Value, rule: &str) -> Result<bool, ValidationError> {
    let validators = parse_rule(rule)?;

    for validator in &validators {
        let ok = check(validator, value)?;
        tracing::trace!(field, validator = validator.name, ok, "validator applied");
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn parse_rule(rule: &str) -> Result<Vec<Validator<'_>>, ValidationError> {
    let validators: Vec<Validator<'_>> = split_top_level(rule)
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_validator)
        .collect::<Result<_, _>>()?;

    if validators.is_empty() {
        return Err(ValidationError::EmptyRule);
    }
    Ok(validators)
}

/// Splits on commas that are not inside parentheses.
fn split_top_level(rule: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, ch) in rule.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&rule[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&rule[start..]);
    parts
}

fn parse_validator(text: &str) -> Result<Validator<'_>, ValidationError> {
    let text = strip_message(text).trim();

    let Some(open) = text.find('(') else {
        return Ok(Validator {
            name: text,
            args: Vec::new(),
        });
    };

    let name = text[..open].trim();
    let inner = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| ValidationError::BadArgument {
            validator: name.to_string(),
            argument: text[open..].to_string(),
            reason: "missing closing parenthesis".to_string(),
        })?;

    let args = if name == "matches" {
        vec![inner]
    } else {
        inner.split('|').map(str::trim).collect()
    };

    Ok(Validator { name, args })
}

/// Drops a `~message` suffix outside parentheses.
fn strip_message(text: &str) -> &str {
    let mut depth = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '~' if depth == 0 => return &text[..i],
            _ => {}
        }
    }
    text
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn arity(v: &Validator<'_>, expected: usize) -> Result<(), ValidationError> {
    if v.args.len() != expected {
        return Err(ValidationError::Arguments {
            validator: v.name.to_string(),
            expected,
            found: v.args.len(),
        });
    }
    Ok(())
}

fn number_arg(v: &Validator<'_>, arg: &str) -> Result<f64, ValidationError> {
    arg.parse().map_err(|_| ValidationError::BadArgument {
        validator: v.name.to_string(),
        argument: arg.to_string(),
        reason: "not a number".to_string(),
    })
}

fn text_of(v: &Validator<'_>, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(value.display()),
        other => Err(ValidationError::UnsupportedValue {
            validator: v.name.to_string(),
            type_name: other.type_name(),
        }),
    }
}

fn check(v: &Validator<'_>, value: &Value) -> Result<bool, ValidationError> {
    match v.name {
        "required" => {
            arity(v, 0)?;
            return Ok(!is_empty(value));
        }
        "optional" => {
            arity(v, 0)?;
            return Ok(true);
        }
        "email" | "url" | "alpha" | "alphanum" | "numeric" | "int" | "float" | "ascii"
        | "lowercase" | "uppercase" | "hexadecimal" | "uuid" | "semver" => arity(v, 0)?,
        "length" | "range" => arity(v, 2)?,
        "matches" => arity(v, 1)?,
        "in" => {}
        other => {
            return Err(ValidationError::UnknownValidator {
                name: other.to_string(),
            });
        }
    }

    if is_empty(value) {
        return Ok(true);
    }

    if v.name == "length" {
        let min = number_arg(v, v.args[0])?;
        let max = number_arg(v, v.args[1])?;
        let len = match value {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            other => text_of(v, other)?.chars().count(),
        };
        let len = len as f64;
        return Ok(min <= len && len <= max);
    }

    let text = text_of(v, value)?;
    let ok = match v.name {
        "email" => EMAIL.is_match(&text),
        "url" => URL.is_match(&text),
        "alpha" => text.chars().all(|c| c.is_ascii_alphabetic()),
        "alphanum" => text.chars().all(|c| c.is_ascii_alphanumeric()),
        "numeric" => text.chars().all(|c| c.is_ascii_digit()),
        "int" => INT.is_match(&text),
        "float" => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
        "ascii" => text.is_ascii(),
        "lowercase" => text == text.to_lowercase(),
        "uppercase" => text == text.to_uppercase(),
        "hexadecimal" => text.chars().all(|c| c.is_ascii_hexdigit()),
        "uuid" => UUID.is_match(&text),
        "semver" => SEMVER.is_match(&text),
        "range" => {
            let min = number_arg(v, v.args[0])?;
            let max = number_arg(v, v.args[1])?;
            text.trim()
                .parse::<f64>()
                .is_ok_and(|n| min <= n && n <= max)
        }
        "matches" => {
            let regex = cached_regex(v.args[0]).map_err(|e| ValidationError::BadArgument {
                validator: v.name.to_string(),
                argument: v.args[0].to_string(),
                reason: format!("{:#}", e),
            })?;
            regex.is_match(&text)
        }
        _ => v.args.iter().any(|candidate| *candidate == text),
    };
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(value: Value, rule: &str) -> bool {
        validate_field("field", &value, rule).unwrap()
    }

    #[test]
    fn required_and_empty_values() {
        assert!(!valid(Value::Null, "required"));
        assert!(!valid(Value::from(""), "required,email"));
        assert!(valid(Value::Null, "email"));
        assert!(valid(Value::from(""), "semver,length(2|4)"));
        assert!(valid(Value::from("x"), "required"));
    }

    #[test]
    fn format_validators() {
        assert!(valid(Value::from("dev@example.com"), "email"));
        assert!(!valid(Value::from("dev@"), "email"));
        assert!(valid(Value::from("https://git.example.com/core.git"), "url"));
        assert!(valid(Value::from("1.4.0-rc.1"), "semver"));
        assert!(!valid(Value::from("1.4"), "semver"));
        assert!(valid(Value::from("123e4567-e89b-12d3-a456-426614174000"), "uuid"));
        assert!(valid(Value::from("dead01"), "hexadecimal"));
        assert!(valid(Value::from("ZZZ"), "alpha,uppercase"));
        assert!(!valid(Value::from("ZZZ-1"), "alphanum"));
    }

    #[test]
    fn numbers_are_checked_by_their_text() {
        assert!(valid(Value::Number(42.0), "int,numeric,range(0|100)"));
        assert!(!valid(Value::Number(142.0), "range(0|100)"));
        assert!(valid(Value::from("3.5"), "float"));
    }

    #[test]
    fn parameterised_validators() {
        assert!(valid(Value::from("ZZZ-12 fix"), "matches(^ZZZ-[0-9]+)"));
        assert!(valid(Value::from("beta"), "in(alpha|beta)"));
        assert!(!valid(Value::from("gamma"), "in(alpha|beta)"));
        assert!(valid(Value::from(vec!["a", "b"]), "length(1|2)"));
        assert!(!valid(Value::from("abcdef"), "length(1|5)"));
    }

    #[test]
    fn matches_keeps_commas_and_pipes() {
        assert!(valid(Value::from("a,b"), "matches(^(a|b),(a|b)$)"));
    }

    #[test]
    fn messages_are_ignored() {
        assert!(!valid(Value::Null, "required~release name is required"));
    }

    #[test]
    fn malformed_rules() {
        assert_eq!(validate_field("f", &Value::Null, " ").unwrap_err(), ValidationError::EmptyRule);
        assert!(matches!(
            validate_field("f", &Value::from("x"), "shiny").unwrap_err(),
            ValidationError::UnknownValidator { ref name } if name == "shiny"
        ));
        assert!(matches!(
            validate_field("f", &Value::from("x"), "length(3)").unwrap_err(),
            ValidationError::Arguments { expected: 2, found: 1, .. }
        ));
        assert!(matches!(
            validate_field("f", &Value::from("x"), "range(a|b)").unwrap_err(),
            ValidationError::BadArgument { .. }
        ));
        assert!(matches!(
            validate_field("f", &Value::from(vec!["x"]), "email").unwrap_err(),
            ValidationError::UnsupportedValue { type_name: "list", .. }
        ));
    }
}
