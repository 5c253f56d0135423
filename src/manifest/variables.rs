//! Shell-style variable expansion for manifest values
//!
//! Supports:
//! - `${NAME}` - value of `NAME`, an error when `NAME` is not defined
//! - `${NAME:-default}` - value of `NAME`, or `default` when unset or empty
//! - `$$` - a literal `$`
//!
//! Expansion is a single pass: substituted text is never rescanned.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap()
});

/// Errors that can occur during variable expansion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    #[error("Unresolved variable: ${{{0}}} is not set and has no default")]
    Unresolved(String),

    #[error("Unterminated placeholder in: {0}")]
    Unterminated(String),

    #[error("Invalid variable name: {0}")]
    InvalidName(String),
}

/// Expand every placeholder in `input` against `env`
pub fn resolve(input: &str, env: &HashMap<String, String>) -> Result<String, VariableError> {
    let mut result = String::with_capacity(input.len());
    let mut last = 0;

    for caps in PLACEHOLDER_REGEX.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        check_literal(input, last..whole.start())?;
        result.push_str(&input[last..whole.start()]);
        result.push_str(&expand(&caps, env)?);
        last = whole.end();
    }

    check_literal(input, last..input.len())?;
    result.push_str(&input[last..]);
    Ok(result)
}

/// Escape `$` so that `resolve` gives `value` back unchanged
pub fn escape(value: &str) -> String {
    value.replace('$', "$$")
}

fn expand(caps: &Captures<'_>, env: &HashMap<String, String>) -> Result<String, VariableError> {
    let Some(name) = caps.get(1).map(|m| m.as_str()) else {
        return Ok("$".to_string());
    };
    let default = caps.get(2).map(|m| m.as_str());

    match (env.get(name), default) {
        (Some(value), Some(default)) if value.is_empty() => Ok(default.to_string()),
        (Some(value), _) => Ok(value.clone()),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(VariableError::Unresolved(name.to_string())),
    }
}

/// Text between placeholders must not open one that the pattern rejected
fn check_literal(input: &str, range: Range<usize>) -> Result<(), VariableError> {
    let Some(start) = input[range.clone()].find("${") else {
        return Ok(());
    };
    let body = &input[range.start + start + 2..];
    match body.find('}') {
        Some(end) => {
            let name = body[..end].split(":-").next().unwrap_or_default();
            Err(VariableError::InvalidName(name.to_string()))
        }
        None => Err(VariableError::Unterminated(input.to_string())),
    }
}
