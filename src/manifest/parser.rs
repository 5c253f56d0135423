//! Line-oriented manifest parser
//!
//! ```text
//! # comment
//! collect config=collect-stable-${MOJO_SERIES}
//! deploy config=keystone.yaml delay=0 wait=True target=${MOJO_SERIES}-kilo
//! script config=simple_os_checks.py MACHINES='trusty:m1.small:1 trusty:m1.small:1' timeout=${TIMEOUT:-5400}
//! verify config=check_juju.py
//! ```

use std::collections::HashMap;

use super::step::{Manifest, Step, StepArgs, StepKind};
use super::variables::{self, VariableError};

/// Errors produced while parsing a manifest; nothing has run when one is returned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unknown step kind '{kind}'")]
    UnknownStepKind { line: usize, kind: String },

    #[error("line {line}: malformed argument '{token}' (expected key=value)")]
    MalformedArgument { line: usize, token: String },

    #[error("line {line}: {kind} step is missing config=")]
    MissingConfig { line: usize, kind: StepKind },

    #[error("line {line}: duplicate key '{key}'")]
    DuplicateKey { line: usize, key: String },

    #[error("line {line}: unterminated quote")]
    UnterminatedQuote { line: usize },

    #[error("line {line}: {source}")]
    Variable {
        line: usize,
        #[source]
        source: VariableError,
    },

    #[error("manifest '{0}' contains no steps")]
    EmptyManifest(String),
}

/// Parse a manifest from text, expanding variables against `env`
pub fn parse(
    name: &str,
    source: &str,
    env: &HashMap<String, String>,
) -> Result<Manifest, ParseError> {
    let mut steps = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        steps.push(parse_line(trimmed, line, env)?);
    }

    if steps.is_empty() {
        return Err(ParseError::EmptyManifest(name.to_string()));
    }

    Ok(Manifest {
        name: name.to_string(),
        steps,
    })
}

/// Parse one non-comment line into a step
pub fn parse_line(
    text: &str,
    line: usize,
    env: &HashMap<String, String>,
) -> Result<Step, ParseError> {
    let tokens = tokenize(text).ok_or(ParseError::UnterminatedQuote { line })?;
    let mut tokens = tokens.into_iter();

    let kind_token = tokens.next().unwrap_or_default();
    let kind: StepKind = kind_token
        .parse()
        .map_err(|kind| ParseError::UnknownStepKind { line, kind })?;

    let mut config = None;
    let mut args = StepArgs::new();

    for token in tokens {
        let (key, raw_value) = match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => (key, value),
            _ => return Err(ParseError::MalformedArgument { line, token }),
        };

        let value = variables::resolve(raw_value, env)
            .map_err(|source| ParseError::Variable { line, source })?;

        if key == "config" {
            if config.replace(value).is_some() {
                return Err(ParseError::DuplicateKey {
                    line,
                    key: key.to_string(),
                });
            }
        } else if args.insert(key.to_string(), value).is_some() {
            return Err(ParseError::DuplicateKey {
                line,
                key: key.to_string(),
            });
        }
    }

    let config = config.ok_or(ParseError::MissingConfig { line, kind })?;

    Ok(Step {
        kind,
        config,
        args,
        line,
    })
}

/// Split on unquoted whitespace, removing single and double quotes.
///
/// Returns `None` when a quote is left open.
fn tokenize(text: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_token {
        tokens.push(current);
    }
    Some(tokens)
}
