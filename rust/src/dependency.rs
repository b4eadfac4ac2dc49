//! Parsing of comma-separated dependency lists such as `"T001, T002"`.

use thiserror::Error;

/// Errors produced while parsing a dependency list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyParseError {
    /// A comma with nothing between it and its neighbour (leading, trailing or doubled).
    #[error("empty dependency reference in {text:?}")]
    EmptyToken { text: String },
    /// A reference containing characters outside `[A-Za-z0-9_-]`.
    #[error("invalid dependency reference {token:?} in {text:?}")]
    InvalidToken { token: String, text: String },
}

fn is_valid_task_id(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Parse a dependency list into task ID references.
///
/// `None`, empty and whitespace-only text mean "no dependencies". Tokens keep
/// their input order and duplicates are returned as-is.
pub fn parse_dependencies(text: Option<&str>) -> Result<Vec<String>, DependencyParseError> {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Ok(Vec::new()),
    };

    text.split(',')
        .map(str::trim)
        .map(|token| {
            if token.is_empty() {
                Err(DependencyParseError::EmptyToken {
                    text: text.to_string(),
                })
            } else if !is_valid_task_id(token) {
                Err(DependencyParseError::InvalidToken {
                    token: token.to_string(),
                    text: text.to_string(),
                })
            } else {
                Ok(token.to_string())
            }
        })
        .collect()
}
