//! User input validation

use thiserror::Error;

/// Longest message the backend accepts, in characters
pub const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message is empty")]
    Empty,
    #[error("Message too long ({chars} characters, max {max})")]
    TooLong { chars: usize, max: usize },
}

/// Trim the input and check it fits in one message.
pub fn normalize(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let chars = trimmed.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong {
            chars,
            max: MAX_MESSAGE_CHARS,
        });
    }

    Ok(trimmed.to_string())
}

/// First `max` characters of `text`, never splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
