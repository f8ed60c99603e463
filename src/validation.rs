//! World-name validation for security and filesystem compatibility.
//!
//! World names arrive from the command line and end up in registry lookups, log
//! lines, and (via the registry's `map_file` field) file paths. Validation keeps
//! them short, printable, and free of path separators before any of that happens.

use thiserror::Error;

/// Maximum accepted world-name length in characters.
pub const MAX_WORLD_NAME_LEN: usize = 32;

/// World-name validation errors with helpful messages
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldNameError {
    #[error("World name is empty")]
    Empty,

    #[error("World name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("World name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("World name contains path separators (/ or \\)")]
    PathTraversal,
}

/// Validate a user-supplied world name.
///
/// Accepted characters are ASCII letters, digits, underscore, and hyphen, the
/// same set the host server allows for world identifiers. Path separators and
/// dots are rejected outright so a name can never escape the maps directory.
pub fn validate_world_name(name: &str) -> Result<(), WorldNameError> {
    if name.is_empty() {
        return Err(WorldNameError::Empty);
    }
    if name.chars().count() > MAX_WORLD_NAME_LEN {
        return Err(WorldNameError::TooLong {
            max: MAX_WORLD_NAME_LEN,
        });
    }
    if name.contains('/') || name.contains('\\') {
        return Err(WorldNameError::PathTraversal);
    }
    let bad: String = name
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        .collect();
    if !bad.is_empty() {
        return Err(WorldNameError::InvalidCharacters { chars: bad });
    }
    Ok(())
}
