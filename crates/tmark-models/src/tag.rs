//! User tags: categories and labels.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum tag name length.
pub const TAG_NAME_MAX: usize = 100;

/// A per-user tag.
///
/// `is_video_type = true` makes this a category: a video carries at most one
/// category tag. Label tags (`is_video_type = false`) are unbounded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    /// Hex color, `#rrggbb`
    pub color: String,
    pub is_video_type: bool,
    /// Field schema applied to videos carrying this tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagValidationError {
    #[error("tag name must be 1-{TAG_NAME_MAX} characters")]
    InvalidName,
    #[error("tag color must be a hex color like #1a2b3c")]
    InvalidColor,
}

/// Validate a tag name (1-100 characters after trimming).
pub fn validate_tag_name(name: &str) -> Result<(), TagValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > TAG_NAME_MAX {
        return Err(TagValidationError::InvalidName);
    }
    Ok(())
}

/// Validate a `#rrggbb` hex color.
pub fn validate_hex_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_bounds() {
        assert!(validate_tag_name("Python").is_ok());
        assert!(validate_tag_name("").is_err());
        assert!(validate_tag_name("   ").is_err());
        assert!(validate_tag_name(&"x".repeat(100)).is_ok());
        assert!(validate_tag_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn hex_colors() {
        assert!(validate_hex_color("#1a2b3c"));
        assert!(validate_hex_color("#ABCDEF"));
        assert!(!validate_hex_color("1a2b3c"));
        assert!(!validate_hex_color("#1a2b3"));
        assert!(!validate_hex_color("#1a2b3g"));
    }
}
