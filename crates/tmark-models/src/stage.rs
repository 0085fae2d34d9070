//! Enrichment pipeline stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the per-video enrichment pipeline.
///
/// Non-error stages are totally ordered: `Created < Metadata < Captions <
/// Chapters < Complete`. `Error` is terminal and outside that order; the
/// derived `Ord` places it last only so the type can be used in ordered
/// collections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Created,
    Metadata,
    Captions,
    Chapters,
    Complete,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::Metadata => "metadata",
            Stage::Captions => "captions",
            Stage::Chapters => "chapters",
            Stage::Complete => "complete",
            Stage::Error => "error",
        }
    }

    /// Terminal stages end the current run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Error)
    }

    /// Progress percentage reported when this stage begins.
    pub fn base_progress(&self) -> u8 {
        match self {
            Stage::Created => 0,
            Stage::Metadata => 10,
            Stage::Captions => 40,
            Stage::Chapters => 75,
            Stage::Complete => 100,
            Stage::Error => 100,
        }
    }

    /// The stage the pipeline moves to after this one succeeds.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Created => Some(Stage::Metadata),
            Stage::Metadata => Some(Stage::Captions),
            Stage::Captions => Some(Stage::Chapters),
            Stage::Chapters => Some(Stage::Complete),
            Stage::Complete | Stage::Error => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Stage::Created),
            "metadata" => Ok(Stage::Metadata),
            "captions" => Ok(Stage::Captions),
            "chapters" => Ok(Stage::Chapters),
            "complete" => Ok(Stage::Complete),
            "error" => Ok(Stage::Error),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_total_for_non_error() {
        assert!(Stage::Created < Stage::Metadata);
        assert!(Stage::Metadata < Stage::Captions);
        assert!(Stage::Captions < Stage::Chapters);
        assert!(Stage::Chapters < Stage::Complete);
    }

    #[test]
    fn stage_progression() {
        let mut stage = Stage::Created;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Created,
                Stage::Metadata,
                Stage::Captions,
                Stage::Chapters,
                Stage::Complete
            ]
        );
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::Complete.is_terminal());
        assert!(Stage::Error.is_terminal());
        assert!(!Stage::Captions.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Metadata).unwrap(), "\"metadata\"");
    }
}
