//! Input parsing for bulk ingestion.
//!
//! Every parser here is total: malformed input yields an empty outcome, never
//! an error. Outcomes carry the entries in first-occurrence order, already
//! deduplicated by canonical video id, plus a count of discarded inputs for
//! the submission preview.

pub mod canonical;
pub mod csv;
pub mod text;
pub mod webloc;

pub use canonical::{canonicalize, CanonicalizeError};
pub use csv::parse_csv;
pub use text::parse_text;
pub use webloc::parse_webloc;

use tmark_models::YoutubeId;

/// One accepted input: the canonical id plus the URL as the user supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub id: YoutubeId,
    pub url: String,
}

/// Result of parsing one input blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Deduplicated entries in first-occurrence order
    pub entries: Vec<ParsedEntry>,
    /// Inputs discarded because they did not canonicalize
    pub rejected: usize,
}

impl ParseOutcome {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold a candidate into the outcome: dedupe on id, count rejects.
    pub fn push_candidate(&mut self, raw: &str) {
        match canonicalize(raw) {
            Ok(id) => {
                if !self.entries.iter().any(|e| e.id == id) {
                    self.entries.push(ParsedEntry {
                        id,
                        url: raw.to_string(),
                    });
                }
            }
            Err(_) => self.rejected += 1,
        }
    }

    /// Merge another outcome in: later entries dedupe against earlier ones,
    /// reject counts add up.
    pub fn merge(&mut self, other: ParseOutcome) {
        for entry in other.entries {
            if !self.entries.iter().any(|e| e.id == entry.id) {
                self.entries.push(entry);
            }
        }
        self.rejected += other.rejected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_dedupes_across_sources() {
        let mut text = parse_text("https://youtu.be/aaaaaaaaaaa https://youtu.be/bbbbbbbbbbb");
        let csv = parse_csv("url\nhttps://youtu.be/aaaaaaaaaaa\nhttps://youtu.be/ccccccccccc\nhttps://vimeo.com/1\n");
        text.merge(csv);

        assert_eq!(text.entries.len(), 3);
        assert_eq!(text.rejected, 1);
    }
}
