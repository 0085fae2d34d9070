//! Pasted-text parser.

use crate::ParseOutcome;

/// Parse a pasted blob of URLs.
///
/// Entries are split on newlines, commas, semicolons, and runs of
/// whitespace, trimmed, and kept only when canonicalization succeeds.
pub fn parse_text(input: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for token in input.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        outcome.push_candidate(token);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_all_separators() {
        let input = "https://youtu.be/aaaaaaaaaaa, https://youtu.be/bbbbbbbbbbb;https://youtu.be/ccccccccccc\nhttps://youtu.be/ddddddddddd   https://youtu.be/eeeeeeeeeee";
        let outcome = parse_text(input);
        assert_eq!(outcome.entries.len(), 5);
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn dedupes_by_canonical_id_keeping_first_occurrence() {
        let input = "https://youtu.be/dQw4w9WgXcQ, https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10s\nhttps://vimeo.com/1";
        let outcome = parse_text(input);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].url, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(outcome.rejected, 1);
    }

    #[test]
    fn empty_and_garbage_inputs_are_total() {
        assert!(parse_text("").is_empty());
        assert!(parse_text("   \n\n  ,,, ;;;").is_empty());
        let outcome = parse_text("hello world");
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.rejected, 2);
    }

    #[test]
    fn preserves_input_order() {
        let input = "https://youtu.be/bbbbbbbbbbb\nhttps://youtu.be/aaaaaaaaaaa";
        let outcome = parse_text(input);
        let ids: Vec<&str> = outcome.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["bbbbbbbbbbb", "aaaaaaaaaaa"]);
    }
}
