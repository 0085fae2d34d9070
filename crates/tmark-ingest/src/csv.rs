//! CSV parser.

use ::csv::{ReaderBuilder, Trim};

use crate::ParseOutcome;

/// Parse a CSV export with a `url` column (case-insensitive header match).
///
/// Quoting follows RFC 4180: fields may be double-quoted with `""` escapes.
/// Malformed input yields an empty outcome.
pub fn parse_csv(input: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input.as_bytes());

    let url_column = match reader.headers() {
        Ok(headers) => headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("url")),
        Err(_) => None,
    };
    let Some(url_column) = url_column else {
        return outcome;
    };

    for record in reader.records() {
        let Ok(record) = record else {
            outcome.rejected += 1;
            continue;
        };
        match record.get(url_column) {
            Some(cell) if !cell.trim().is_empty() => outcome.push_candidate(cell.trim()),
            _ => outcome.rejected += 1,
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_url_column_case_insensitively() {
        let input = "Title,URL\nSome video,https://youtu.be/aaaaaaaaaaa\n";
        let outcome = parse_csv(input);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].id.as_str(), "aaaaaaaaaaa");
    }

    #[test]
    fn respects_quoted_fields_with_escapes() {
        let input = "title,url\n\"A, \"\"quoted\"\" title\",\"https://youtu.be/aaaaaaaaaaa\"\n";
        let outcome = parse_csv(input);
        assert_eq!(outcome.entries.len(), 1);
    }

    #[test]
    fn dedupes_rows_by_id() {
        let input = "url\nhttps://youtu.be/aaaaaaaaaaa\nhttps://www.youtube.com/watch?v=aaaaaaaaaaa\nhttps://youtu.be/bbbbbbbbbbb\n";
        let outcome = parse_csv(input);
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn counts_rejected_rows() {
        let input = "url\nhttps://vimeo.com/1\n\nhttps://youtu.be/aaaaaaaaaaa\n";
        let outcome = parse_csv(input);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.rejected, 1);
    }

    #[test]
    fn missing_url_column_yields_empty() {
        let outcome = parse_csv("title,link\nx,https://youtu.be/aaaaaaaaaaa\n");
        assert!(outcome.is_empty());
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn malformed_input_is_total() {
        assert!(parse_csv("").is_empty());
        assert!(parse_csv("\"unclosed").is_empty());
    }
}
