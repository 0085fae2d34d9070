//! `.webloc` parser.
//!
//! A `.webloc` file is an Apple plist XML document; the link lives in the
//! string following the first `<key>URL</key>` element.

use roxmltree::Document;

use crate::ParseOutcome;

/// Parse a `.webloc` document, yielding at most one entry.
pub fn parse_webloc(input: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    let Ok(document) = Document::parse(input) else {
        return outcome;
    };

    let url_key = document
        .descendants()
        .find(|node| node.has_tag_name("key") && node.text().map(str::trim) == Some("URL"));
    let Some(url_key) = url_key else {
        return outcome;
    };

    // next_siblings() starts at the node itself.
    let value = url_key
        .next_siblings()
        .skip(1)
        .find(|node| node.is_element())
        .filter(|node| node.has_tag_name("string"))
        .and_then(|node| node.text());

    if let Some(url) = value {
        outcome.push_candidate(url.trim());
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webloc(url: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>URL</key>
    <string>{url}</string>
</dict>
</plist>"#
        )
    }

    #[test]
    fn extracts_the_url_string() {
        let outcome = parse_webloc(&webloc("https://youtu.be/dQw4w9WgXcQ"));
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].id.as_str(), "dQw4w9WgXcQ");
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn non_video_url_is_rejected() {
        let outcome = parse_webloc(&webloc("https://example.com/page"));
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.rejected, 1);
    }

    #[test]
    fn malformed_xml_yields_nothing() {
        assert!(parse_webloc("not xml at all").is_empty());
        assert!(parse_webloc("<plist><dict></plist>").is_empty());
    }

    #[test]
    fn missing_url_key_yields_nothing() {
        let input = r#"<plist version="1.0"><dict><key>Name</key><string>x</string></dict></plist>"#;
        let outcome = parse_webloc(input);
        assert!(outcome.is_empty());
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn uses_first_url_key_only() {
        let input = r#"<plist><dict>
            <key>URL</key><string>https://youtu.be/aaaaaaaaaaa</string>
            <key>URL</key><string>https://youtu.be/bbbbbbbbbbb</string>
        </dict></plist>"#;
        let outcome = parse_webloc(input);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].id.as_str(), "aaaaaaaaaaa");
    }
}
