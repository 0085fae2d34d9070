//! Canonical video id extraction.

use thiserror::Error;
use url::Url;

use tmark_models::YoutubeId;

/// Why an input failed to canonicalize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizeError {
    #[error("not a video URL")]
    NotAVideoUrl,
    #[error("only http(s) URLs are supported")]
    InvalidScheme,
    #[error("video id has invalid format")]
    InvalidId,
}

/// Extract the canonical 11-character video id from any supported URL form.
///
/// Supported forms: `youtube.com/watch?…v=ID…`, `youtu.be/ID`,
/// `youtube.com/embed/ID`, `youtube.com/v/ID`, `youtube.com/shorts/ID`, with
/// or without a scheme. Channel, playlist, and search URLs are rejected, as
/// are non-http(s) schemes and ids of the wrong length.
pub fn canonicalize(input: &str) -> Result<YoutubeId, CanonicalizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CanonicalizeError::NotAVideoUrl);
    }

    let url = parse_lenient(trimmed)?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CanonicalizeError::InvalidScheme);
    }

    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let raw_id = match host {
        "youtu.be" => first_segment(&url),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => extract_from_path(&url),
        _ => None,
    }
    .ok_or(CanonicalizeError::NotAVideoUrl)?;

    YoutubeId::new(raw_id).ok_or(CanonicalizeError::InvalidId)
}

/// Parse the input as a URL, assuming https for scheme-less inputs like
/// `youtube.com/watch?v=…`.
fn parse_lenient(input: &str) -> Result<Url, CanonicalizeError> {
    match Url::parse(input) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{input}")).map_err(|_| CanonicalizeError::NotAVideoUrl)
        }
        Err(_) => Err(CanonicalizeError::NotAVideoUrl),
    }
}

fn first_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn extract_from_path(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["watch", ..] => url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned()),
        ["embed", id, ..] | ["v", id, ..] | ["shorts", id, ..] => Some((*id).to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    fn ok(input: &str) -> String {
        canonicalize(input).unwrap().as_str().to_string()
    }

    #[test]
    fn all_supported_forms_yield_the_same_id() {
        for form in [
            format!("https://www.youtube.com/watch?v={ID}"),
            format!("https://youtube.com/watch?v={ID}&t=10s"),
            format!("https://www.youtube.com/watch?feature=share&v={ID}"),
            format!("https://youtu.be/{ID}"),
            format!("https://youtu.be/{ID}?t=42"),
            format!("https://www.youtube.com/embed/{ID}"),
            format!("https://www.youtube.com/v/{ID}"),
            format!("https://www.youtube.com/shorts/{ID}"),
            format!("http://m.youtube.com/watch?v={ID}"),
            format!("youtube.com/watch?v={ID}"),
        ] {
            assert_eq!(ok(&form), ID, "failed for {form}");
        }
    }

    #[test]
    fn canonical_idempotence() {
        // Re-canonicalizing any accepted form of an extracted id returns it.
        let id = canonicalize(&format!("https://youtu.be/{ID}")).unwrap();
        assert_eq!(ok(&id.watch_url()), ID);
    }

    #[test]
    fn rejects_non_video_urls() {
        for input in [
            "https://www.youtube.com/@SomeChannel",
            "https://www.youtube.com/playlist?list=PLx",
            "https://www.youtube.com/results?search_query=rust",
            "https://www.youtube.com/feed/subscriptions",
            "https://vimeo.com/123456",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "not a url at all   with spaces",
        ] {
            assert!(canonicalize(input).is_err(), "accepted {input}");
        }
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert_eq!(
            canonicalize(&format!("ftp://youtube.com/watch?v={ID}")),
            Err(CanonicalizeError::InvalidScheme)
        );
        assert_eq!(
            canonicalize("javascript:alert(1)"),
            Err(CanonicalizeError::InvalidScheme)
        );
    }

    #[test]
    fn rejects_wrong_length_ids() {
        assert_eq!(
            canonicalize("https://youtu.be/tooshort"),
            Err(CanonicalizeError::InvalidId)
        );
        assert_eq!(
            canonicalize("https://www.youtube.com/watch?v=waytoolongid123"),
            Err(CanonicalizeError::InvalidId)
        );
    }

    #[test]
    fn watch_url_without_v_param_is_rejected() {
        assert!(canonicalize("https://www.youtube.com/watch?t=10").is_err());
    }
}
