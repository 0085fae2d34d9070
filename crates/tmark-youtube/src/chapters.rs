//! Chapter extraction from video descriptions (chapters stage).
//!
//! The platform turns a description's timestamp list into chapter markers
//! when it follows the strict rules (first entry at 0:00, at least three
//! entries, strictly ascending). We apply the same rules first and record
//! those chapters as platform-sourced; otherwise a lenient pass over any
//! timestamp lines produces description-sourced chapters; otherwise the
//! result is empty. Never fatal.

use regex::Regex;
use std::sync::OnceLock;

use tmark_models::{Chapter, ChapterSource};

/// Minimum entries for the strict (platform-rule) interpretation.
const PLATFORM_MIN_CHAPTERS: usize = 3;
/// Minimum entries for the lenient fallback.
const DESCRIPTION_MIN_CHAPTERS: usize = 2;

fn timestamp_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // `[12:34]`, `(1:02:03)`, or bare `0:00`, followed by a title;
        // also accepts `Title - 0:00` with the timestamp trailing.
        Regex::new(
            r"(?x)
            ^\s*
            (?:
                [\[\(]?(?P<ts>(?:\d{1,2}:)?\d{1,2}:\d{2})[\]\)]?
                [\s\-–—:.]*
                (?P<title>.+?)
              |
                (?P<title2>.+?)
                [\s\-–—:.]*
                [\[\(]?(?P<ts2>(?:\d{1,2}:)?\d{1,2}:\d{2})[\]\)]?
            )
            \s*$",
        )
        .expect("chapter regex compiles")
    })
}

fn parse_timestamp(ts: &str) -> Option<f64> {
    let parts: Vec<&str> = ts.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [m, s] => (0i64, m.parse::<i64>().ok()?, s.parse::<i64>().ok()?),
        [h, m, s] => (
            h.parse::<i64>().ok()?,
            m.parse::<i64>().ok()?,
            s.parse::<i64>().ok()?,
        ),
        _ => return None,
    };
    if s >= 60 || m >= 60 {
        return None;
    }
    Some((h * 3600 + m * 60 + s) as f64)
}

/// Extract chapters from a description.
///
/// Returns the chapters and their source, or `None` when the description
/// does not contain a usable chapter list.
pub fn extract_chapters(
    description: &str,
    duration_secs: Option<i32>,
) -> Option<(Vec<Chapter>, ChapterSource)> {
    let mut entries: Vec<(f64, String)> = Vec::new();

    for line in description.lines() {
        let Some(caps) = timestamp_line().captures(line) else {
            continue;
        };
        let ts = caps
            .name("ts")
            .or_else(|| caps.name("ts2"))
            .and_then(|m| parse_timestamp(m.as_str()));
        let title = caps
            .name("title")
            .or_else(|| caps.name("title2"))
            .map(|m| m.as_str().trim().to_string());
        if let (Some(start), Some(title)) = (ts, title) {
            if !title.is_empty() {
                entries.push((start, title));
            }
        }
    }

    if entries.len() < DESCRIPTION_MIN_CHAPTERS {
        return None;
    }

    let strictly_ascending = entries.windows(2).all(|w| w[0].0 < w[1].0);
    let source = if entries.len() >= PLATFORM_MIN_CHAPTERS
        && entries.first().map(|(s, _)| *s == 0.0).unwrap_or(false)
        && strictly_ascending
    {
        ChapterSource::Platform
    } else {
        ChapterSource::Description
    };

    // The lenient pass still needs a coherent order to compute ends.
    if !strictly_ascending {
        entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        entries.dedup_by(|a, b| a.0 == b.0);
        if entries.len() < DESCRIPTION_MIN_CHAPTERS {
            return None;
        }
    }

    let mut chapters = Vec::with_capacity(entries.len());
    for (i, (start, title)) in entries.iter().enumerate() {
        let end = entries
            .get(i + 1)
            .map(|(next, _)| *next)
            .or(duration_secs.map(f64::from));
        chapters.push(Chapter {
            title: title.clone(),
            start_secs: *start,
            end_secs: end,
        });
    }

    Some((chapters, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_list_is_platform_sourced() {
        let description = "Great video!\n0:00 Intro\n1:30 Setup\n12:45 Results\nThanks for watching";
        let (chapters, source) = extract_chapters(description, Some(900)).unwrap();
        assert_eq!(source, ChapterSource::Platform);
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Intro");
        assert_eq!(chapters[0].start_secs, 0.0);
        assert_eq!(chapters[0].end_secs, Some(90.0));
        assert_eq!(chapters[2].end_secs, Some(900.0));
    }

    #[test]
    fn list_not_starting_at_zero_is_description_sourced() {
        let description = "1:30 Setup\n12:45 Results";
        let (chapters, source) = extract_chapters(description, None).unwrap();
        assert_eq!(source, ChapterSource::Description);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].end_secs, None);
    }

    #[test]
    fn hour_long_timestamps() {
        let description = "0:00 One\n59:59 Two\n1:00:00 Three";
        let (chapters, source) = extract_chapters(description, None).unwrap();
        assert_eq!(source, ChapterSource::Platform);
        assert_eq!(chapters[2].start_secs, 3600.0);
    }

    #[test]
    fn trailing_timestamp_format() {
        let description = "Intro - 0:00\nMain part - 2:00";
        let (chapters, _) = extract_chapters(description, None).unwrap();
        assert_eq!(chapters[0].title, "Intro");
        assert_eq!(chapters[1].start_secs, 120.0);
    }

    #[test]
    fn no_timestamps_yields_none() {
        assert!(extract_chapters("Just a plain description", None).is_none());
        assert!(extract_chapters("", Some(100)).is_none());
    }

    #[test]
    fn single_timestamp_is_not_a_chapter_list() {
        assert!(extract_chapters("0:00 Everything", Some(100)).is_none());
    }

    #[test]
    fn out_of_order_entries_are_sorted_for_fallback() {
        let description = "5:00 Later\n0:30 Earlier\n2:00 Middle";
        let (chapters, source) = extract_chapters(description, None).unwrap();
        assert_eq!(source, ChapterSource::Description);
        assert_eq!(chapters[0].start_secs, 30.0);
        assert_eq!(chapters[1].start_secs, 120.0);
        assert_eq!(chapters[2].start_secs, 300.0);
    }

    #[test]
    fn invalid_minutes_rejected() {
        assert!(parse_timestamp("0:99").is_none());
        assert!(parse_timestamp("99:00").is_none());
        assert_eq!(parse_timestamp("1:05:00"), Some(3900.0));
    }
}
