//! Plausibility checks for decoded stream URLs

use crate::core::stream::StreamType;
use url::Url;

/// Heuristic filter separating real stream URLs from wrong-key garbage
#[derive(Debug, Clone)]
pub struct ResultValidator {
    /// Minimum URL length in bytes
    pub min_length: usize,
    /// Minimum share of printable ASCII characters
    pub min_printable_ratio: f64,
    /// Extensions or path segments that mark a stream URL
    pub markers: Vec<String>,
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self {
            min_length: 16,
            min_printable_ratio: 0.95,
            markers: vec![
                ".m3u8".to_string(),
                ".mp4".to_string(),
                "/stream/".to_string(),
                "/hls/".to_string(),
                "/playlist/".to_string(),
            ],
        }
    }
}

impl ResultValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_plausible_stream_url(&self, candidate: &str) -> bool {
        if candidate.len() < self.min_length {
            return false;
        }

        let lower = candidate.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return false;
        }

        let printable = candidate
            .chars()
            .filter(|c| c.is_ascii_graphic())
            .count();
        let ratio = printable as f64 / candidate.chars().count() as f64;
        if ratio < self.min_printable_ratio {
            return false;
        }

        if candidate.chars().any(char::is_whitespace) {
            return false;
        }

        if !self.markers.iter().any(|marker| lower.contains(marker.as_str())) {
            return false;
        }

        Url::parse(candidate)
            .map(|url| url.host_str().is_some())
            .unwrap_or(false)
    }

    /// Pick the first plausible URL out of a decoded payload.
    ///
    /// Providers sometimes pack several mirrors as `url1 or url2`.
    pub fn select(&self, decoded: &str) -> Option<String> {
        let trimmed = decoded.trim();
        if self.is_plausible_stream_url(trimmed) {
            return Some(trimmed.to_string());
        }
        trimmed
            .split(" or ")
            .map(str::trim)
            .find(|candidate| self.is_plausible_stream_url(candidate))
            .map(str::to_string)
    }
}

/// [`ResultValidator::is_plausible_stream_url`] with default thresholds
pub fn is_plausible_stream_url(candidate: &str) -> bool {
    ResultValidator::default().is_plausible_stream_url(candidate)
}

/// Guess the stream container from the URL path
pub fn infer_stream_type(url: &str) -> StreamType {
    let path = Url::parse(url)
        .map(|parsed| parsed.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());

    if path.ends_with(".m3u8") || path.contains("/hls/") || path.contains("/playlist/") {
        StreamType::Hls
    } else if path.ends_with(".mp4") {
        StreamType::Mp4
    } else if path.contains(".m3u8") {
        StreamType::Hls
    } else {
        StreamType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_stream_urls() {
        assert!(is_plausible_stream_url("https://cdn.example.com/x/list.m3u8"));
        assert!(is_plausible_stream_url("http://cdn.example.com/movie/720.mp4?token=abc"));
        assert!(is_plausible_stream_url("https://edge.example.net/stream/abcdef"));
    }

    #[test]
    fn test_rejects_non_urls() {
        assert!(!is_plausible_stream_url("not a url"));
        assert!(!is_plausible_stream_url(""));
        assert!(!is_plausible_stream_url("http://a.m3u8"));
        assert!(!is_plausible_stream_url("ftp://cdn.example.com/x/list.m3u8"));
        assert!(!is_plausible_stream_url("https://cdn.example.com/index.html"));
        assert!(!is_plausible_stream_url("https://cdn.example.com/x list.m3u8"));
    }

    #[test]
    fn test_rejects_garbage_from_wrong_key() {
        let garbage = "https://\u{1}\u{2}\u{3}\u{4}\u{5}\u{6}.m3u8";
        assert!(!is_plausible_stream_url(garbage));
        assert!(!is_plausible_stream_url("https://cdn.\u{7f}xample.com/\u{fffd}\u{fffd}.m3u8"));
    }

    #[test]
    fn test_select_picks_first_plausible_mirror() {
        let validator = ResultValidator::default();
        let decoded = "https://tmstr.example/pl/H4sI or https://mirror.example/hls/a/list.m3u8 or https://m2.example/b.m3u8";
        assert_eq!(
            validator.select(decoded).as_deref(),
            Some("https://mirror.example/hls/a/list.m3u8")
        );
        assert_eq!(
            validator.select("  https://cdn.example.com/x/list.m3u8\n").as_deref(),
            Some("https://cdn.example.com/x/list.m3u8")
        );
        assert_eq!(validator.select("garbage or more garbage"), None);
    }

    #[test]
    fn test_custom_thresholds() {
        let validator = ResultValidator {
            min_length: 64,
            ..ResultValidator::default()
        };
        assert!(!validator.is_plausible_stream_url("https://cdn.example.com/x/list.m3u8"));
    }

    #[test]
    fn test_infer_stream_type() {
        assert_eq!(infer_stream_type("https://cdn.example.com/x/list.m3u8"), StreamType::Hls);
        assert_eq!(infer_stream_type("https://cdn.example.com/x/master.m3u8?t=1"), StreamType::Hls);
        assert_eq!(infer_stream_type("https://cdn.example.com/v/720.mp4"), StreamType::Mp4);
        assert_eq!(infer_stream_type("https://cdn.example.com/stream/abc"), StreamType::Unknown);
    }
}
