use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use url::Url;

/// What kind of input the user handed us. The string form is the type tag
/// persisted next to the resolved URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Youtube,
    Rutube,
    Direct,
    M3u8,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Youtube => "youtube",
            SourceKind::Rutube => "rutube",
            SourceKind::Direct => "direct",
            SourceKind::M3u8 => "m3u8",
        }
    }

    /// Page URLs can be scraped again for a fresh stream; direct links cannot.
    pub fn is_refreshable(&self) -> bool {
        matches!(self, SourceKind::Youtube | SourceKind::Rutube)
    }

    /// Whether the input has to go through an extractor before it is playable.
    pub fn needs_extraction(&self) -> bool {
        self.is_refreshable()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(SourceKind::Youtube),
            "rutube" => Ok(SourceKind::Rutube),
            "direct" => Ok(SourceKind::Direct),
            "m3u8" | "hls" => Ok(SourceKind::M3u8),
            other => anyhow::bail!("Unknown source type: {}", other),
        }
    }
}

fn videoplayback_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^.*videoplayback\?.*$").expect("static regex"))
}

fn youtube_id_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|m\.youtube\.com/watch\?v=)([a-zA-Z0-9_-]{11})",
            r"youtube\.com/(?:shorts|live)/([a-zA-Z0-9_-]{11})",
            r"v=([a-zA-Z0-9_-]{11})",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

fn rutube_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)rutube\.ru/video/([a-f0-9]+)").expect("static regex"))
}

pub fn is_youtube_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.contains("youtube.com") || lower.contains("youtu.be")
}

pub fn is_rutube_url(input: &str) -> bool {
    input.to_ascii_lowercase().contains("rutube.ru")
}

pub fn is_direct_video_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    input.contains("googlevideo.com")
        || lower.contains(".mp4")
        || lower.contains(".webm")
        || lower.contains(".mkv")
        || videoplayback_re().is_match(input)
}

/// Users often paste `youtu.be/...` or `cdn.example.com/live.m3u8` without a
/// scheme. Such input is read as https.
pub fn with_scheme(input: &str) -> Cow<'_, str> {
    let input = input.trim();
    if input.contains("://") {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("https://{}", input))
    }
}

/// Parse an http(s) URL with a dotted host, accepting schemeless input.
pub fn parse_web_url(input: &str) -> Option<Url> {
    if input.trim().is_empty() || input.trim().chars().any(char::is_whitespace) {
        return None;
    }
    let url = Url::parse(&with_scheme(input)).ok()?;
    let host_ok = url.host_str().is_some_and(|h| h.contains('.') || h == "localhost");
    (matches!(url.scheme(), "http" | "https") && host_ok).then_some(url)
}

/// A web URL (http/https with a host) that points at an `.m3u8` playlist.
pub fn is_m3u8_url(input: &str) -> bool {
    parse_web_url(input).is_some() && input.to_ascii_lowercase().contains(".m3u8")
}

/// Classify user input. Checks run in a fixed order and the first hit wins,
/// so a `youtube.com/...mp4` link is still treated as a YouTube page.
pub fn classify(input: &str) -> Option<SourceKind> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if is_youtube_url(input) {
        Some(SourceKind::Youtube)
    } else if is_rutube_url(input) {
        Some(SourceKind::Rutube)
    } else if is_direct_video_url(input) {
        Some(SourceKind::Direct)
    } else if is_m3u8_url(input) {
        Some(SourceKind::M3u8)
    } else {
        None
    }
}

pub fn youtube_video_id(input: &str) -> Option<String> {
    youtube_id_res()
        .iter()
        .find_map(|re| re.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn rutube_video_id(input: &str) -> Option<String> {
    rutube_id_re()
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_order() {
        assert_eq!(classify("https://www.youtube.com/watch?v=jfKfPfyJRdk"), Some(SourceKind::Youtube));
        assert_eq!(classify("https://YOUTU.BE/jfKfPfyJRdk"), Some(SourceKind::Youtube));
        assert_eq!(classify("https://rutube.ru/video/abc123/"), Some(SourceKind::Rutube));
        assert_eq!(classify("https://cdn.example.com/loop.MP4"), Some(SourceKind::Direct));
        assert_eq!(
            classify("https://rr1---sn-abc.googlevideo.com/videoplayback?expire=1"),
            Some(SourceKind::Direct)
        );
        assert_eq!(classify("https://cdn.example.com/live/index.m3u8"), Some(SourceKind::M3u8));
        // youtube wins over the direct-file heuristic
        assert_eq!(classify("https://youtube.com/clip.mp4"), Some(SourceKind::Youtube));
    }

    #[test]
    fn test_unsupported_input() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("   "), None);
        assert_eq!(classify("https://vimeo.com/123456"), None);
        assert_eq!(classify("not a url .m3u8"), None);
        assert_eq!(classify("ftp://example.com/a.m3u8"), None);
    }

    #[test]
    fn test_schemeless_input() {
        assert_eq!(classify("cdn.example.com/live.m3u8"), Some(SourceKind::M3u8));
        assert_eq!(classify("youtube.com/watch?v=dQw4w9WgXcQ"), Some(SourceKind::Youtube));
        assert_eq!(with_scheme("youtu.be/dQw4w9WgXcQ"), "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(with_scheme("http://a.example/x.m3u8"), "http://a.example/x.m3u8");

        let url = parse_web_url("rutube.ru/video/0a1b2c/").unwrap();
        assert_eq!(url.host_str(), Some("rutube.ru"));
        assert!(parse_web_url("ftp://example.com/a.m3u8").is_none());
        assert!(parse_web_url("not a url").is_none());
    }

    #[test]
    fn test_videoplayback_without_host_hint() {
        assert!(is_direct_video_url("https://proxy.example.com/VideoPlayback?id=1"));
        assert!(!is_direct_video_url("https://proxy.example.com/videoplayback"));
    }

    #[test]
    fn test_youtube_video_ids() {
        let cases = [
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://youtu.be/dQw4w9WgXcQ?t=3", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/embed/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://m.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/shorts/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
        ];
        for (url, id) in cases {
            assert_eq!(youtube_video_id(url).as_deref(), Some(id), "{}", url);
        }
        assert_eq!(youtube_video_id("https://www.youtube.com/channel/UC123"), None);
    }

    #[test]
    fn test_rutube_video_ids() {
        assert_eq!(
            rutube_video_id("https://RUTUBE.ru/video/0a1b2c3d4e5f/").as_deref(),
            Some("0a1b2c3d4e5f")
        );
        assert_eq!(rutube_video_id("https://rutube.ru/channel/42/"), None);
    }

    #[test]
    fn test_type_tags() {
        for kind in [SourceKind::Youtube, SourceKind::Rutube, SourceKind::Direct, SourceKind::M3u8] {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert!("unknown".parse::<SourceKind>().is_err());
        assert!(SourceKind::Youtube.is_refreshable());
        assert!(!SourceKind::Direct.is_refreshable());
        assert!(!SourceKind::M3u8.is_refreshable());
    }
}
