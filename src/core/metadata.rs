use crate::core::SourceKind;
use serde::{Deserialize, Serialize};

/// How the resolved URL is delivered to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    Hls,
    Dash,
    Progressive,
}

impl StreamProtocol {
    pub fn guess(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.contains("m3u8") || lower.contains("/hls") {
            StreamProtocol::Hls
        } else if lower.contains(".mpd") || lower.contains("/dash") {
            StreamProtocol::Dash
        } else {
            StreamProtocol::Progressive
        }
    }
}

/// Output of an extractor: a playable URL plus what we learned on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    pub url: String,
    pub protocol: StreamProtocol,
    /// Which step of the fallback chain produced the URL.
    pub via: &'static str,
    pub height: Option<u32>,
}

impl StreamInfo {
    pub fn new(url: impl Into<String>, via: &'static str) -> Self {
        let url = url.into();
        Self {
            protocol: StreamProtocol::guess(&url),
            url,
            via,
            height: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = (height > 0).then_some(height);
        self
    }
}

/// A user input resolved to something a player can open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub original_url: String,
    pub stream_url: String,
    pub kind: SourceKind,
    pub protocol: StreamProtocol,
}

/// One entry of YouTube's `formats` / `adaptiveFormats` arrays. Only the
/// fields the selection rules look at are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub url: String,
    pub mime_type: String,
    pub height: u32,
}

impl VideoFormat {
    pub fn has_video(&self) -> bool {
        self.mime_type.contains("video")
    }

    pub fn has_audio(&self) -> bool {
        self.mime_type.contains("audio")
    }

    pub fn is_manifest(&self) -> bool {
        self.url.contains("m3u8") || self.url.contains("manifest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_guess() {
        assert_eq!(
            StreamProtocol::guess("https://manifest.googlevideo.com/api/manifest/hls_variant/x/index.m3u8"),
            StreamProtocol::Hls
        );
        assert_eq!(
            StreamProtocol::guess("https://manifest.googlevideo.com/api/manifest/dash/id/1"),
            StreamProtocol::Dash
        );
        assert_eq!(StreamProtocol::guess("https://cdn.example.com/a.mp4"), StreamProtocol::Progressive);
    }

    #[test]
    fn test_zero_height_is_unknown() {
        let info = StreamInfo::new("https://cdn.example.com/a.mp4", "test").with_height(0);
        assert_eq!(info.height, None);
    }
}
