use crate::config::Config;
use crate::core::source::youtube_video_id;
use crate::core::{ExtractOptions, Extractor, SourceKind, StreamInfo, VideoFormat};
use crate::error::ExtractError;
use crate::utils::{build_http_client, preview, unescape_js_string};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use url::Url;

const SERVICE: &str = "YouTube";

const ANDROID_CLIENT_VERSION: &str = "17.31.35";
const ANDROID_CLIENT_UA: &str = "com.google.android.youtube/17.31.35 (Linux; U; Android 11) gzip";

pub const NO_STREAM_MESSAGE: &str = "No stream found for this video.\n\n\
This video may be:\n\
- Age-restricted\n\
- Private/unlisted\n\
- Geo-blocked in your region\n\n\
TIP: For best results, use:\n\
- Live streams\n\
- 24/7 streams (lofi, nature cams)\n\
- Public videos";

pub struct YouTubeExtractor {
    client: reqwest::Client,
    base_url: String,
    innertube_key: String,
    user_agent: String,
}

impl YouTubeExtractor {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.endpoints.youtube.trim_end_matches('/').to_string(),
            innertube_key: config.endpoints.innertube_key.clone(),
            user_agent: config.desktop_user_agent.clone(),
        })
    }

    pub fn extract_video_id(&self, url: &Url) -> Option<String> {
        youtube_video_id(url.as_str())
    }

    /// Ask the InnerTube player endpoint as the Android app would. Android
    /// client responses carry plain URLs, no signature deciphering needed.
    async fn try_innertube(&self, video_id: &str, options: &ExtractOptions) -> Option<StreamInfo> {
        let body = json!({
            "videoId": video_id,
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": ANDROID_CLIENT_VERSION,
                    "androidSdkVersion": 30,
                    "hl": "en",
                    "gl": "US",
                    "utcOffsetMinutes": 0
                }
            },
            "contentCheckOk": true,
            "racyCheckOk": true
        });

        let endpoint = format!("{}/youtubei/v1/player?key={}", self.base_url, self.innertube_key);
        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("User-Agent", ANDROID_CLIENT_UA)
            .header("X-YouTube-Client-Name", "3")
            .header("X-YouTube-Client-Version", ANDROID_CLIENT_VERSION)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("InnerTube request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("InnerTube API failed: HTTP {}", response.status());
            return None;
        }

        let text = match response.text().await {
            Ok(t) if !t.is_empty() => t,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!("InnerTube body unreadable: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(player_response) => stream_from_innertube(&player_response, options),
            Err(e) => {
                tracing::warn!("InnerTube returned malformed JSON: {}", e);
                None
            }
        }
    }

    /// Fallback: scrape the watch page for the embedded player response.
    async fn try_html(&self, video_id: &str, options: &ExtractOptions) -> Option<StreamInfo> {
        let page_url = format!("{}/watch?v={}", self.base_url, video_id);
        let response = self
            .client
            .get(&page_url)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Language", "en-US,en;q=0.9")
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("HTML fetch failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("HTML fetch failed: HTTP {}", response.status());
            return None;
        }

        let html = match response.text().await {
            Ok(t) if !t.is_empty() => t,
            _ => return None,
        };

        let Some(player_response) = extract_player_response(&html) else {
            tracing::debug!("No player response in page: {}", preview(&html, 200));
            return None;
        };

        stream_from_player_response(&player_response, options)
    }
}

struct PageRegexes {
    initial: [Regex; 2],
    bare_hls: Regex,
    escaped: Regex,
}

fn page_regexes() -> &'static PageRegexes {
    static RES: OnceLock<PageRegexes> = OnceLock::new();
    RES.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static regex");
        PageRegexes {
            initial: [
                re(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\});"),
                re(r"(?s)var\s+ytInitialPlayerResponse\s*=\s*(\{.+?\})\s*;\s*(?:var|</script>)"),
            ],
            bare_hls: re(r#""streamingData":\{[^}]*"hlsManifestUrl":"([^"]+)""#),
            escaped: re(r#"(?s)"player_response"\s*:\s*"(\{.+?\})""#),
        }
    })
}

/// Locate the player response JSON inside a watch page. Tries the inline
/// `ytInitialPlayerResponse` assignment, then a bare `hlsManifestUrl`, then
/// the legacy escaped `player_response` string.
pub fn extract_player_response(html: &str) -> Option<Value> {
    let regexes = page_regexes();

    for re in &regexes.initial {
        if let Some(json_str) = re.captures(html).and_then(|c| c.get(1)) {
            match serde_json::from_str::<Value>(json_str.as_str()) {
                Ok(parsed) => return Some(parsed),
                Err(e) => tracing::debug!("ytInitialPlayerResponse did not parse: {}", e),
            }
        }
    }

    if let Some(url) = regexes.bare_hls.captures(html).and_then(|c| c.get(1)) {
        let url = unescape_js_string(url.as_str());
        return Some(json!({ "streamingData": { "hlsManifestUrl": url } }));
    }

    if let Some(escaped) = regexes.escaped.captures(html).and_then(|c| c.get(1)) {
        let unescaped = escaped.as_str().replace("\\\"", "\"");
        if let Ok(parsed) = serde_json::from_str::<Value>(&unescaped) {
            return Some(parsed);
        }
    }

    None
}

/// Walk an InnerTube response: HLS, DASH, tallest progressive, then
/// adaptive with audio, then any adaptive video.
pub fn stream_from_innertube(player_response: &Value, options: &ExtractOptions) -> Option<StreamInfo> {
    if let Some(playability) = player_response.get("playabilityStatus") {
        let status = playability.get("status").and_then(Value::as_str).unwrap_or("");
        if status != "OK" {
            let reason = playability
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            tracing::warn!("Video not playable: {}", reason);
            return None;
        }
    }

    let streaming_data = player_response.get("streamingData")?;

    if let Some(url) = non_empty_str(streaming_data, "hlsManifestUrl") {
        tracing::debug!("Found HLS manifest via InnerTube");
        return Some(StreamInfo::new(url, "innertube-hls"));
    }

    if let Some(url) = non_empty_str(streaming_data, "dashManifestUrl") {
        tracing::debug!("Found DASH manifest via InnerTube");
        return Some(StreamInfo::new(url, "innertube-dash"));
    }

    let formats = parse_formats(streaming_data.get("formats"));
    if let Some(best) = select_tallest(&formats, options.max_height, false) {
        tracing::debug!("Found progressive format {} via InnerTube - Height: {}", best.format_id, best.height);
        return Some(StreamInfo::new(&best.url, "innertube-progressive").with_height(best.height));
    }

    let adaptive = parse_formats(streaming_data.get("adaptiveFormats"));
    let with_url = || adaptive.iter().filter(|f| !f.url.is_empty() && f.has_video());

    if let Some(muxed) = with_url().find(|f| f.has_audio()) {
        tracing::debug!("Found adaptive format with audio via InnerTube");
        return Some(StreamInfo::new(&muxed.url, "innertube-adaptive").with_height(muxed.height));
    }

    if let Some(video_only) = with_url().next() {
        tracing::debug!("Found adaptive video format via InnerTube (no audio)");
        return Some(StreamInfo::new(&video_only.url, "innertube-adaptive").with_height(video_only.height));
    }

    None
}

/// Walk a player response scraped from HTML: HLS, manifest-looking format
/// URL, tallest progressive video, manifest-looking adaptive URL.
pub fn stream_from_player_response(player_response: &Value, options: &ExtractOptions) -> Option<StreamInfo> {
    let streaming_data = player_response.get("streamingData")?;

    if let Some(url) = non_empty_str(streaming_data, "hlsManifestUrl") {
        tracing::debug!("Found HLS via HTML");
        return Some(StreamInfo::new(url, "html-hls"));
    }

    let formats = parse_formats(streaming_data.get("formats"));
    if let Some(manifest) = formats.iter().find(|f| f.is_manifest()) {
        tracing::debug!("Found manifest via HTML formats");
        return Some(StreamInfo::new(&manifest.url, "html-manifest"));
    }

    if let Some(best) = select_tallest(&formats, options.max_height, true) {
        tracing::debug!("Found progressive format {} via HTML - Height: {}", best.format_id, best.height);
        return Some(StreamInfo::new(&best.url, "html-progressive").with_height(best.height));
    }

    let adaptive = parse_formats(streaming_data.get("adaptiveFormats"));
    if let Some(manifest) = adaptive.iter().find(|f| f.is_manifest()) {
        tracing::debug!("Found manifest via HTML adaptive");
        return Some(StreamInfo::new(&manifest.url, "html-manifest"));
    }

    None
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub fn parse_formats(array: Option<&Value>) -> Vec<VideoFormat> {
    array
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(parse_format).collect())
        .unwrap_or_default()
}

fn parse_format(format: &Value) -> VideoFormat {
    VideoFormat {
        format_id: format
            .get("itag")
            .and_then(Value::as_i64)
            .map(|i| i.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        url: format.get("url").and_then(Value::as_str).unwrap_or("").to_string(),
        mime_type: format.get("mimeType").and_then(Value::as_str).unwrap_or("").to_string(),
        height: format
            .get("height")
            .and_then(Value::as_u64)
            .and_then(|h| u32::try_from(h).ok())
            .unwrap_or(0),
    }
}

/// The tallest format that has a URL. With a height cap, formats under the
/// cap win; if none fit, the cap is ignored. Ties keep the earlier entry.
pub fn select_tallest(formats: &[VideoFormat], max_height: Option<u32>, require_video: bool) -> Option<&VideoFormat> {
    let candidates = || {
        formats
            .iter()
            .filter(move |f| !f.url.is_empty() && f.height > 0 && (!require_video || f.has_video()))
    };

    let tallest = |fits: &dyn Fn(&VideoFormat) -> bool| {
        candidates().filter(|f| fits(*f)).fold(None::<&VideoFormat>, |best, f| match best {
            Some(b) if b.height >= f.height => Some(b),
            _ => Some(f),
        })
    };

    match max_height {
        Some(cap) => tallest(&|f: &VideoFormat| f.height <= cap).or_else(|| tallest(&|_: &VideoFormat| true)),
        None => tallest(&|_: &VideoFormat| true),
    }
}

#[async_trait]
impl Extractor for YouTubeExtractor {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Youtube
    }

    fn suitable(&self, url: &Url) -> bool {
        if let Some(host) = url.host_str() {
            host.contains("youtube.com") || host == "youtu.be"
        } else {
            false
        }
    }

    async fn extract(&self, url: &Url, options: &ExtractOptions) -> Result<StreamInfo, ExtractError> {
        let video_id = self.extract_video_id(url).ok_or_else(|| ExtractError::InvalidUrl {
            service: SERVICE,
            url: url.to_string(),
        })?;

        if let Some(stream) = self.try_innertube(&video_id, options).await {
            return Ok(stream);
        }

        tracing::debug!("InnerTube gave nothing for {}, trying watch page", video_id);
        if let Some(stream) = self.try_html(&video_id, options).await {
            return Ok(stream);
        }

        Err(ExtractError::NoStream(NO_STREAM_MESSAGE.to_string()))
    }
}
