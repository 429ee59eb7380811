use crate::config::Config;
use crate::core::source::rutube_video_id;
use crate::core::{ExtractOptions, Extractor, SourceKind, StreamInfo};
use crate::error::ExtractError;
use crate::utils::{build_http_client, preview};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

const SERVICE: &str = "Rutube";
const REFERER: &str = "https://rutube.ru";

pub struct RutubeExtractor {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl RutubeExtractor {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.endpoints.rutube.trim_end_matches('/').to_string(),
            user_agent: config.android_user_agent.clone(),
        })
    }

    pub fn extract_video_id(&self, url: &Url) -> Option<String> {
        rutube_video_id(url.as_str())
    }

    pub fn options_url(&self, video_id: &str) -> String {
        format!(
            "{}/api/play/options/{}/?no_404=true&referer={}",
            self.base_url,
            video_id,
            urlencoding::encode(REFERER)
        )
    }
}

/// Pull the HLS URL out of a play-options response. `video_balancer` shows
/// up as a JSON-encoded string, a plain URL string, or an object depending
/// on the API revision; the first non-empty candidate wins.
pub fn find_m3u8(response: &Value) -> Option<String> {
    let balancer = response.get("video_balancer");

    let from_balancer = match balancer {
        Some(Value::String(s)) if s.starts_with('{') => match serde_json::from_str::<Value>(s) {
            Ok(inner) => balancer_url(&inner),
            Err(e) => {
                tracing::warn!("Failed to parse video_balancer JSON: {}", e);
                None
            }
        },
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(obj @ Value::Object(_)) => balancer_url(obj),
        _ => None,
    };

    from_balancer
        .or_else(|| string_field(response, "m3u8"))
        .or_else(|| string_field(response, "hls"))
}

fn balancer_url(balancer: &Value) -> Option<String> {
    string_field(balancer, "m3u8").or_else(|| string_field(balancer, "default"))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Extractor for RutubeExtractor {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rutube
    }

    fn suitable(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.to_ascii_lowercase().contains("rutube.ru"))
    }

    async fn extract(&self, url: &Url, _options: &ExtractOptions) -> Result<StreamInfo, ExtractError> {
        let video_id = self.extract_video_id(url).ok_or_else(|| ExtractError::InvalidUrl {
            service: SERVICE,
            url: url.to_string(),
        })?;

        let api_url = self.options_url(&video_id);
        tracing::debug!("Requesting play options: {}", api_url);

        let response = self
            .client
            .get(&api_url)
            .header("Referer", REFERER)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(ExtractError::request(SERVICE))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Http {
                service: "Rutube API",
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await.map_err(ExtractError::request(SERVICE))?;
        if body.trim().is_empty() {
            return Err(ExtractError::EmptyResponse("Rutube API"));
        }

        let json: Value = serde_json::from_str(&body).map_err(ExtractError::json(SERVICE))?;

        match find_m3u8(&json) {
            Some(m3u8) => Ok(StreamInfo::new(m3u8, "play-options")),
            None => Err(ExtractError::NoStream(format!(
                "No M3U8 URL found in Rutube response\n\nResponse preview:\n{}",
                preview(&body, 300)
            ))),
        }
    }
}
