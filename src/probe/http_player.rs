use crate::probe::{PlaybackError, PlaybackState, Player, PlayerEvent, TrackFormat};
use crate::utils::looks_like_html;
use futures::StreamExt;
use m3u8_rs::Playlist;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

pub const ERROR_BAD_HTTP_STATUS: &str = "ERROR_CODE_IO_BAD_HTTP_STATUS";
pub const ERROR_CONNECTION_FAILED: &str = "ERROR_CODE_IO_NETWORK_CONNECTION_FAILED";
pub const ERROR_CONNECTION_TIMEOUT: &str = "ERROR_CODE_IO_NETWORK_CONNECTION_TIMEOUT";
pub const ERROR_IO_UNSPECIFIED: &str = "ERROR_CODE_IO_UNSPECIFIED";
pub const ERROR_MANIFEST_MALFORMED: &str = "ERROR_CODE_PARSING_MANIFEST_MALFORMED";
pub const ERROR_CONTAINER_UNSUPPORTED: &str = "ERROR_CODE_PARSING_CONTAINER_UNSUPPORTED";
pub const ERROR_INVALID_CONTENT_TYPE: &str = "ERROR_CODE_IO_INVALID_HTTP_CONTENT_TYPE";
pub const ERROR_INVALID_SOURCE: &str = "ERROR_CODE_FAILED_RUNTIME_CHECK";

/// Bytes pulled from a progressive file to prove it is being served.
const PROGRESSIVE_PROBE_BYTES: u64 = 64 * 1024;

/// A player that goes as far as a real one does before "ready": it loads the
/// manifest (and the chosen variant) or the first bytes of a file, then
/// reports. Nothing is decoded or rendered.
pub struct HttpPlayer {
    client: reqwest::Client,
    source: Option<String>,
    volume: f32,
    format: Arc<Mutex<Option<TrackFormat>>>,
    tx: Option<mpsc::UnboundedSender<PlayerEvent>>,
    rx: Option<mpsc::UnboundedReceiver<PlayerEvent>>,
    task: Option<JoinHandle<()>>,
}

impl HttpPlayer {
    pub fn new(client: reqwest::Client) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            source: None,
            volume: 1.0,
            format: Arc::new(Mutex::new(None)),
            tx: Some(tx),
            rx: Some(rx),
            task: None,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl Player for HttpPlayer {
    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
    }

    /// One-shot: the sender moves into the loading task, so the event channel
    /// closes if that task dies without reporting.
    fn prepare(&mut self) {
        let Some(tx) = self.tx.take() else {
            tracing::debug!("Player already prepared");
            return;
        };
        let Some(source) = self.source.clone() else {
            let _ = tx.send(PlayerEvent::Error(PlaybackError::new(ERROR_INVALID_SOURCE, "no source set")));
            return;
        };

        let client = self.client.clone();
        let format = Arc::clone(&self.format);
        self.task = Some(tokio::spawn(async move {
            let _ = tx.send(PlayerEvent::StateChanged(PlaybackState::Buffering));
            match inspect(&client, &source).await {
                Ok(track) => {
                    if let Ok(mut slot) = format.lock() {
                        *slot = track;
                    }
                    let _ = tx.send(PlayerEvent::StateChanged(PlaybackState::Ready));
                }
                Err(error) => {
                    let _ = tx.send(PlayerEvent::Error(error));
                }
            }
        }));
    }

    fn play(&mut self) {}

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PlayerEvent>> {
        self.rx.take()
    }

    fn video_format(&self) -> Option<TrackFormat> {
        self.format.lock().ok().and_then(|slot| slot.clone())
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.source = None;
    }
}

impl Drop for HttpPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

fn transport_error(e: reqwest::Error) -> PlaybackError {
    let code = if e.is_timeout() {
        ERROR_CONNECTION_TIMEOUT
    } else if e.is_connect() {
        ERROR_CONNECTION_FAILED
    } else {
        ERROR_IO_UNSPECIFIED
    };
    PlaybackError::new(code, e.to_string())
}

fn is_manifest(url: &str, content_type: &str) -> bool {
    url.to_ascii_lowercase().contains(".m3u8") || content_type.to_ascii_lowercase().contains("mpegurl")
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, PlaybackError> {
    let response = client.get(url).send().await.map_err(transport_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(PlaybackError::new(ERROR_BAD_HTTP_STATUS, format!("HTTP {}", status)));
    }
    Ok(response)
}

/// Load what a player would load before it can start rendering.
pub async fn inspect(client: &reqwest::Client, url: &str) -> Result<Option<TrackFormat>, PlaybackError> {
    let base = Url::parse(url).map_err(|e| PlaybackError::new(ERROR_INVALID_SOURCE, e.to_string()))?;

    if is_manifest(url, "") {
        let body = fetch(client, url).await?.bytes().await.map_err(transport_error)?;
        return inspect_manifest(client, &base, &body).await;
    }

    let response = client
        .get(url)
        .header("Range", format!("bytes=0-{}", PROGRESSIVE_PROBE_BYTES - 1))
        .send()
        .await
        .map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(PlaybackError::new(ERROR_BAD_HTTP_STATUS, format!("HTTP {}", status)));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    // extensionless playlist URLs only reveal themselves by content type
    if is_manifest(url, &content_type) {
        let body = response.bytes().await.map_err(transport_error)?;
        return inspect_manifest(client, &base, &body).await;
    }

    inspect_progressive(response, &content_type).await
}

async fn inspect_manifest(
    client: &reqwest::Client,
    base: &Url,
    body: &[u8],
) -> Result<Option<TrackFormat>, PlaybackError> {
    let playlist = m3u8_rs::parse_playlist_res(body)
        .map_err(|_| PlaybackError::new(ERROR_MANIFEST_MALFORMED, "not an HLS playlist"))?;

    match playlist {
        Playlist::MasterPlaylist(master) => {
            let best = master
                .variants
                .iter()
                .filter(|v| !v.is_i_frame)
                .max_by_key(|v| {
                    let area = v
                        .resolution
                        .as_ref()
                        .map(|r| r.width.saturating_mul(r.height))
                        .unwrap_or(0);
                    (area, v.bandwidth)
                })
                .ok_or_else(|| PlaybackError::new(ERROR_MANIFEST_MALFORMED, "master playlist has no variants"))?;

            tracing::debug!("Selected variant: bandwidth {}, resolution {:?}", best.bandwidth, best.resolution);

            let variant_url = base
                .join(&best.uri)
                .map_err(|e| PlaybackError::new(ERROR_MANIFEST_MALFORMED, e.to_string()))?;
            let variant_body = fetch(client, variant_url.as_str())
                .await?
                .bytes()
                .await
                .map_err(transport_error)?;

            match m3u8_rs::parse_playlist_res(&variant_body) {
                Ok(Playlist::MediaPlaylist(media)) if !media.segments.is_empty() => {}
                _ => {
                    return Err(PlaybackError::new(
                        ERROR_MANIFEST_MALFORMED,
                        "variant playlist has no segments",
                    ))
                }
            }

            // dimensions that do not fit a u32 are reported as unknown
            let dimension = |d: Option<u64>| d.and_then(|d| u32::try_from(d).ok()).unwrap_or(0);
            Ok(Some(TrackFormat {
                width: dimension(best.resolution.as_ref().map(|r| r.width)),
                height: dimension(best.resolution.as_ref().map(|r| r.height)),
                sample_mime_type: best.codecs.clone(),
            }))
        }
        Playlist::MediaPlaylist(media) => {
            if media.segments.is_empty() {
                return Err(PlaybackError::new(ERROR_MANIFEST_MALFORMED, "media playlist has no segments"));
            }
            Ok(None)
        }
    }
}

async fn inspect_progressive(
    response: reqwest::Response,
    content_type: &str,
) -> Result<Option<TrackFormat>, PlaybackError> {
    let mut stream = response.bytes_stream();
    let first = match stream.next().await {
        Some(chunk) => chunk.map_err(transport_error)?,
        None => return Err(PlaybackError::new(ERROR_CONTAINER_UNSUPPORTED, "empty response body")),
    };

    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if mime.starts_with("text/") || looks_like_html(&String::from_utf8_lossy(&first)) {
        return Err(PlaybackError::new(
            ERROR_INVALID_CONTENT_TYPE,
            format!("server answered with {}", if mime.is_empty() { "a page" } else { mime.as_str() }),
        ));
    }

    Ok(Some(TrackFormat {
        width: 0,
        height: 0,
        sample_mime_type: (!mime.is_empty()).then_some(mime),
    }))
}
