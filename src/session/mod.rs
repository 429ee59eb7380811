//! The settings screen: each public method is one button. Failures come back
//! as errors whose text is meant for the user; nothing here retries.

use crate::config::Config;
use crate::core::{classify, ExtractOptions, Resolution, Resolver, SourceKind};
use crate::extractors::default_resolver;
use crate::probe::{HttpPlayer, PlayerFactory, ProbeOutcome, StreamProbe};
use crate::store::PreferenceStore;
use crate::utils::build_client_with_timeout;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{info, warn};

pub const DIRECT_URL_WARNING: &str = "Direct video URLs (like from yt-dlp) typically expire after 6 hours.\n\n\
For permanent wallpapers:\n\
- Use the YouTube URL instead\n\
- It will be extracted again on refresh\n\n\
Current URL will work until it expires.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub hours: i64,
    pub kind: SourceKind,
}

impl fmt::Display for ExpiryNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Saved URL may be expired ({}h old, type: {})", self.hours, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub resolution: Resolution,
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub resolution: Resolution,
    /// Set for direct links, which cannot be refreshed later.
    pub direct_warning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    NothingSaved,
    NotExpired { hours: i64 },
    /// Direct links cannot be extracted again; the user may clear them.
    DirectExpired { hours: i64 },
    NotRefreshable { kind: SourceKind },
    Refreshed(Resolution),
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOutcome::NothingSaved => f.write_str("No saved URL to refresh"),
            RefreshOutcome::NotExpired { hours } => {
                write!(f, "Saved URL is still fresh ({}h old)", hours)
            }
            RefreshOutcome::DirectExpired { hours } => write!(
                f,
                "Your direct video URL has expired ({}h old).\n\n\
                 Direct URLs cannot be automatically refreshed.\n\n\
                 Options:\n\
                 - Get a new direct URL using yt-dlp\n\
                 - Use the original YouTube URL instead for auto-refresh\n\
                 - Run `clear` to forget it",
                hours
            ),
            RefreshOutcome::NotRefreshable { kind } => write!(f, "Cannot refresh URL type: {}", kind),
            RefreshOutcome::Refreshed(_) => f.write_str("URL refreshed successfully!"),
        }
    }
}

pub struct Session {
    config: Config,
    store: PreferenceStore,
    resolver: Resolver,
    probe: StreamProbe,
}

impl Session {
    /// Wire the built-in extractors and the HTTP-backed test player.
    pub fn new(config: Config) -> Result<Self> {
        let store = PreferenceStore::open(&config.store_path)?;
        let resolver = default_resolver(&config).context("Failed to create HTTP client")?;

        let client = build_client_with_timeout(config.probe_timeout()).context("Failed to create HTTP client")?;
        let factory: PlayerFactory = Box::new(move || Box::new(HttpPlayer::new(client.clone())));
        let probe = StreamProbe::new(factory, config.probe_timeout());

        Ok(Self::with_parts(config, store, resolver, probe))
    }

    pub fn with_parts(config: Config, store: PreferenceStore, resolver: Resolver, probe: StreamProbe) -> Self {
        Self {
            config,
            store,
            resolver,
            probe,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &PreferenceStore {
        &self.store
    }

    /// Shown when the screen opens.
    pub fn expiry_notice(&self, now: DateTime<Utc>) -> Option<ExpiryNotice> {
        if !self.store.is_expired(now, &self.config.expiry) {
            return None;
        }
        let record = self.store.record()?;
        Some(ExpiryNotice {
            hours: self.store.hours_since_extraction(now),
            kind: record.url_type,
        })
    }

    async fn resolve(&self, input: &str) -> Result<Resolution> {
        let input = input.trim();
        if input.is_empty() {
            bail!("Enter a URL");
        }
        let kind = classify(input).context("Enter a valid YouTube, Rutube, M3U8, or direct video URL")?;
        let options = ExtractOptions::for_quality(kind, self.store.quality(kind));
        Ok(self.resolver.resolve_as(input, kind, &options).await?)
    }

    /// Resolve, remember, then try to play the result.
    pub async fn test(&mut self, input: &str) -> Result<TestReport> {
        let resolution = self.resolve(input).await?;
        self.store.record_resolution(&resolution, Utc::now())?;

        let outcome = self.probe.test(&resolution.stream_url).await;
        Ok(TestReport { resolution, outcome })
    }

    /// Resolve, remember, and make it the wallpaper.
    pub async fn save(&mut self, input: &str) -> Result<SaveReport> {
        let resolution = self.resolve(input).await?;
        self.store.record_resolution(&resolution, Utc::now())?;
        self.store.set_wallpaper_source(&resolution.stream_url)?;
        info!("Wallpaper source saved: {}", resolution.stream_url);

        Ok(SaveReport {
            direct_warning: resolution.kind == SourceKind::Direct,
            resolution,
        })
    }

    pub async fn refresh(&mut self, force: bool) -> Result<RefreshOutcome> {
        self.refresh_at(Utc::now(), force).await
    }

    /// Extract the saved page URL again once its stream has gone stale.
    pub async fn refresh_at(&mut self, now: DateTime<Utc>, force: bool) -> Result<RefreshOutcome> {
        let Some(record) = self.store.record().cloned() else {
            return Ok(RefreshOutcome::NothingSaved);
        };
        let hours = self.store.hours_since_extraction(now);
        let expired = self.store.is_expired(now, &self.config.expiry);

        if !force && !expired {
            return Ok(RefreshOutcome::NotExpired { hours });
        }

        match record.url_type {
            SourceKind::Direct if expired => return Ok(RefreshOutcome::DirectExpired { hours }),
            SourceKind::Direct | SourceKind::M3u8 => {
                return Ok(RefreshOutcome::NotRefreshable { kind: record.url_type })
            }
            SourceKind::Youtube | SourceKind::Rutube => {}
        }

        info!("Refreshing {} URL: {}", record.url_type, record.original_url);
        let options = ExtractOptions::for_quality(record.url_type, record.selected_quality);
        let resolution = self
            .resolver
            .resolve_as(&record.original_url, record.url_type, &options)
            .await
            .map_err(|e| {
                warn!("Refresh failed for {}: {}", record.original_url, e);
                anyhow::anyhow!("Failed to refresh\n\nOriginal: {}\n\nError: {}", record.original_url, e)
            })?;

        self.store.record_resolution(&resolution, now)?;
        self.store.set_wallpaper_source(&resolution.stream_url)?;
        Ok(RefreshOutcome::Refreshed(resolution))
    }

    pub fn set_quality(&mut self, kind: SourceKind, index: usize) -> Result<usize> {
        Ok(self.store.set_quality(kind, index)?)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.probe.release();
        Ok(self.store.clear()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Extractor, StreamInfo};
    use crate::error::ExtractError;
    use crate::probe::{Player, PlayerEvent, TrackFormat};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use url::Url;

    struct CountingRutube(Arc<AtomicUsize>);

    #[async_trait]
    impl Extractor for CountingRutube {
        fn name(&self) -> &'static str {
            "Rutube"
        }
        fn kind(&self) -> SourceKind {
            SourceKind::Rutube
        }
        fn suitable(&self, _url: &Url) -> bool {
            true
        }
        async fn extract(&self, _url: &Url, _options: &ExtractOptions) -> Result<StreamInfo, ExtractError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(StreamInfo::new(format!("https://bl.rutube.ru/{}.m3u8", n), "test"))
        }
    }

    struct ReadyPlayer(Option<mpsc::UnboundedReceiver<PlayerEvent>>, mpsc::UnboundedSender<PlayerEvent>);

    impl Player for ReadyPlayer {
        fn set_volume(&mut self, _volume: f32) {}
        fn set_source(&mut self, _url: &str) {}
        fn prepare(&mut self) {
            let _ = self.1.send(PlayerEvent::StateChanged(crate::probe::PlaybackState::Ready));
        }
        fn play(&mut self) {}
        fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PlayerEvent>> {
            self.0.take()
        }
        fn video_format(&self) -> Option<TrackFormat> {
            None
        }
        fn release(&mut self) {}
    }

    fn session(dir: &tempfile::TempDir, calls: Arc<AtomicUsize>) -> Session {
        let config = Config {
            store_path: dir.path().join("prefs.toml"),
            ..Config::default()
        };
        let store = PreferenceStore::open(&config.store_path).unwrap();
        let mut resolver = Resolver::new();
        resolver.register_extractor(Box::new(CountingRutube(calls)));
        let factory: PlayerFactory = Box::new(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            Box::new(ReadyPlayer(Some(rx), tx))
        });
        let probe = StreamProbe::new(factory, std::time::Duration::from_secs(1));
        Session::with_parts(config, store, resolver, probe)
    }

    #[tokio::test]
    async fn test_blank_and_unsupported_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::new(AtomicUsize::new(0)));
        assert_eq!(session.save("  ").await.unwrap_err().to_string(), "Enter a URL");
        assert_eq!(
            session.test("https://vimeo.com/1").await.unwrap_err().to_string(),
            "Enter a valid YouTube, Rutube, M3U8, or direct video URL"
        );
        assert!(session.store().record().is_none());
    }

    #[tokio::test]
    async fn test_save_direct_warns_and_sets_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::new(AtomicUsize::new(0)));
        let report = session.save("https://cdn.example.com/loop.mp4").await.unwrap();
        assert!(report.direct_warning);
        assert_eq!(session.store().wallpaper_source(), Some("https://cdn.example.com/loop.mp4"));
        assert_eq!(session.store().record().unwrap().url_type, SourceKind::Direct);
    }

    #[tokio::test]
    async fn test_test_records_without_setting_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::new(AtomicUsize::new(0)));
        let report = session.test("https://rutube.ru/video/abc/").await.unwrap();
        assert!(report.outcome.is_playable());
        assert_eq!(report.resolution.stream_url, "https://bl.rutube.ru/1.m3u8");
        assert_eq!(session.store().wallpaper_source(), None);
        assert_eq!(session.store().record().unwrap().original_url, "https://rutube.ru/video/abc/");
    }

    #[tokio::test]
    async fn test_refresh_only_when_expired() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = session(&dir, calls.clone());
        session.save("https://rutube.ru/video/abc/").await.unwrap();

        let now = Utc::now();
        assert!(matches!(
            session.refresh_at(now, false).await.unwrap(),
            RefreshOutcome::NotExpired { .. }
        ));
        assert!(session.expiry_notice(now).is_none());

        let later = now + Duration::hours(5);
        let notice = session.expiry_notice(later).unwrap();
        assert_eq!(notice.kind, SourceKind::Rutube);

        match session.refresh_at(later, false).await.unwrap() {
            RefreshOutcome::Refreshed(res) => assert_eq!(res.stream_url, "https://bl.rutube.ru/2.m3u8"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.store().wallpaper_source(), Some("https://bl.rutube.ru/2.m3u8"));
        assert!(session.expiry_notice(later).is_none());
    }

    #[tokio::test]
    async fn test_direct_cannot_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::new(AtomicUsize::new(0)));
        session.save("https://cdn.example.com/loop.webm").await.unwrap();

        let later = Utc::now() + Duration::hours(7);
        assert_eq!(
            session.refresh_at(later, false).await.unwrap(),
            RefreshOutcome::DirectExpired { hours: 7 }
        );
        session.clear().unwrap();
        assert_eq!(session.refresh_at(later, true).await.unwrap(), RefreshOutcome::NothingSaved);
    }

    #[tokio::test]
    async fn test_forced_refresh_of_fresh_direct_link() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::new(AtomicUsize::new(0)));
        session.save("https://cdn.example.com/loop.webm").await.unwrap();

        let outcome = session.refresh_at(Utc::now(), true).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NotRefreshable { kind: SourceKind::Direct });
        assert_eq!(outcome.to_string(), "Cannot refresh URL type: direct");
    }

    #[tokio::test]
    async fn test_forced_refresh_extracts_again() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = session(&dir, calls.clone());
        session.save("https://rutube.ru/video/abc/").await.unwrap();

        match session.refresh_at(Utc::now(), true).await.unwrap() {
            RefreshOutcome::Refreshed(res) => assert_eq!(res.stream_url, "https://bl.rutube.ru/2.m3u8"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.store().wallpaper_source(), Some("https://bl.rutube.ru/2.m3u8"));
    }

    #[tokio::test]
    async fn test_expired_playlist_is_not_refreshable() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = session(&dir, calls.clone());
        session.save("https://cdn.example.com/live/index.m3u8").await.unwrap();

        let later = Utc::now() + Duration::hours(6);
        assert_eq!(
            session.refresh_at(later, false).await.unwrap(),
            RefreshOutcome::NotRefreshable { kind: SourceKind::M3u8 }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expiry_notice_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir, Arc::new(AtomicUsize::new(0)));
        session.save("https://rutube.ru/video/abc/").await.unwrap();

        let notice = session.expiry_notice(Utc::now() + Duration::hours(8)).unwrap();
        assert_eq!(notice.to_string(), "Saved URL may be expired (8h old, type: rutube)");
    }
}
