pub mod http_player;

pub use http_player::HttpPlayer;

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// What the player knows about the selected video track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFormat {
    pub width: u32,
    pub height: u32,
    pub sample_mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackError {
    pub code_name: &'static str,
    pub message: String,
}

impl PlaybackError {
    pub fn new(code_name: &'static str, message: impl Into<String>) -> Self {
        Self {
            code_name,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    StateChanged(PlaybackState),
    Error(PlaybackError),
}

/// The slice of a media player the stream test needs. Events arrive on the
/// receiver handed out by `take_events`.
pub trait Player: Send {
    fn set_volume(&mut self, volume: f32);
    fn set_source(&mut self, url: &str);
    fn prepare(&mut self);
    fn play(&mut self);
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PlayerEvent>>;
    fn video_format(&self) -> Option<TrackFormat>;
    fn release(&mut self);
}

pub type PlayerFactory = Box<dyn Fn() -> Box<dyn Player> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Playable { resolution: String, codec: String },
    Failed { code_name: String },
    TimedOut(Duration),
}

impl ProbeOutcome {
    pub fn is_playable(&self) -> bool {
        matches!(self, ProbeOutcome::Playable { .. })
    }

    fn from_format(format: Option<TrackFormat>) -> Self {
        let resolution = match &format {
            Some(f) if f.width > 0 && f.height > 0 => format!("{}×{}", f.width, f.height),
            _ => "Unknown resolution".to_string(),
        };
        let codec = format
            .and_then(|f| f.sample_mime_type)
            .unwrap_or_else(|| "Unknown codec".to_string());
        ProbeOutcome::Playable { resolution, codec }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Playable { resolution, codec } => write!(f, "Stream OK\n{}\n{}", resolution, codec),
            ProbeOutcome::Failed { code_name } => write!(f, "Stream failed: {}", code_name),
            ProbeOutcome::TimedOut(after) => write!(f, "Stream timeout ({}s)", after.as_secs()),
        }
    }
}

/// Plays a URL muted until the player reports ready, fails, or the timer
/// runs out. Holds at most one player; it is released before a new one is
/// created and again once the outcome is known.
pub struct StreamProbe {
    factory: PlayerFactory,
    timeout: Duration,
    player: Option<Box<dyn Player>>,
}

impl StreamProbe {
    pub fn new(factory: PlayerFactory, timeout: Duration) -> Self {
        Self {
            factory,
            timeout,
            player: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn test(&mut self, url: &str) -> ProbeOutcome {
        self.release();

        let mut player = (self.factory)();
        player.set_volume(0.0);
        let Some(mut events) = player.take_events() else {
            warn!("Player handed out no event channel");
            player.release();
            return ProbeOutcome::Failed {
                code_name: "ERROR_CODE_UNSPECIFIED".to_string(),
            };
        };

        player.set_source(url);
        player.prepare();
        player.play();
        self.player = Some(player);

        let outcome = match tokio::time::timeout(self.timeout, self.wait_for_outcome(&mut events)).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::TimedOut(self.timeout),
        };

        info!("Stream test for {}: {:?}", url, outcome);
        self.release();
        outcome
    }

    async fn wait_for_outcome(&self, events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> ProbeOutcome {
        while let Some(event) = events.recv().await {
            match event {
                PlayerEvent::StateChanged(PlaybackState::Ready) => {
                    let format = self.player.as_ref().and_then(|p| p.video_format());
                    return ProbeOutcome::from_format(format);
                }
                PlayerEvent::StateChanged(state) => debug!("Playback state changed: {:?}", state),
                PlayerEvent::Error(error) => {
                    debug!("Player error {}: {}", error.code_name, error.message);
                    return ProbeOutcome::Failed {
                        code_name: error.code_name.to_string(),
                    };
                }
            }
        }

        // player dropped its sender without reporting anything
        ProbeOutcome::Failed {
            code_name: "ERROR_CODE_UNSPECIFIED".to_string(),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.release();
        }
    }
}

impl Drop for StreamProbe {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays a fixed script of events after `prepare`.
    struct ScriptedPlayer {
        script: Vec<PlayerEvent>,
        format: Option<TrackFormat>,
        tx: mpsc::UnboundedSender<PlayerEvent>,
        rx: Option<mpsc::UnboundedReceiver<PlayerEvent>>,
        released: Arc<AtomicUsize>,
    }

    impl Player for ScriptedPlayer {
        fn set_volume(&mut self, _volume: f32) {}
        fn set_source(&mut self, _url: &str) {}
        fn prepare(&mut self) {
            for event in self.script.drain(..) {
                let _ = self.tx.send(event);
            }
        }
        fn play(&mut self) {}
        fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PlayerEvent>> {
            self.rx.take()
        }
        fn video_format(&self) -> Option<TrackFormat> {
            self.format.clone()
        }
        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn probe(script: Vec<PlayerEvent>, format: Option<TrackFormat>, released: Arc<AtomicUsize>) -> StreamProbe {
        let factory: PlayerFactory = Box::new(move || {
            let (tx, rx) = mpsc::unbounded_channel();
            Box::new(ScriptedPlayer {
                script: script.clone(),
                format: format.clone(),
                tx,
                rx: Some(rx),
                released: released.clone(),
            })
        });
        StreamProbe::new(factory, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_ready_reports_format() {
        let released = Arc::new(AtomicUsize::new(0));
        let format = TrackFormat {
            width: 1920,
            height: 1080,
            sample_mime_type: Some("video/avc".to_string()),
        };
        let mut probe = probe(
            vec![
                PlayerEvent::StateChanged(PlaybackState::Buffering),
                PlayerEvent::StateChanged(PlaybackState::Ready),
            ],
            Some(format),
            released.clone(),
        );

        let outcome = probe.test("https://x/a.m3u8").await;
        assert_eq!(outcome.to_string(), "Stream OK\n1920×1080\nvideo/avc");
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_outcome_wins() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut probe = probe(
            vec![
                PlayerEvent::Error(PlaybackError::new("ERROR_CODE_IO_BAD_HTTP_STATUS", "403")),
                PlayerEvent::StateChanged(PlaybackState::Ready),
            ],
            None,
            released,
        );
        assert_eq!(
            probe.test("https://x/a.m3u8").await,
            ProbeOutcome::Failed {
                code_name: "ERROR_CODE_IO_BAD_HTTP_STATUS".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut probe = probe(vec![PlayerEvent::StateChanged(PlaybackState::Buffering)], None, released.clone());
        let outcome = probe.test("https://x/a.m3u8").await;
        assert_eq!(outcome, ProbeOutcome::TimedOut(Duration::from_millis(200)));

        // a second run releases nothing extra before starting
        probe.test("https://x/b.m3u8").await;
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_format_text() {
        assert_eq!(
            ProbeOutcome::from_format(None).to_string(),
            "Stream OK\nUnknown resolution\nUnknown codec"
        );
    }
}
