use crate::config::ExpiryPolicy;
use crate::core::quality::clamp_index;
use crate::core::{Resolution, SourceKind};
use crate::error::StoreError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MILLIS_PER_HOUR: i64 = 1000 * 60 * 60;

/// The last successful resolution. Overwritten, never appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub original_url: String,
    pub stream_url: String,
    pub url_type: SourceKind,
    /// Unix milliseconds of the extraction.
    pub timestamp: i64,
    pub selected_quality: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// What the launcher is told to play.
    pub wallpaper_source_url: Option<String>,
    pub youtube_quality: usize,
    pub rutube_quality: usize,
    // keep last: TOML tables must follow plain values
    pub stream: Option<StreamRecord>,
}

/// Flat key-value preferences persisted as a single TOML file.
#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferenceStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let prefs = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(source) => return Err(io_error(&path, source)),
        };
        debug!("Loaded preferences from {}", path.display());
        Ok(Self { path, prefs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn record(&self) -> Option<&StreamRecord> {
        self.prefs.stream.as_ref()
    }

    /// Write via a temp file and rename so a crash never leaves half a file.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        let text = toml::to_string_pretty(&self.prefs)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, text).map_err(|e| io_error(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }

    pub fn record_resolution(&mut self, resolution: &Resolution, now: DateTime<Utc>) -> Result<(), StoreError> {
        let selected_quality = self.quality(resolution.kind);
        self.prefs.stream = Some(StreamRecord {
            original_url: resolution.original_url.clone(),
            stream_url: resolution.stream_url.clone(),
            url_type: resolution.kind,
            timestamp: now.timestamp_millis(),
            selected_quality,
        });
        info!("Saved URL - Type: {}, Original: {}", resolution.kind, resolution.original_url);
        self.save()
    }

    pub fn wallpaper_source(&self) -> Option<&str> {
        self.prefs.wallpaper_source_url.as_deref()
    }

    pub fn set_wallpaper_source(&mut self, url: &str) -> Result<(), StoreError> {
        self.prefs.wallpaper_source_url = Some(url.to_string());
        self.save()
    }

    pub fn quality(&self, kind: SourceKind) -> usize {
        match kind {
            SourceKind::Youtube => clamp_index(kind, self.prefs.youtube_quality),
            SourceKind::Rutube => clamp_index(kind, self.prefs.rutube_quality),
            SourceKind::Direct | SourceKind::M3u8 => 0,
        }
    }

    pub fn set_quality(&mut self, kind: SourceKind, index: usize) -> Result<usize, StoreError> {
        let index = clamp_index(kind, index);
        match kind {
            SourceKind::Youtube => self.prefs.youtube_quality = index,
            SourceKind::Rutube => self.prefs.rutube_quality = index,
            SourceKind::Direct | SourceKind::M3u8 => return Ok(0),
        }
        self.save()?;
        Ok(index)
    }

    pub fn extracted_at(&self) -> Option<DateTime<Utc>> {
        self.record()
            .filter(|r| r.timestamp != 0)
            .and_then(|r| Utc.timestamp_millis_opt(r.timestamp).single())
    }

    /// Whole hours since the last extraction; 0 when nothing was stamped.
    pub fn hours_since_extraction(&self, now: DateTime<Utc>) -> i64 {
        match self.record() {
            Some(r) if r.timestamp != 0 => (now.timestamp_millis() - r.timestamp) / MILLIS_PER_HOUR,
            _ => 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, policy: &ExpiryPolicy) -> bool {
        let Some(record) = self.record().filter(|r| r.timestamp != 0) else {
            return false;
        };
        let limit = match record.url_type {
            SourceKind::Direct => policy.direct_hours,
            _ => policy.stream_hours,
        };
        self.hours_since_extraction(now) >= limit
    }

    /// Forget the stream record and the wallpaper source. Quality choices stay.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.prefs.stream = None;
        self.prefs.wallpaper_source_url = None;
        self.save()
    }

    /// Serialise for the launcher's preferences backup.
    pub fn export(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.prefs)?)
    }

    /// Replace everything with a blob from `export`. Nothing changes if the
    /// blob does not parse.
    pub fn import(&mut self, blob: &str) -> Result<(), StoreError> {
        let prefs: Preferences = serde_json::from_str(blob)?;
        self.prefs = prefs;
        self.save()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
