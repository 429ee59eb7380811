//! The surface the host launcher calls into. A binding layer forwards the
//! launcher's service calls here; everything crosses as plain data or JSON.

use crate::config::Config;
use crate::store::PreferenceStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WallpaperType {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WallpaperDisplayMode {
    #[default]
    Crop,
    Stretch,
    Default,
}

/// Handed to the launcher verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallpaper {
    pub uri: String,
    #[serde(rename = "type")]
    pub wallpaper_type: WallpaperType,
    pub display_mode: WallpaperDisplayMode,
    pub title: String,
}

/// Why the launcher is asking for wallpapers. This provider answers every
/// event the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    TimeElapsed,
    LauncherIdleModeChanged { is_idle: bool },
    CardFocused { card_id: String },
}

pub trait WallpaperProviderService {
    fn get_wallpapers(&self, event: Option<&Event>) -> Vec<Wallpaper>;
    fn get_preferences(&self) -> String;
    fn set_preferences(&self, params: &str);
}

pub struct WallpaperProvider {
    config: Config,
}

impl WallpaperProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Re-read on every call; the settings side may have written since.
    fn open_store(&self) -> Option<PreferenceStore> {
        match PreferenceStore::open(&self.config.store_path) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Preferences unavailable: {}", e);
                None
            }
        }
    }

    pub fn source_url(&self) -> String {
        self.open_store()
            .and_then(|store| store.wallpaper_source().map(str::to_string))
            .unwrap_or_else(|| self.config.default_wallpaper_url.clone())
    }
}

impl WallpaperProviderService for WallpaperProvider {
    fn get_wallpapers(&self, event: Option<&Event>) -> Vec<Wallpaper> {
        let uri = self.source_url();
        debug!("Sending video wallpaper for {:?}: {}", event, uri);

        vec![Wallpaper {
            uri,
            wallpaper_type: WallpaperType::Video,
            display_mode: WallpaperDisplayMode::Crop,
            title: self.config.wallpaper_title.clone(),
        }]
    }

    fn get_preferences(&self) -> String {
        self.open_store()
            .and_then(|store| match store.export() {
                Ok(blob) => Some(blob),
                Err(e) => {
                    warn!("Failed to export preferences: {}", e);
                    None
                }
            })
            .unwrap_or_else(|| "{}".to_string())
    }

    fn set_preferences(&self, params: &str) {
        let Some(mut store) = self.open_store() else {
            return;
        };
        if let Err(e) = store.import(params) {
            warn!("Ignoring preferences from launcher: {}", e);
        }
    }
}
