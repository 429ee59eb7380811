pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod extractors;
pub mod probe;
pub mod provider;
pub mod session;
pub mod store;
pub mod utils;

pub use crate::core::{classify, Extractor, Resolution, Resolver, SourceKind, StreamInfo};
pub use error::{ExtractError, StoreError};
pub use extractors::{RutubeExtractor, YouTubeExtractor};
pub use provider::{Wallpaper, WallpaperProvider, WallpaperProviderService};
pub use session::Session;
pub use store::PreferenceStore;
