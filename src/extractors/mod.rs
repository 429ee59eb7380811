pub mod rutube;
pub mod youtube;

pub use rutube::RutubeExtractor;
pub use youtube::YouTubeExtractor;

use crate::config::Config;
use crate::core::Resolver;

/// A resolver with every built-in extractor registered.
pub fn default_resolver(config: &Config) -> reqwest::Result<Resolver> {
    let mut resolver = Resolver::new();
    resolver.register_extractor(Box::new(YouTubeExtractor::new(config)?));
    resolver.register_extractor(Box::new(RutubeExtractor::new(config)?));
    Ok(resolver)
}
