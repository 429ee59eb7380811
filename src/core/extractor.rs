use crate::core::source::{parse_web_url, with_scheme};
use crate::core::{classify, ExtractOptions, Resolution, SourceKind, StreamInfo, StreamProtocol};
use crate::error::ExtractError;
use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> SourceKind;
    fn suitable(&self, url: &Url) -> bool;
    async fn extract(&self, url: &Url, options: &ExtractOptions) -> Result<StreamInfo, ExtractError>;
}

/// Classify, then hand page URLs to the matching extractor. Direct and HLS
/// links come back untouched.
pub struct Resolver {
    pub extractors: Vec<Box<dyn Extractor>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    pub fn register_extractor(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub async fn resolve(&self, input: &str, options: &ExtractOptions) -> Result<Resolution, ExtractError> {
        let input = input.trim();
        let kind = classify(input).ok_or_else(|| ExtractError::Unsupported(input.to_string()))?;
        self.resolve_as(input, kind, options).await
    }

    /// Resolve with a known type tag, used when refreshing a stored record.
    pub async fn resolve_as(
        &self,
        input: &str,
        kind: SourceKind,
        options: &ExtractOptions,
    ) -> Result<Resolution, ExtractError> {
        if !kind.needs_extraction() {
            debug!("{} URL passes through unchanged", kind);
            let stream_url = with_scheme(input).into_owned();
            return Ok(Resolution {
                original_url: input.to_string(),
                protocol: StreamProtocol::guess(&stream_url),
                stream_url,
                kind,
            });
        }

        let parsed = parse_web_url(input).ok_or_else(|| ExtractError::InvalidUrl {
            service: service_label(kind),
            url: input.to_string(),
        })?;

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.kind() == kind && e.suitable(&parsed))
            .ok_or_else(|| ExtractError::Unsupported(input.to_string()))?;

        debug!("Extracting {} with {}", input, extractor.name());
        let stream = extractor.extract(&parsed, options).await?;
        info!("{} resolved via {} ({:?})", extractor.name(), stream.via, stream.protocol);

        Ok(Resolution {
            original_url: input.to_string(),
            stream_url: stream.url,
            kind,
            protocol: stream.protocol,
        })
    }
}

fn service_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Youtube => "YouTube",
        SourceKind::Rutube => "Rutube",
        SourceKind::Direct => "direct video",
        SourceKind::M3u8 => "M3U8",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedExtractor;

    #[async_trait]
    impl Extractor for FixedExtractor {
        fn name(&self) -> &'static str {
            "Fixed"
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Rutube
        }

        fn suitable(&self, url: &Url) -> bool {
            url.host_str().is_some_and(|h| h.ends_with("rutube.ru"))
        }

        async fn extract(&self, _url: &Url, _options: &ExtractOptions) -> Result<StreamInfo, ExtractError> {
            Ok(StreamInfo::new("https://cdn.example.com/master.m3u8", "fixed"))
        }
    }

    #[tokio::test]
    async fn test_passthrough_kinds() {
        let resolver = Resolver::new();
        let res = resolver
            .resolve(" https://cdn.example.com/loop.mp4 ", &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(res.kind, SourceKind::Direct);
        assert_eq!(res.stream_url, "https://cdn.example.com/loop.mp4");
        assert_eq!(res.protocol, StreamProtocol::Progressive);
    }

    #[tokio::test]
    async fn test_dispatch_to_extractor() {
        let mut resolver = Resolver::new();
        resolver.register_extractor(Box::new(FixedExtractor));
        let res = resolver
            .resolve("https://rutube.ru/video/abc/", &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(res.kind, SourceKind::Rutube);
        assert_eq!(res.original_url, "https://rutube.ru/video/abc/");
        assert_eq!(res.stream_url, "https://cdn.example.com/master.m3u8");
        assert_eq!(res.protocol, StreamProtocol::Hls);
    }

    #[tokio::test]
    async fn test_schemeless_input() {
        let mut resolver = Resolver::new();
        resolver.register_extractor(Box::new(FixedExtractor));
        let res = resolver
            .resolve("rutube.ru/video/abc/", &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(res.original_url, "rutube.ru/video/abc/");
        assert_eq!(res.stream_url, "https://cdn.example.com/master.m3u8");

        let res = resolver
            .resolve("cdn.example.com/live.m3u8", &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(res.kind, SourceKind::M3u8);
        assert_eq!(res.stream_url, "https://cdn.example.com/live.m3u8");
    }

    #[tokio::test]
    async fn test_missing_extractor_is_unsupported() {
        let resolver = Resolver::new();
        let err = resolver
            .resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ", &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }
}
