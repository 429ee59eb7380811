use thiserror::Error;

/// Failures while turning a page URL into a stream URL. The `Display` text
/// is what the user gets to see, so it is phrased for them.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Enter a valid YouTube, Rutube, M3U8, or direct video URL")]
    Unsupported(String),

    #[error("Could not extract video ID from {service} URL\n\nURL: {url}")]
    InvalidUrl { service: &'static str, url: String },

    #[error("{service} request failed\n\nStatus: {status}\nMessage: {reason}")]
    Http {
        service: &'static str,
        status: u16,
        reason: String,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("{0}")]
    NoStream(String),

    #[error("{service} extraction exception:\n\n{source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned malformed JSON: {source}")]
    Json {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ExtractError {
    pub fn request(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ExtractError::Request { service, source }
    }

    pub fn json(service: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| ExtractError::Json { service, source }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access preferences at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Preferences file is corrupt: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to encode preferences: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Invalid preferences blob: {0}")]
    Blob(#[from] serde_json::Error),
}
