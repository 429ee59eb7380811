use crate::config::Config;
use std::time::Duration;

/// Shared HTTP client for the extractors: cookies on, bounded redirects,
/// the configured connect/read timeout.
pub fn build_http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    build_client_with_timeout(config.request_timeout())
}

pub fn build_client_with_timeout(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Undo the JSON-in-HTML escaping YouTube applies to embedded URLs.
pub fn unescape_js_string(s: &str) -> String {
    s.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("\\\"", "\"")
}

/// Sanity check that a response body is a page and not an error stub.
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(1024).collect::<String>().to_ascii_lowercase();
    head.contains("<html") || head.contains("<!doctype html")
}
