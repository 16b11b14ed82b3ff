use super::error_log::ErrorLog;
use super::favicon::FaviconResolver;
use super::parser::{self, ParseError};
use crate::model::{CanonicalItem, FeedSource};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Some publishers reject non-browser clients outright.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const MAX_REDIRECTS: usize = 5;

/// Errors that can occur while downloading a feed.
///
/// All of them are transient from the refresh cycle's point of view: the
/// failure is recorded and the source is tried again next pass. Document
/// problems are not fetch errors; see [`ParseError`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, redirect policy, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Anything other than `200 OK`
    #[error("HTTP status {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Request plus body read exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Network limits for feed and favicon requests.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub favicon_timeout: Duration,
    pub max_feed_bytes: usize,
    pub error_log_capacity: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            favicon_timeout: FaviconResolver::DEFAULT_TIMEOUT,
            max_feed_bytes: 10 * 1024 * 1024, // 10MB
            error_log_capacity: ErrorLog::DEFAULT_CAPACITY,
        }
    }
}

/// Builds the shared HTTP client with browser-like default headers.
///
/// # Errors
///
/// Fails only if the TLS backend cannot be initialized.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));

    reqwest::Client::builder()
        .default_headers(headers)
        .redirect(redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("Too many redirects (max {})", MAX_REDIRECTS));
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Downloads feeds and turns them into canonical items.
///
/// One fetcher is shared by the whole process; the favicon cache and the
/// error log live as long as it does.
pub struct FeedFetcher {
    client: reqwest::Client,
    favicons: Arc<FaviconResolver>,
    errors: Arc<ErrorLog>,
    settings: FetchSettings,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client, settings: FetchSettings) -> Self {
        let favicons = Arc::new(FaviconResolver::new(
            client.clone(),
            settings.favicon_timeout,
        ));
        let errors = Arc::new(ErrorLog::new(settings.error_log_capacity));
        Self {
            client,
            favicons,
            errors,
            settings,
        }
    }

    pub fn favicons(&self) -> &Arc<FaviconResolver> {
        &self.favicons
    }

    pub fn errors(&self) -> &Arc<ErrorLog> {
        &self.errors
    }

    /// Fetches one source, never failing.
    ///
    /// Transport failures are recorded in the error log and yield no items.
    pub async fn fetch(&self, source: &FeedSource) -> Vec<CanonicalItem> {
        self.try_fetch(source).await.unwrap_or_default()
    }

    /// Fetches and parses one source.
    ///
    /// The response must be exactly `200 OK`; there are no retries, the next
    /// refresh pass is the retry. A body that is not a recognizable feed, or
    /// is malformed, is logged and yields `Ok` with no items.
    ///
    /// Items come back in document order with an absolute `channel_link`
    /// (a missing one falls back to the source URL's site root, a relative
    /// one is resolved against the source URL) and the site favicon stamped
    /// on each.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Connection, TLS or redirect errors
    /// - [`FetchError::Timeout`] - Exceeded the configured fetch timeout
    /// - [`FetchError::HttpStatus`] - Any status other than 200
    /// - [`FetchError::ResponseTooLarge`] - Body over the configured limit
    ///
    /// Every error is also appended to the error log.
    pub async fn try_fetch(&self, source: &FeedSource) -> Result<Vec<CanonicalItem>, FetchError> {
        let bytes = match self.download(&source.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.errors.record(&source.url, e.to_string());
                return Err(e);
            }
        };

        let feed = match parser::decode(&bytes, &source.category) {
            Ok(feed) => feed,
            Err(ParseError::UnknownFormat) => {
                tracing::warn!(url = %source.url, bytes = bytes.len(), "Unknown feed format");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!(url = %source.url, error = %e, "Malformed feed document");
                return Ok(Vec::new());
            }
        };

        tracing::debug!(
            url = %source.url,
            dialect = %feed.dialect,
            items = feed.items.len(),
            dropped = feed.dropped,
            "Feed parsed"
        );
        if feed.items.is_empty() {
            return Ok(Vec::new());
        }

        let feed = feed.with_source_url(&source.url);
        let favicon = self.favicons.resolve(&feed.channel_link).await;
        Ok(feed.with_favicon(&favicon).items)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(FetchError::Network)?;
            if response.status() != reqwest::StatusCode::OK {
                return Err(FetchError::HttpStatus(response.status()));
            }
            read_limited_bytes(response, self.settings.max_feed_bytes).await
        };

        tokio::time::timeout(self.settings.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

/// Reads a response body, failing once it grows past `limit` bytes.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss_for(site: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mock Site</title>
    <link>{site}/</link>
    <item><title>Kept</title><link>{site}/a</link><pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate></item>
    <item><title>Dropped</title><link>{site}/b</link><pubDate>whenever</pubDate></item>
</channel></rss>"#
        )
    }

    async fn mount_home(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<link rel="icon" href="/icon.png">"#),
            )
            .mount(server)
            .await;
    }

    fn fetcher(settings: FetchSettings) -> FeedFetcher {
        FeedFetcher::new(build_client().unwrap(), settings)
    }

    #[tokio::test]
    async fn test_fetch_success_stamps_category_and_favicon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_for(&server.uri()))
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .mount(&server)
            .await;
        mount_home(&server).await;

        let fetcher = fetcher(FetchSettings::default());
        let source = FeedSource::new(format!("{}/feed", server.uri()), "tech");
        let items = fetcher.try_fetch(&source).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
        assert_eq!(items[0].category, "tech");
        assert_eq!(items[0].channel_title, "Mock Site");
        assert_eq!(
            items[0].favicon.as_deref(),
            Some(format!("{}/icon.png", server.uri()).as_str())
        );
        assert!(fetcher.errors().is_empty());

        let requests = server.received_requests().await.unwrap();
        let feed_request = requests.iter().find(|r| r.url.path() == "/feed").unwrap();
        assert_eq!(
            feed_request.headers.get("user-agent").unwrap(),
            BROWSER_USER_AGENT
        );
    }

    #[tokio::test]
    async fn test_fetch_404_is_recorded_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchSettings::default());
        let url = format!("{}/feed", server.uri());
        let source = FeedSource::new(url.clone(), "tech");

        match fetcher.try_fetch(&source).await {
            Err(FetchError::HttpStatus(status)) => assert_eq!(status.as_u16(), 404),
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }

        let records = fetcher.errors().snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, url);
        assert!(records[0].error.contains("404 Not Found"));
    }

    #[tokio::test]
    async fn test_fetch_non_200_success_status_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(203).set_body_string(rss_for(&server.uri())))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchSettings::default());
        let source = FeedSource::new(server.uri(), "x");
        assert!(fetcher.fetch(&source).await.is_empty());
        assert_eq!(fetcher.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_malformed_document_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<rss><channel><item><title>cut"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchSettings::default());
        let source = FeedSource::new(format!("{}/feed", server.uri()), "x");
        assert!(fetcher.try_fetch(&source).await.unwrap().is_empty());
        assert!(fetcher.errors().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_unknown_format_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchSettings::default());
        let source = FeedSource::new(server.uri(), "x");
        assert!(fetcher.try_fetch(&source).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchSettings {
            max_feed_bytes: 1024,
            ..FetchSettings::default()
        });
        let source = FeedSource::new(server.uri(), "x");
        assert!(matches!(
            fetcher.try_fetch(&source).await,
            Err(FetchError::ResponseTooLarge)
        ));
        assert_eq!(fetcher.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_for(&server.uri()))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchSettings {
            timeout: Duration::from_millis(100),
            ..FetchSettings::default()
        });
        let source = FeedSource::new(server.uri(), "x");
        assert!(matches!(
            fetcher.try_fetch(&source).await,
            Err(FetchError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_missing_channel_link_uses_source_site_root() {
        let server = MockServer::start().await;
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>No links</title>
            <entry><title>e</title><updated>2006-01-02T15:04:05Z</updated></entry></feed>"#;
        Mock::given(method("GET"))
            .and(path("/atom.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        mount_home(&server).await;

        let fetcher = fetcher(FetchSettings::default());
        let source = FeedSource::new(format!("{}/atom.xml", server.uri()), "x");
        let items = fetcher.fetch(&source).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].channel_link, server.uri());
    }

    #[tokio::test]
    async fn test_relative_item_link_is_anchored_to_source_url() {
        let server = MockServer::start().await;
        let body = r#"<rss version="2.0"><channel><title>Relative</title>
            <item><title>p</title><link>/posts/1</link>
            <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate></item>
        </channel></rss>"#;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let fetcher = fetcher(FetchSettings::default());
        let source = FeedSource::new(format!("{}/feed", server.uri()), "x");
        let items = fetcher.fetch(&source).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].channel_link, format!("{}/posts/1", server.uri()));
        assert_eq!(items[0].item_link, format!("{}/posts/1", server.uri()));
        // No home page mounted, so discovery falls back to the conventional path
        assert_eq!(
            items[0].favicon.as_deref(),
            Some(format!("{}/favicon.ico", server.uri()).as_str())
        );
    }
}
