use super::fetcher::{read_limited_bytes, FetchError};
use super::link::{resolve_url, site_root};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

/// Home pages larger than this are not scanned for icon links.
const MAX_PAGE_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Resolves and caches one icon URL per site.
///
/// Cache entries live for the lifetime of the resolver and are never
/// retried, including fallbacks: a site that was down on first lookup keeps
/// its `/favicon.ico` guess. The cache lock is never held across a request.
pub struct FaviconResolver {
    client: reqwest::Client,
    timeout: Duration,
    cache: Mutex<HashMap<String, String>>,
}

impl FaviconResolver {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the icon URL for the site hosting `site_url`.
    ///
    /// On a cache miss the site root is fetched (bounded by the resolver
    /// timeout) and scanned for `<link rel="...icon...">`; a relative href is
    /// resolved against the root. Any failure falls back to
    /// `{scheme}://{host}/favicon.ico`. Never fails: a URL without a host
    /// yields an empty string.
    pub async fn resolve(&self, site_url: &str) -> String {
        let Some(root) = site_root(site_url) else {
            return String::new();
        };
        if let Some(icon) = self.cached_root(&root) {
            return icon;
        }

        let icon = match self.discover(&root).await {
            Ok(Some(icon)) => icon,
            Ok(None) => {
                tracing::debug!(site = %root, "No icon link on home page, using /favicon.ico");
                default_icon(&root)
            }
            Err(e) => {
                tracing::debug!(site = %root, error = %e, "Favicon lookup failed, using /favicon.ico");
                default_icon(&root)
            }
        };

        // First writer wins if two lookups for the same site raced
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.entry(root).or_insert(icon).clone()
    }

    /// Cached icon for the site hosting `site_url`, without any network access.
    pub fn cached(&self, site_url: &str) -> Option<String> {
        site_root(site_url).and_then(|root| self.cached_root(&root))
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached_root(&self, root: &str) -> Option<String> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(root).cloned()
    }

    async fn discover(&self, root: &str) -> Result<Option<String>, FetchError> {
        let fetch = async {
            let response = self
                .client
                .get(root)
                .send()
                .await
                .map_err(FetchError::Network)?;
            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status()));
            }
            read_limited_bytes(response, MAX_PAGE_SIZE).await
        };
        let bytes = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| FetchError::Timeout)??;

        let html = String::from_utf8_lossy(&bytes);
        let base = format!("{}/", root);
        Ok(find_icon_href(&html).map(|href| resolve_url(&href, &base)))
    }
}

/// `{scheme}://{host}/favicon.ico` for the site hosting `site_url`.
///
/// Pure; used where a network lookup is not allowed.
pub fn fallback_icon(site_url: &str) -> Option<String> {
    site_root(site_url).map(|root| default_icon(&root))
}

fn default_icon(root: &str) -> String {
    format!("{}/favicon.ico", root)
}

/// First `<link>` whose `rel` mentions `icon`, in document order.
///
/// Pattern based: attributes may appear in any order and use single,
/// double or no quotes.
fn find_icon_href(html: &str) -> Option<String> {
    static LINK_TAG: OnceLock<Regex> = OnceLock::new();
    static ATTR: OnceLock<Regex> = OnceLock::new();
    let link_tag = LINK_TAG.get_or_init(|| Regex::new(r"(?i)<link\b[^>]*>").expect("link tag regex"));
    let attr = ATTR.get_or_init(|| {
        Regex::new(r#"(?i)\b(rel|href)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("attribute regex")
    });

    link_tag.find_iter(html).find_map(|tag| {
        let mut rel = None;
        let mut href = None;
        for cap in attr.captures_iter(tag.as_str()) {
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map(|m| m.as_str().trim());
            match cap[1].to_ascii_lowercase().as_str() {
                "rel" if rel.is_none() => rel = value,
                "href" if href.is_none() => href = value,
                _ => {}
            }
        }
        let is_icon = rel.is_some_and(|r| r.to_ascii_lowercase().contains("icon"));
        href.filter(|h| is_icon && !h.is_empty()).map(str::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(timeout: Duration) -> FaviconResolver {
        FaviconResolver::new(reqwest::Client::new(), timeout)
    }

    #[test]
    fn test_find_icon_rel_before_href() {
        let html = r#"<head><link rel="stylesheet" href="/s.css"><link rel="shortcut icon" href="/static/fav.png"></head>"#;
        assert_eq!(find_icon_href(html).as_deref(), Some("/static/fav.png"));
    }

    #[test]
    fn test_find_icon_href_before_rel_single_quotes() {
        let html = "<LINK HREF='https://cdn.example/i.ico' REL='icon'>";
        assert_eq!(
            find_icon_href(html).as_deref(),
            Some("https://cdn.example/i.ico")
        );
    }

    #[test]
    fn test_find_icon_unquoted_and_apple_touch() {
        let html = r#"<link rel=apple-touch-icon href=/touch.png>"#;
        assert_eq!(find_icon_href(html).as_deref(), Some("/touch.png"));
    }

    #[test]
    fn test_find_icon_none() {
        assert_eq!(find_icon_href("<html><link rel=\"alternate\" href=\"/rss\"></html>"), None);
        assert_eq!(find_icon_href(""), None);
    }

    #[test]
    fn test_fallback_icon() {
        assert_eq!(
            fallback_icon("https://news.example.com/world/rss").as_deref(),
            Some("https://news.example.com/favicon.ico")
        );
        assert_eq!(fallback_icon("relative/path"), None);
    }

    #[tokio::test]
    async fn test_resolve_discovers_relative_icon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<html><head><link rel="icon" href="img/icon.png"></head></html>"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(Duration::from_secs(3));
        let site = format!("{}/blog/post", server.uri());
        let icon = resolver.resolve(&site).await;
        assert_eq!(icon, format!("{}/img/icon.png", server.uri()));

        // Second lookup for the same host is served from cache
        assert_eq!(resolver.resolve(&server.uri()).await, icon);
        assert_eq!(resolver.cached(&site), Some(icon));
        assert_eq!(resolver.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(Duration::from_secs(3));
        let expected = format!("{}/favicon.ico", server.uri());
        assert_eq!(resolver.resolve(&server.uri()).await, expected);
        // Fallbacks are cached too, so no second request
        assert_eq!(resolver.resolve(&server.uri()).await, expected);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<link rel="icon" href="/late.png">"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let resolver = resolver(Duration::from_millis(100));
        assert_eq!(
            resolver.resolve(&server.uri()).await,
            format!("{}/favicon.ico", server.uri())
        );
    }

    #[tokio::test]
    async fn test_resolve_without_host_is_empty() {
        let resolver = resolver(Duration::from_secs(1));
        assert_eq!(resolver.resolve("").await, "");
        assert_eq!(resolver.resolve("/just/a/path").await, "");
        assert!(resolver.is_empty());
    }
}
