use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::fetcher::{self, DEFAULT_ATTEMPT_TIMEOUT, FetchError};

/// Precached application shell generation.
pub const STATIC_GENERATION: &str = "satchel-static-v1";
/// Saved-document byte cache generation.
pub const DOCUMENT_GENERATION: &str = "satchel-documents-v1";

static DOCUMENT_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(pdf|txt|md|html|htm|json|xml|csv)(\?|$)").unwrap());

/// An intercepted request, reduced to what the routing decision needs.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub url: String,
    pub accept: Option<String>,
    pub is_navigation: bool,
}

impl AssetRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: None,
            is_navigation: false,
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn navigation(mut self) -> Self {
        self.is_navigation = true;
        self
    }
}

/// What the interception layer hands back. Always a response; failures
/// surface as a synthetic status, never as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
    pub from_cache: bool,
}

/// Shell file registered at install time.
#[derive(Debug, Clone)]
pub struct ShellAsset {
    pub url: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    url: String,
    status: u16,
    content_type: String,
    cached_at: DateTime<Utc>,
}

/// Byte cache for offline reading, laid out as
/// `<root>/<generation>/<md5(url)>.{json,bin}` sidecar pairs. Documents are
/// served cache-first and populated from successful network responses; the
/// static generation only ever changes at install time. Rotating the
/// generation names is the sole eviction mechanism.
pub struct AssetCache {
    root: PathBuf,
    attempt_timeout: Duration,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Precache the application shell.
    pub fn install(&self, assets: &[ShellAsset]) -> Result<()> {
        for asset in assets {
            self.write_entry(
                STATIC_GENERATION,
                &asset.url,
                StatusCode::OK,
                &asset.content_type,
                &asset.body,
            )?;
        }
        Ok(())
    }

    /// Drop every generation directory other than the two current names.
    pub fn activate(&self) -> Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name != STATIC_GENERATION && name != DOCUMENT_GENERATION {
                info!(generation = %name, "dropping stale cache generation");
                fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }

    /// Route one request. Never fails: network trouble degrades to the
    /// cached shell root for navigations and a synthetic 408 otherwise.
    pub async fn handle(&self, req: &AssetRequest) -> CachedResponse {
        let Ok(url) = Url::parse(&req.url) else {
            return self.offline_fallback(req);
        };

        // Anything that is not http(s) passes through uncached
        if url.scheme() != "http" && url.scheme() != "https" {
            return match self.network_fetch(&url).await {
                Ok((status, content_type, body)) => CachedResponse {
                    status,
                    content_type,
                    body,
                    from_cache: false,
                },
                Err(_) => self.offline_fallback(req),
            };
        }

        if is_document_request(&url, req.accept.as_deref()) {
            return self.handle_document(&url, req).await;
        }

        // Static flow: shell hit or plain network, never populated here
        if let Some(hit) = self.lookup(STATIC_GENERATION, url.as_str()) {
            return hit;
        }
        match self.network_fetch(&url).await {
            Ok((status, content_type, body)) => CachedResponse {
                status,
                content_type,
                body,
                from_cache: false,
            },
            Err(err) => {
                warn!(url = %url, error = %err, "static fetch failed");
                self.offline_fallback(req)
            }
        }
    }

    /// Cache-first document flow with network populate on miss.
    async fn handle_document(&self, url: &Url, req: &AssetRequest) -> CachedResponse {
        if let Some(hit) = self.lookup(DOCUMENT_GENERATION, url.as_str()) {
            return hit;
        }

        match self.network_fetch(url).await {
            Ok((status, content_type, body)) => {
                // Only successful responses populate the cache; error pages
                // must not shadow the document forever
                if status.is_success() {
                    self.store(DOCUMENT_GENERATION, url.as_str(), status, &content_type, &body);
                }
                CachedResponse {
                    status,
                    content_type,
                    body,
                    from_cache: false,
                }
            }
            Err(err) => {
                warn!(url = %url, error = %err, "document fetch failed");
                self.offline_fallback(req)
            }
        }
    }

    /// Warm the document cache with bytes already in hand, so a save does
    /// not trigger a second download. Non-2xx statuses are ignored.
    pub fn put_document(&self, url: &Url, status: StatusCode, content_type: &str, body: &Bytes) {
        if !status.is_success() {
            return;
        }
        self.store(DOCUMENT_GENERATION, url.as_str(), status, content_type, body);
    }

    fn offline_fallback(&self, req: &AssetRequest) -> CachedResponse {
        if req.is_navigation
            && let Some(shell) = self.lookup_shell_root()
        {
            return shell;
        }
        CachedResponse {
            status: StatusCode::REQUEST_TIMEOUT,
            content_type: "text/plain".to_string(),
            body: Bytes::new(),
            from_cache: false,
        }
    }

    /// The precached root document, if the shell was installed.
    fn lookup_shell_root(&self) -> Option<CachedResponse> {
        let dir = self.root.join(STATIC_GENERATION);
        for entry in fs::read_dir(dir).ok()?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Ok(meta) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(meta) = serde_json::from_str::<CacheMeta>(&meta) else {
                continue;
            };
            if let Ok(url) = Url::parse(&meta.url)
                && (url.path() == "/index.html" || url.path() == "/")
            {
                return self.lookup(STATIC_GENERATION, &meta.url);
            }
        }
        None
    }

    async fn network_fetch(&self, url: &Url) -> Result<(StatusCode, String, Bytes), FetchError> {
        // Browser-fetch semantics: HTTP error statuses resolve, only
        // transport failures reject
        let response = fetcher::get_client()
            .get(url.clone())
            .timeout(self.attempt_timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::Io(err.to_string()))?;

        Ok((status, content_type, body))
    }

    fn lookup(&self, generation: &str, url: &str) -> Option<CachedResponse> {
        let (meta_path, body_path) = self.entry_paths(generation, url);
        let meta: CacheMeta = serde_json::from_str(&fs::read_to_string(meta_path).ok()?).ok()?;
        let body = fs::read(body_path).ok()?;
        Some(CachedResponse {
            status: StatusCode::from_u16(meta.status).ok()?,
            content_type: meta.content_type,
            body: Bytes::from(body),
            from_cache: true,
        })
    }

    fn store(&self, generation: &str, url: &str, status: StatusCode, content_type: &str, body: &Bytes) {
        if let Err(err) = self.write_entry(generation, url, status, content_type, body) {
            warn!(url, error = %err, "cache write failed");
        }
    }

    fn write_entry(
        &self,
        generation: &str,
        url: &str,
        status: StatusCode,
        content_type: &str,
        body: &Bytes,
    ) -> Result<()> {
        let (meta_path, body_path) = self.entry_paths(generation, url);
        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Body first, meta last: a torn write leaves no meta and reads as a
        // miss
        fs::write(&body_path, body)?;
        let meta = CacheMeta {
            url: url.to_string(),
            status: status.as_u16(),
            content_type: content_type.to_string(),
            cached_at: Utc::now(),
        };
        fs::write(&meta_path, serde_json::to_string(&meta)?)?;
        Ok(())
    }

    fn entry_paths(&self, generation: &str, url: &str) -> (PathBuf, PathBuf) {
        let digest = format!("{:x}", md5::compute(url.as_bytes()));
        let dir = self.root.join(generation);
        (
            dir.join(format!("{digest}.json")),
            dir.join(format!("{digest}.bin")),
        )
    }
}

/// Interception criteria: a savable-document path extension or an Accept
/// header asking for document-ish content.
pub fn is_document_request(url: &Url, accept: Option<&str>) -> bool {
    if DOCUMENT_PATH_REGEX.is_match(url.path()) {
        return true;
    }
    match accept {
        Some(accept) => accept.contains("application/pdf") || accept.contains("text/"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn cache(dir: &Path) -> AssetCache {
        AssetCache::new(dir).with_timeout(Duration::from_millis(300))
    }

    fn parse(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn document_criteria_cover_extensions_and_accept() {
        for url in [
            "https://example.com/paper.pdf",
            "https://example.com/notes.TXT",
            "https://example.com/data.json?v=2",
            "https://example.com/page.htm",
        ] {
            assert!(is_document_request(&parse(url), None), "{url}");
        }

        assert!(!is_document_request(&parse("https://example.com/app.wasm"), None));
        assert!(!is_document_request(&parse("https://example.com/logo.png"), None));

        assert!(is_document_request(
            &parse("https://example.com/view"),
            Some("application/pdf")
        ));
        assert!(is_document_request(
            &parse("https://example.com/view"),
            Some("text/html,application/xhtml+xml")
        ));
        assert!(!is_document_request(
            &parse("https://example.com/view"),
            Some("image/avif,image/webp")
        ));
    }

    #[tokio::test]
    async fn cached_document_is_served_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        // Port 9 is discard; nothing listens there in tests. A network
        // attempt would fail, so a success here proves the hit path.
        let url = parse("http://127.0.0.1:9/saved.html");
        cache.put_document(&url, StatusCode::OK, "text/html", &Bytes::from_static(b"<p>hi</p>"));

        let response = cache.handle(&AssetRequest::new(url.as_str())).await;
        assert!(response.from_cache);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from_static(b"<p>hi</p>"));
        assert_eq!(response.content_type, "text/html");
    }

    #[tokio::test]
    async fn put_document_ignores_error_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let url = parse("http://127.0.0.1:9/missing.html");

        cache.put_document(&url, StatusCode::NOT_FOUND, "text/html", &Bytes::from_static(b"nope"));

        // Nothing cached, network unreachable: synthetic timeout
        let response = cache.handle(&AssetRequest::new(url.as_str())).await;
        assert!(!response.from_cache);
        assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn navigation_failure_falls_back_to_the_shell_root() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        cache
            .install(&[ShellAsset {
                url: "http://127.0.0.1:9/index.html".to_string(),
                content_type: "text/html".to_string(),
                body: Bytes::from_static(b"<html>shell</html>"),
            }])
            .unwrap();

        let request = AssetRequest::new("http://127.0.0.1:9/reader/42")
            .with_accept("text/html")
            .navigation();
        let response = cache.handle(&request).await;

        assert!(response.from_cache);
        assert_eq!(response.body, Bytes::from_static(b"<html>shell</html>"));
    }

    #[tokio::test]
    async fn non_navigation_failure_yields_synthetic_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let request = AssetRequest::new("http://127.0.0.1:9/data.json");
        let response = cache.handle(&request).await;
        assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
        assert!(!response.from_cache);
    }

    #[test]
    fn activate_drops_only_unknown_generations() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let url = parse("https://example.com/doc.html");
        cache.put_document(&url, StatusCode::OK, "text/html", &Bytes::from_static(b"x"));
        fs::create_dir_all(dir.path().join("satchel-documents-v0")).unwrap();
        fs::create_dir_all(dir.path().join("some-other-app")).unwrap();

        cache.activate().unwrap();

        assert!(dir.path().join(DOCUMENT_GENERATION).exists());
        assert!(!dir.path().join("satchel-documents-v0").exists());
        assert!(!dir.path().join("some-other-app").exists());

        // Entries in the surviving generation are untouched
        assert!(cache.lookup(DOCUMENT_GENERATION, url.as_str()).is_some());
    }

    #[test]
    fn distinct_urls_never_collide_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let a = parse("https://example.com/a.html");
        let b = parse("https://example.com/b.html");
        cache.put_document(&a, StatusCode::OK, "text/html", &Bytes::from_static(b"A"));
        cache.put_document(&b, StatusCode::OK, "text/html", &Bytes::from_static(b"B"));

        assert_eq!(cache.lookup(DOCUMENT_GENERATION, a.as_str()).unwrap().body, "A");
        assert_eq!(cache.lookup(DOCUMENT_GENERATION, b.as_str()).unwrap().body, "B");
    }
}
