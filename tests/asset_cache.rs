use std::time::Duration;

use satchel::cache::{AssetCache, AssetRequest};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache(dir: &tempfile::TempDir) -> AssetCache {
    AssetCache::new(dir.path()).with_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn documents_hit_the_network_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes("# Notes".as_bytes())
                .insert_header("Content-Type", "text/markdown"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = cache(&dir);
    let request = AssetRequest::new(format!("{}/notes.md", server.uri()));

    let first = cache.handle(&request).await;
    assert!(!first.from_cache);
    assert_eq!(first.body, "# Notes");
    assert_eq!(first.content_type, "text/markdown");

    let second = cache.handle(&request).await;
    assert!(second.from_cache);
    assert_eq!(second.body, "# Notes");

    server.verify().await;
}

#[tokio::test]
async fn error_responses_pass_through_without_caching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = cache(&dir);
    let request = AssetRequest::new(format!("{}/gone.html", server.uri()));

    for _ in 0..2 {
        let response = cache.handle(&request).await;
        assert!(!response.from_cache);
        assert_eq!(response.status.as_u16(), 404);
    }

    server.verify().await;
}

#[tokio::test]
async fn non_document_requests_are_never_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x89, 0x50, 0x4E, 0x47])
                .insert_header("Content-Type", "image/png"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = cache(&dir);
    let request = AssetRequest::new(format!("{}/logo.png", server.uri()));

    for _ in 0..2 {
        let response = cache.handle(&request).await;
        assert!(!response.from_cache);
        assert_eq!(response.status.as_u16(), 200);
    }

    server.verify().await;
}

#[tokio::test]
async fn accept_header_routes_extensionless_urls_to_the_document_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reader/article-42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes("<html><body>readable</body></html>".as_bytes())
                .insert_header("Content-Type", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = cache(&dir);
    let request = AssetRequest::new(format!("{}/reader/article-42", server.uri()))
        .with_accept("text/html,application/xhtml+xml");

    let first = cache.handle(&request).await;
    assert!(!first.from_cache);
    let second = cache.handle(&request).await;
    assert!(second.from_cache);

    server.verify().await;
}
