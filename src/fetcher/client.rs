use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::instrument;
use url::Url;

use crate::fetcher::{
    errors::FetchError,
    pipeline::process_document,
    types::{FetchRoute, FetchedDocument},
};

const MAX_BODY_SIZE: u64 = 5 * 1024 * 1024; // 5MB
const USER_AGENT: &str = "SatchelBot/0.1 (+https://satchel.example.com)";

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .default_headers({
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                    .parse()
                    .unwrap(),
            );
            headers
        })
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_client() -> &'static Client {
    &HTTP_CLIENT
}

/// Raw response pieces shared by the direct and relay paths.
pub(crate) struct RawResponse {
    pub final_url: Url,
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

/// One GET with the shared client, a per-attempt timeout, and the body cap.
/// Non-2xx statuses are errors here; the chain decides what happens next.
pub(crate) async fn request(url: &Url, timeout: Duration) -> Result<RawResponse, FetchError> {
    let response = HTTP_CLIENT
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(FetchError::from_reqwest_error)?;

    // Check content length before downloading
    if let Some(content_length) = response.content_length()
        && content_length > MAX_BODY_SIZE
    {
        return Err(FetchError::BodyTooLarge(content_length));
    }

    let final_url = response.url().clone();
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Http(status));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Io(e.to_string()))?;

    // Check body size after download (in case Content-Length was missing)
    if body.len() as u64 > MAX_BODY_SIZE {
        return Err(FetchError::BodyTooLarge(body.len() as u64));
    }

    Ok(RawResponse {
        final_url,
        status,
        content_type,
        body,
    })
}

/// Direct fetch of a document, no relay involved.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_direct(url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError> {
    let raw = request(url, timeout).await?;
    process_document(
        raw.final_url,
        raw.status,
        raw.content_type,
        raw.body,
        FetchRoute::Direct,
    )
}
