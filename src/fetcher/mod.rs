pub mod client;
pub mod errors;
pub mod pipeline;
pub mod proxy;
pub mod types;

pub use client::get_client;
pub use errors::FetchError;
pub use proxy::{ProxyEndpoint, ProxyKind, default_chain};
pub use types::{Charset, FetchRoute, FetchedDocument};

use std::time::Duration;

use tracing::{instrument, warn};
use url::Url;

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalize user input into a fetchable URL: trim, default to `https://`
/// when no scheme was typed, and reject anything that is not http(s).
pub fn normalize_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

/// Document fetcher with relay fallback. The direct attempt runs first; on
/// any failure the relays are tried in chain order and the first success
/// wins. Both the chain and the per-attempt timeout are injectable.
#[derive(Debug, Clone)]
pub struct Fetcher {
    proxies: Vec<ProxyEndpoint>,
    attempt_timeout: Duration,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(default_chain(), DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl Fetcher {
    pub fn new(proxies: Vec<ProxyEndpoint>, attempt_timeout: Duration) -> Self {
        Self {
            proxies,
            attempt_timeout,
        }
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        match client::fetch_direct(url, self.attempt_timeout).await {
            Ok(doc) => return Ok(doc),
            Err(err) => {
                warn!(error = %err, "direct fetch failed, falling back to relay chain");
            }
        }

        for relay in &self.proxies {
            match self.fetch_via(relay, url).await {
                Ok(doc) => return Ok(doc),
                Err(err) => {
                    warn!(relay = %relay.name, error = %err, "relay fetch failed");
                }
            }
        }

        Err(FetchError::Unavailable)
    }

    async fn fetch_via(
        &self,
        relay: &ProxyEndpoint,
        target: &Url,
    ) -> Result<FetchedDocument, FetchError> {
        let request_url = relay.build(target)?;
        let raw = client::request(&request_url, self.attempt_timeout).await?;
        let via = FetchRoute::Proxy(relay.name.clone());

        match relay.kind {
            ProxyKind::Raw => {
                // The relay mirrors the original body; keep the target as the
                // document URL so link resolution stays correct.
                pipeline::process_document(
                    target.clone(),
                    raw.status,
                    raw.content_type,
                    raw.body,
                    via,
                )
            }
            ProxyKind::JsonEnvelope => {
                let body = String::from_utf8(raw.body.to_vec())
                    .map_err(|err| FetchError::Envelope(err.to_string()))?;
                let contents = relay.unwrap_body(body)?;
                Ok(pipeline::envelope_document(target.clone(), contents, via))
            }
        }
    }
}
