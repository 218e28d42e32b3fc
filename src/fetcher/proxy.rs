use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use url::Url;

use crate::fetcher::errors::FetchError;

/// Placeholder in a relay template that receives the encoded target URL.
pub const TARGET_PLACEHOLDER: &str = "{url}";

// encodeURIComponent-style escaping for the substituted target
const TARGET_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// How a relay returns the target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// Body is passed through untouched.
    Raw,
    /// Body is a JSON object whose `contents` field holds the document.
    JsonEnvelope,
}

/// One relay in the fallback chain.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub name: String,
    pub template: String,
    pub kind: ProxyKind,
}

impl ProxyEndpoint {
    pub fn new(name: impl Into<String>, template: impl Into<String>, kind: ProxyKind) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            kind,
        }
    }

    /// Substitute the percent-encoded target into the template and parse the
    /// result.
    pub fn build(&self, target: &Url) -> Result<Url, FetchError> {
        let encoded = utf8_percent_encode(target.as_str(), TARGET_ENCODE_SET).to_string();
        let request = self.template.replace(TARGET_PLACEHOLDER, &encoded);
        Ok(Url::parse(&request)?)
    }

    /// Recover the document text from a relay response body.
    pub fn unwrap_body(&self, body: String) -> Result<String, FetchError> {
        match self.kind {
            ProxyKind::Raw => Ok(body),
            ProxyKind::JsonEnvelope => {
                let value: Value = serde_json::from_str(&body)
                    .map_err(|err| FetchError::Envelope(err.to_string()))?;
                value
                    .get("contents")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| FetchError::Envelope("missing contents field".to_string()))
            }
        }
    }
}

/// Production relay chain, tried in order after a failed direct fetch.
pub fn default_chain() -> Vec<ProxyEndpoint> {
    vec![
        ProxyEndpoint::new(
            "allorigins-raw",
            "https://api.allorigins.win/raw?url={url}",
            ProxyKind::Raw,
        ),
        ProxyEndpoint::new(
            "allorigins-get",
            "https://api.allorigins.win/get?url={url}",
            ProxyKind::JsonEnvelope,
        ),
        ProxyEndpoint::new("corsproxy-io", "https://corsproxy.io/?{url}", ProxyKind::Raw),
    ]
}
