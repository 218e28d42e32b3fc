use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    Utf8,
    Latin1,
    Windows1252,
    Iso88591,
    ShiftJis,
    Gb2312,
    Big5,
    Other(String),
}

impl Charset {
    pub fn from_encoding(encoding: &'static encoding_rs::Encoding) -> Self {
        use std::ptr;

        if ptr::eq(encoding, encoding_rs::UTF_8) {
            Self::Utf8
        } else if ptr::eq(encoding, encoding_rs::WINDOWS_1252) {
            Self::Windows1252
        } else if ptr::eq(encoding, encoding_rs::SHIFT_JIS) {
            Self::ShiftJis
        } else if ptr::eq(encoding, encoding_rs::GBK) || ptr::eq(encoding, encoding_rs::GB18030) {
            Self::Gb2312
        } else if ptr::eq(encoding, encoding_rs::BIG5) {
            Self::Big5
        } else {
            Self::Other(encoding.name().to_ascii_lowercase())
        }
    }
}

/// How a document was ultimately obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRoute {
    Direct,
    /// Fetched through the named relay in the fallback chain.
    Proxy(String),
}

impl std::fmt::Display for FetchRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Proxy(name) => write!(f, "proxy:{name}"),
        }
    }
}

/// A successfully fetched document. `url_final` is always the content URL,
/// never a relay URL, so downstream link resolution works either way.
/// `body_utf8` is empty for binary payloads; `charset` is `None` in that
/// case.
#[derive(Debug)]
pub struct FetchedDocument {
    pub url_final: Url,
    pub status: StatusCode,
    pub content_type: String,
    pub body_raw: Bytes,
    pub body_utf8: String,
    pub charset: Option<Charset>,
    pub via: FetchRoute,
    pub fetched_at: DateTime<Utc>,
}
