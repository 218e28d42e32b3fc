use std::sync::LazyLock;

use bytes::Bytes;
use chrono::Utc;
use encoding_rs::Encoding;
use regex::Regex;
use reqwest::StatusCode;
use url::Url;

use crate::fetcher::{
    errors::FetchError,
    types::{Charset, FetchRoute, FetchedDocument},
};

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

static META_HTTP_EQUIV_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?http-equiv\s*=\s*["']?content-type["']?[^>]*?content\s*=\s*["']?[^"'>]*?charset\s*=\s*([^"'\s;/>]+)"#).unwrap()
});

/// Turn a raw response into a `FetchedDocument`. Textual payloads are
/// decoded to UTF-8 through charset detection; binary payloads (PDFs and
/// friends) keep their bytes and carry an empty text body.
pub fn process_document(
    url_final: Url,
    status: StatusCode,
    content_type: String,
    body_bytes: Bytes,
    via: FetchRoute,
) -> Result<FetchedDocument, FetchError> {
    if !is_textual(&content_type) {
        return Ok(FetchedDocument {
            url_final,
            status,
            content_type,
            body_raw: body_bytes,
            body_utf8: String::new(),
            charset: None,
            via,
            fetched_at: Utc::now(),
        });
    }

    let charset = detect_charset(&content_type, &body_bytes);
    let body_utf8 = decode_to_utf8(&body_bytes, &charset)?;

    Ok(FetchedDocument {
        url_final,
        status,
        content_type,
        body_raw: body_bytes,
        body_utf8,
        charset: Some(charset),
        via,
        fetched_at: Utc::now(),
    })
}

/// Build a document from relay-envelope contents. The envelope already
/// delivers decoded text, so no charset work remains.
pub fn envelope_document(url_final: Url, contents: String, via: FetchRoute) -> FetchedDocument {
    let body_raw = Bytes::copy_from_slice(contents.as_bytes());
    FetchedDocument {
        url_final,
        status: StatusCode::OK,
        content_type: "text/html".to_string(),
        body_raw,
        body_utf8: contents,
        charset: Some(Charset::Utf8),
        via,
        fetched_at: Utc::now(),
    }
}

fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.is_empty()
        || ct.starts_with("text/")
        || ct.contains("html")
        || ct.contains("xml")
        || ct.contains("json")
        || ct.contains("javascript")
        || ct.contains("csv")
}

fn detect_charset(content_type: &str, body_bytes: &[u8]) -> Charset {
    // 1. Content-Type header charset
    if let Some(captures) = CHARSET_REGEX.captures(content_type)
        && let Some(charset_str) = captures.get(1)
        && let Some(encoding) = Encoding::for_label(charset_str.as_str().to_lowercase().as_bytes())
    {
        return Charset::from_encoding(encoding);
    }

    // 2. <meta charset> declarations in the first 4KB
    let search_bytes = &body_bytes[..body_bytes.len().min(4096)];
    let search_str = String::from_utf8_lossy(search_bytes);

    if let Some(captures) = META_CHARSET_REGEX.captures(&search_str)
        && let Some(charset_str) = captures.get(1)
        && let Some(encoding) = Encoding::for_label(charset_str.as_str().to_lowercase().as_bytes())
    {
        return Charset::from_encoding(encoding);
    }

    if let Some(captures) = META_HTTP_EQUIV_REGEX.captures(&search_str)
        && let Some(charset_str) = captures.get(1)
        && let Some(encoding) = Encoding::for_label(charset_str.as_str().to_lowercase().as_bytes())
    {
        return Charset::from_encoding(encoding);
    }

    // 3. Heuristic detection
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(search_bytes, false);
    Charset::from_encoding(detector.guess(None, true))
}

fn decode_to_utf8(body_bytes: &[u8], charset: &Charset) -> Result<String, FetchError> {
    let encoding = match charset {
        Charset::Utf8 => encoding_rs::UTF_8,
        Charset::Latin1 | Charset::Iso88591 => encoding_rs::WINDOWS_1252,
        Charset::Windows1252 => encoding_rs::WINDOWS_1252,
        Charset::ShiftJis => encoding_rs::SHIFT_JIS,
        Charset::Gb2312 => encoding_rs::GBK,
        Charset::Big5 => encoding_rs::BIG5,
        Charset::Other(name) => Encoding::for_label(name.as_bytes()).unwrap_or(encoding_rs::UTF_8),
    };

    let (decoded, _encoding, had_errors) = encoding.decode(body_bytes);

    if had_errors {
        return Err(FetchError::Charset(format!(
            "failed to decode content with encoding {}",
            encoding.name()
        )));
    }

    Ok(decoded.into_owned())
}
