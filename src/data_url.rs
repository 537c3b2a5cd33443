//! Decoding Base64 payloads, which may arrive wrapped in a `data:` URL.

use std::sync::LazyLock;

use base64::{Engine as _, prelude::BASE64_STANDARD};
use regex::Regex;

use crate::prelude::*;

/// Regex for parsing a `data:` URL.
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(?P<mime_type>[^;,]+);base64,(?P<data>.*)$")
        .expect("failed to compile regex")
});

/// Parse a `data:` URL into a MIME type and Base64-encoded data.
pub fn parse_data_url(data_url: &str) -> Option<(&str, &str)> {
    let caps = DATA_URL_RE.captures(data_url)?;
    let mime_type = caps.name("mime_type")?.as_str();
    let data = caps.name("data")?.as_str();
    Some((mime_type, data))
}

/// Decode Base64 data, ignoring whitespace and any `data:` URL wrapper.
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    let data = match parse_data_url(payload) {
        Some((mime_type, data)) => {
            debug!(%mime_type, "Decoding data URL");
            data
        }
        None => payload,
    };
    let compact = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect::<String>();
    if compact.is_empty() {
        return Err(anyhow!("Base64 data is empty"));
    }
    BASE64_STANDARD
        .decode(compact.as_bytes())
        .context("invalid Base64 data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_base64_with_line_breaks() {
        let decoded = decode_base64_payload("aGVs\nbG8g\r\nd29y bGQ=\n").unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn decodes_data_urls() {
        assert_eq!(
            parse_data_url("data:application/pdf;base64,JVBERi0="),
            Some(("application/pdf", "JVBERi0="))
        );
        let decoded = decode_base64_payload("data:image/png;base64,aGk=").unwrap();
        assert_eq!(decoded, b"hi");
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_base64_payload("not base64!!").is_err());
        assert!(decode_base64_payload("   ").is_err());
        assert!(decode_base64_payload("data:image/png;base64,").is_err());
    }
}
