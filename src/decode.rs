//! Response body decoding.

use serde_json::Value;

/// Decoded response payload.
///
/// The API mostly speaks JSON but blueprint and file endpoints return plain
/// text or raw bytes, so the decoded value keeps all three shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Maps raw body bytes plus the `Content-Type` header to a decoded value.
///
/// Empty payloads decode to `None`. A `json` content type (matched case
/// insensitively) is decoded as UTF-8 with replacement and parsed; servers
/// are allowed to put plain text under a JSON content type, so a parse
/// failure falls back to the decoded text instead of erroring. Textual
/// content types decode to text, anything else passes through as bytes.
pub fn decode(payload: &[u8], content_type: &str) -> Option<ResponseBody> {
    if payload.is_empty() {
        return None;
    }
    let normalized = content_type.to_ascii_lowercase();
    if normalized.contains("json") {
        let text = String::from_utf8_lossy(payload).into_owned();
        return Some(match serde_json::from_str::<Value>(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        });
    }
    if normalized.starts_with("text/") || normalized.contains("xml") || normalized.contains("html")
    {
        return Some(ResponseBody::Text(
            String::from_utf8_lossy(payload).into_owned(),
        ));
    }
    Some(ResponseBody::Bytes(payload.to_vec()))
}
