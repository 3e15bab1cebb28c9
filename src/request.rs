//! Request description and URL assembly.
//!
//! A [`PendingRequest`] captures everything the transport needs to issue one
//! call. URL assembly percent-encodes untrusted path segments, rejects
//! traversal attempts before anything reaches the network, and renders query
//! values in the API's expected shapes.

use reqwest::Method;
use std::collections::HashMap;
use url::Url;

use crate::error::{Error, Result};

/// One query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Scalar(String),
    /// Rendered as the literal `true` or `false`.
    Bool(bool),
    /// Rendered by repeating the key once per element.
    List(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

/// Ordered set of query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    entries: Vec<(String, QueryValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Pushes only when the value is present; `None` parameters are dropped
    /// rather than rendered empty.
    pub fn push_opt(&mut self, key: impl Into<String>, value: Option<impl Into<QueryValue>>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn append_to(&self, url: &mut Url) {
        if self.entries.is_empty() {
            return;
        }
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &self.entries {
            match value {
                QueryValue::Scalar(scalar) => {
                    pairs.append_pair(key, scalar);
                }
                QueryValue::Bool(flag) => {
                    pairs.append_pair(key, if *flag { "true" } else { "false" });
                }
                QueryValue::List(values) => {
                    for item in values {
                        pairs.append_pair(key, item);
                    }
                }
            }
        }
    }
}

/// Everything needed to issue one API call.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub query: Query,
    pub json_body: Option<serde_json::Value>,
    pub raw_body: Option<Vec<u8>>,
    pub headers: HashMap<String, String>,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            json_body: None,
            raw_body: None,
            headers: HashMap::new(),
        }
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json_body = Some(body);
        self
    }

    pub fn raw(mut self, body: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.headers
            .insert("Content-Type".to_string(), content_type.into());
        self.raw_body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Percent-encodes one path segment so it cannot escape its position in the
/// URL path. Everything outside the unreserved set is encoded, `/` included.
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Joins the base URL and a relative path, appending the query.
///
/// The path is refused outright when it smuggles an absolute URL (`://`
/// anywhere) or when any segment percent-decodes to `.` or `..` or to text
/// containing a slash or backslash, so `a%2F..%2Fb` cannot re-split into
/// extra segments server-side.
pub fn build_url(base: &Url, path: &str, query: &Query) -> Result<Url> {
    reject_traversal(path)?;
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined)?;
    query.append_to(&mut url);
    Ok(url)
}

fn reject_traversal(path: &str) -> Result<()> {
    if path.contains("://") {
        return Err(Error::Validation(format!(
            "path {path:?} must be relative to the base URL"
        )));
    }
    for segment in path.split('/') {
        if segment.is_empty() {
            continue;
        }
        let decoded_bytes = urlencoding::decode_binary(segment.as_bytes());
        let decoded = String::from_utf8_lossy(&decoded_bytes);
        if decoded == "." || decoded == ".." || decoded.contains('/') || decoded.contains('\\') {
            return Err(Error::Validation(format!(
                "path segment {segment:?} would escape its position in the URL"
            )));
        }
    }
    Ok(())
}
