//! Bounded HTTP transport.
//!
//! Wraps a `reqwest` client with library-level redirect following disabled
//! and drives redirects manually through [`crate::redirect::evaluate`], so
//! the policy decisions stay testable in isolation. Response bodies are read
//! chunk by chunk against the configured ceiling instead of trusting
//! `Content-Length`.

use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::Method;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::redirect::{self, RedirectDecision};

/// Hard ceiling on redirect hops per request.
const MAX_REDIRECTS: usize = 10;

/// Placeholder body used when an error response's payload cannot be read.
const UNREADABLE_ERROR_BODY: &[u8] = b"failed to read error response";

/// Undecoded response as it came off the wire.
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

pub(crate) struct BoundedTransport {
    http: reqwest::Client,
    max_response_bytes: usize,
    follow_redirects: bool,
}

impl BoundedTransport {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| Error::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            max_response_bytes: config.max_response_bytes,
            follow_redirects: config.follow_redirects,
        })
    }

    /// Sends the request, following policy-approved redirects, and reads the
    /// final response body under the size ceiling.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse> {
        let has_authorization = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);
        let has_body = body.is_some();

        let mut method = method;
        let mut url = url;
        let mut hops = 0usize;

        loop {
            tracing::debug!(
                target: "patch_client::http",
                method = %method,
                url = %url,
                "dispatching request"
            );
            let mut request = self.http.request(method.clone(), url.clone());
            request = request.headers(headers.clone());
            if let Some(payload) = &body {
                request = request.body(payload.clone());
            }
            let response = request
                .send()
                .await
                .map_err(|err| transport_error(&method, &url, &err))?;

            let status = response.status().as_u16();
            if (300..400).contains(&status) && self.follow_redirects {
                if let Some(location) = response.headers().get(LOCATION) {
                    let target = location
                        .to_str()
                        .ok()
                        .and_then(|raw| url.join(raw).ok());
                    if let Some(next_url) = target {
                        match redirect::evaluate(
                            &method,
                            has_authorization,
                            has_body,
                            &url,
                            &next_url,
                            status,
                        ) {
                            RedirectDecision::Follow {
                                method: next_method,
                            } => {
                                hops += 1;
                                if hops > MAX_REDIRECTS {
                                    return Err(Error::Transport {
                                        method: method.to_string(),
                                        url: url.to_string(),
                                        reason: format!("stopped after {MAX_REDIRECTS} redirects"),
                                    });
                                }
                                tracing::debug!(
                                    target: "patch_client::http",
                                    status,
                                    next = %next_url,
                                    hop = hops,
                                    "following redirect"
                                );
                                // Only credential-free, bodyless requests get
                                // here, so the method switch never strands a
                                // payload.
                                method = next_method;
                                url = next_url;
                                continue;
                            }
                            RedirectDecision::Refuse(reason) => {
                                tracing::warn!(
                                    target: "patch_client::http",
                                    status,
                                    url = %url,
                                    reason,
                                    "redirect refused, surfacing response"
                                );
                            }
                        }
                    }
                }
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_string();
            let payload = self.read_bounded(response, &method, &url, status).await?;
            tracing::debug!(
                target: "patch_client::http",
                method = %method,
                url = %url,
                status,
                bytes = payload.len(),
                "response received"
            );
            return Ok(RawResponse {
                status,
                content_type,
                body: payload,
            });
        }
    }

    /// Reads the body chunk by chunk, failing the moment the running total
    /// would pass the ceiling. A body that fails to stream on an error status
    /// degrades to a placeholder so the status itself still reaches the
    /// caller; on a success status the same failure is a transport error.
    async fn read_bounded(
        &self,
        mut response: reqwest::Response,
        method: &Method,
        url: &Url,
        status: u16,
    ) -> Result<Vec<u8>> {
        let limit = self.max_response_bytes;
        let mut body: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > limit {
                        tracing::warn!(
                            target: "patch_client::http",
                            url = %url,
                            limit,
                            "response exceeded size ceiling"
                        );
                        return Err(Error::ResponseTooLarge { limit });
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => return Ok(body),
                Err(err) => {
                    if !(200..300).contains(&status) {
                        return Ok(UNREADABLE_ERROR_BODY.to_vec());
                    }
                    return Err(transport_error(method, url, &err));
                }
            }
        }
    }
}

fn transport_error(method: &Method, url: &Url, err: &reqwest::Error) -> Error {
    Error::Transport {
        method: method.to_string(),
        url: url.to_string(),
        reason: err.to_string(),
    }
}
