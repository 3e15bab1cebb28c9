//! Redirect policy engine.
//!
//! A pure decision procedure, independent of the HTTP stack: the transport
//! drives requests with library-level redirect following disabled and asks
//! this module once per 3xx response whether to follow it. Refused redirects
//! are terminal; the 3xx response is surfaced to the caller as an API error.

use reqwest::Method;
use url::Url;

/// Outcome of evaluating one redirect response.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectDecision {
    /// Follow the redirect, reissuing the request with the given method.
    Follow { method: Method },
    /// Treat the 3xx response as terminal; the reason is for logging only.
    Refuse(&'static str),
}

/// Decides whether a redirect may be followed.
///
/// Rules, in order, refusing if any trips:
/// 1. the target scheme is not `http` or `https`;
/// 2. the original request carried a non-empty `Authorization` header or a
///    request body (credentialed or mutating requests are never replayed
///    through a redirect, whatever the status code);
/// 3. the host or normalized port changes (no cross-origin following);
/// 4. the original scheme is `https` and the target is not (no downgrade,
///    independent of the client's insecure opt-in).
///
/// A surviving 301/302/303 on a non-GET/HEAD request downgrades to a
/// bodyless `GET`; 307/308 keep the method.
pub fn evaluate(
    method: &Method,
    has_authorization: bool,
    has_body: bool,
    original_url: &Url,
    next_url: &Url,
    status: u16,
) -> RedirectDecision {
    if !matches!(next_url.scheme(), "http" | "https") {
        return RedirectDecision::Refuse("redirect target scheme is not http or https");
    }
    if has_authorization || has_body {
        return RedirectDecision::Refuse(
            "refusing to replay a credentialed or body-bearing request through a redirect",
        );
    }
    if original_url.host_str() != next_url.host_str()
        || original_url.port_or_known_default() != next_url.port_or_known_default()
    {
        return RedirectDecision::Refuse("refusing cross-origin redirect");
    }
    if original_url.scheme() == "https" && next_url.scheme() != "https" {
        return RedirectDecision::Refuse("refusing https to http downgrade");
    }

    let next_method = match status {
        301 | 302 | 303 if *method != Method::GET && *method != Method::HEAD => Method::GET,
        _ => method.clone(),
    };
    RedirectDecision::Follow {
        method: next_method,
    }
}
