//! Hardened REST client for the PATCH solar-monitoring API.
//!
//! The crate wraps `reqwest` with the guard rails the PATCH endpoints demand:
//! validated base URLs, CRLF-free headers, bounded multipart uploads, bounded
//! response reads, and a strict same-origin redirect policy driven by a pure
//! decision function. Endpoint wrappers cover the v3 account, organization,
//! plant, log, metric, and registry surfaces.
//!
//! ```no_run
//! use patch_client::{PatchClient, RequestOptions};
//!
//! # async fn run() -> patch_client::Result<()> {
//! let client = PatchClient::builder()
//!     .access_token("api-token")
//!     .build()?;
//! let plants = client
//!     .get_plant_list(Some(1), Some(50), &RequestOptions::new())
//!     .await?;
//! # let _ = plants;
//! # Ok(())
//! # }
//! ```
//!
//! Credential state may change while requests are in flight; each request
//! takes a point-in-time snapshot, so it observes either the old or the new
//! token, never a mixture.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod decode;
pub mod error;
pub mod multipart;
pub mod redirect;
pub mod request;
pub mod sanitize;
mod transport;

pub use client::{PatchClient, PatchClientBuilder, RequestOptions};
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL, DEFAULT_MAX_MULTIPART_BYTES,
    DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT,
};
pub use credentials::{CredentialSnapshot, Credentials};
pub use decode::ResponseBody;
pub use error::{Error, Result};
pub use multipart::FilePart;
pub use redirect::RedirectDecision;
pub use request::{PendingRequest, Query, QueryValue};
