//! PATCH API client facade.
//!
//! [`PatchClient`] owns the immutable configuration, the mutable credential
//! store, and the bounded transport. Every endpoint wrapper funnels through
//! [`PatchClient::request`], which assembles the final URL and header set and
//! maps non-2xx statuses to [`Error::Api`].

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::credentials::Credentials;
use crate::decode::{decode, ResponseBody};
use crate::error::{Error, Result};
use crate::multipart::{encode_multipart, FilePart};
use crate::request::{build_url, encode_path_segment, PendingRequest, Query};
use crate::sanitize::reject_crlf;
use crate::transport::BoundedTransport;

/// Per-call overrides: an access token, an account type, and extra headers.
///
/// A token or account type set here wins over the client-level credential
/// store for this call only.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub access_token: Option<String>,
    pub account_type: Option<String>,
    pub headers: HashMap<String, String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn account_type(mut self, account_type: impl Into<String>) -> Self {
        self.account_type = Some(account_type.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("account_type", &self.account_type)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Hardened client for the PATCH monitoring API.
pub struct PatchClient {
    config: ClientConfig,
    credentials: Credentials,
    transport: BoundedTransport,
}

impl PatchClient {
    pub fn builder() -> PatchClientBuilder {
        PatchClientBuilder::default()
    }

    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = BoundedTransport::new(&config)?;
        Ok(Self {
            config,
            credentials: Credentials::default(),
            transport,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replaces the client-level access token for all subsequent requests.
    pub fn set_access_token(&self, token: Option<String>) {
        self.credentials.set_access_token(token);
    }

    /// Replaces the client-level account type for all subsequent requests.
    pub fn set_account_type(&self, account_type: Option<String>) {
        self.credentials.set_account_type(account_type);
    }

    /// Issues one request and decodes the response.
    ///
    /// A 2xx response yields the decoded payload (`None` for an empty body);
    /// anything else is an [`Error::Api`] carrying the status and whatever
    /// payload could be decoded. Header names and values are validated before
    /// the request leaves the process.
    pub async fn request(&self, req: PendingRequest) -> Result<Option<ResponseBody>> {
        let url = build_url(&self.config.base_url, &req.path, &req.query)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &self.config.default_headers {
            insert_header(&mut headers, name, value)?;
        }
        for (name, value) in &req.headers {
            insert_header(&mut headers, name, value)?;
        }

        let mut body = req.raw_body;
        if let Some(json) = &req.json_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            body = Some(serde_json::to_vec(json).map_err(|err| {
                Error::Validation(format!("failed to serialize JSON body: {err}"))
            })?);
        }

        let raw = self
            .transport
            .send(req.method.clone(), url.clone(), headers, body)
            .await?;
        let payload = decode(&raw.body, &raw.content_type);
        if (200..300).contains(&raw.status) {
            Ok(payload)
        } else {
            Err(Error::Api {
                status: raw.status,
                method: req.method.to_string(),
                url: url.to_string(),
                payload,
            })
        }
    }

    async fn send_with_options(
        &self,
        mut req: PendingRequest,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        for (name, value) in self.merged_option_headers(opts) {
            req.headers.insert(name, value);
        }
        self.request(req).await
    }

    /// Resolves the per-call header set from the options and the credential
    /// store. A blank token produces no `Authorization` header at all, and a
    /// derived `Authorization` or `Account-Type` replaces any same-named
    /// entry in the extra headers regardless of its spelling.
    fn merged_option_headers(&self, opts: &RequestOptions) -> HashMap<String, String> {
        let snapshot = self.credentials.snapshot();
        let mut headers = opts.headers.clone();

        let token = opts
            .access_token
            .clone()
            .or_else(|| snapshot.token().map(str::to_string));
        if let Some(token) = token {
            if !token.trim().is_empty() {
                headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));
                let value = if has_bearer_prefix(&token) {
                    token
                } else {
                    format!("Bearer {token}")
                };
                headers.insert("Authorization".to_string(), value);
            }
        }

        let account_type = opts.account_type.clone().or(snapshot.account_type);
        if let Some(account_type) = account_type {
            if !account_type.is_empty() {
                headers.retain(|name, _| !name.eq_ignore_ascii_case("account-type"));
                headers.insert("Account-Type".to_string(), account_type);
            }
        }

        headers
    }

    // ---- account ----------------------------------------------------------

    /// Exchanges credentials for a token. The payload is the caller's; no
    /// stored token is attached.
    pub async fn authenticate_user(&self, payload: Value) -> Result<Option<ResponseBody>> {
        self.request(
            PendingRequest::new(Method::POST, "/api/v3/account/auth-with-password").json(payload),
        )
        .await
    }

    pub async fn refresh_user_token(&self, opts: &RequestOptions) -> Result<Option<ResponseBody>> {
        self.send_with_options(
            PendingRequest::new(Method::POST, "/api/v3/account/refresh-token"),
            opts,
        )
        .await
    }

    pub async fn get_account_info(&self, opts: &RequestOptions) -> Result<Option<ResponseBody>> {
        self.send_with_options(PendingRequest::new(Method::GET, "/api/v3/account/"), opts)
            .await
    }

    // ---- organizations ----------------------------------------------------

    pub async fn create_organization_member(
        &self,
        organization_id: &str,
        payload: Value,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/organizations/{}/members",
            encode_path_segment(organization_id)
        );
        self.send_with_options(PendingRequest::new(Method::POST, path).json(payload), opts)
            .await
    }

    pub async fn assign_plant_permission(
        &self,
        organization_id: &str,
        payload: Value,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/organizations/{}/permissions",
            encode_path_segment(organization_id)
        );
        self.send_with_options(PendingRequest::new(Method::POST, path).json(payload), opts)
            .await
    }

    // ---- plants ------------------------------------------------------------

    pub async fn get_plant_list(
        &self,
        page: Option<i64>,
        size: Option<i64>,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let mut query = Query::new();
        query.push_opt("page", page);
        query.push_opt("size", size);
        self.send_with_options(
            PendingRequest::new(Method::GET, "/api/v3/plants").query(query),
            opts,
        )
        .await
    }

    pub async fn create_plant(
        &self,
        payload: Value,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        self.send_with_options(
            PendingRequest::new(Method::POST, "/api/v3/plants").json(payload),
            opts,
        )
        .await
    }

    pub async fn get_plant_details(
        &self,
        plant_id: &str,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!("/api/v3/plants/{}", encode_path_segment(plant_id));
        self.send_with_options(PendingRequest::new(Method::GET, path), opts)
            .await
    }

    pub async fn get_plant_blueprint(
        &self,
        plant_id: &str,
        date: &str,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/blueprint",
            encode_path_segment(plant_id)
        );
        let mut query = Query::new();
        query.push("date", date);
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }

    /// Uploads files under the configured multipart size ceiling. Ordinary
    /// fields precede file parts in the encoded body.
    pub async fn upload_plant_files(
        &self,
        plant_id: &str,
        fields: &[(String, String)],
        files: &[(String, FilePart)],
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let (content_type, body) =
            encode_multipart(fields, files, self.config.max_multipart_bytes)?;
        let path = format!("/api/v3/plants/{}/files", encode_path_segment(plant_id));
        self.send_with_options(
            PendingRequest::new(Method::POST, path).raw(body, content_type),
            opts,
        )
        .await
    }

    pub async fn get_asset_health_level(
        &self,
        plant_id: &str,
        unit: &str,
        date: &str,
        view: Option<&str>,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/indicator/health-level/{}",
            encode_path_segment(plant_id),
            encode_path_segment(unit)
        );
        let mut query = Query::new();
        query.push("date", date);
        query.push_opt("view", view);
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }

    pub async fn get_panel_seqnum(
        &self,
        plant_id: &str,
        date: &str,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/indicator/seqnum",
            encode_path_segment(plant_id)
        );
        let mut query = Query::new();
        query.push("date", date);
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }

    // ---- logs --------------------------------------------------------------

    pub async fn list_inverter_logs(
        &self,
        plant_id: &str,
        page: Option<i64>,
        size: Option<i64>,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/logs/inverter",
            encode_path_segment(plant_id)
        );
        let mut query = Query::new();
        query.push_opt("page", page);
        query.push_opt("size", size);
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }

    pub async fn list_inverter_logs_by_id(
        &self,
        plant_id: &str,
        inverter_id: &str,
        page: Option<i64>,
        size: Option<i64>,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/logs/inverters/{}",
            encode_path_segment(plant_id),
            encode_path_segment(inverter_id)
        );
        let mut query = Query::new();
        query.push_opt("page", page);
        query.push_opt("size", size);
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }

    // ---- metrics -----------------------------------------------------------

    pub async fn get_latest_device_metrics(
        &self,
        plant_id: &str,
        include_state: Option<bool>,
        ago: Option<i64>,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/metrics/device/latest",
            encode_path_segment(plant_id)
        );
        let mut query = Query::new();
        query.push_opt("includeState", include_state);
        query.push_opt("ago", ago);
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }

    pub async fn get_latest_inverter_metrics(
        &self,
        plant_id: &str,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/metrics/inverter/latest",
            encode_path_segment(plant_id)
        );
        self.send_with_options(PendingRequest::new(Method::GET, path), opts)
            .await
    }

    /// Time-series metrics for one source at a unit and interval. The
    /// `fields` selection serializes as a single comma-joined value.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_metrics_by_date(
        &self,
        plant_id: &str,
        source: &str,
        unit: &str,
        interval: &str,
        date: &str,
        before: Option<i64>,
        fields: Option<&[String]>,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/metrics/{}/{}-{}",
            encode_path_segment(plant_id),
            encode_path_segment(source),
            encode_path_segment(unit),
            encode_path_segment(interval)
        );
        let mut query = Query::new();
        query.push("date", date);
        query.push_opt("before", before);
        query.push_opt(
            "fields",
            fields.filter(|f| !f.is_empty()).map(|f| f.join(",")),
        );
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }

    // ---- registry ----------------------------------------------------------

    pub async fn get_asset_registration_on_plant(
        &self,
        plant_id: &str,
        record_type: &str,
        date: &str,
        asset_id: Option<&str>,
        map_id: Option<&str>,
        opts: &RequestOptions,
    ) -> Result<Option<ResponseBody>> {
        let path = format!(
            "/api/v3/plants/{}/registry/{}",
            encode_path_segment(plant_id),
            encode_path_segment(record_type)
        );
        let mut query = Query::new();
        query.push("date", date);
        query.push_opt("asset_id", asset_id);
        query.push_opt("map_id", map_id);
        self.send_with_options(PendingRequest::new(Method::GET, path).query(query), opts)
            .await
    }
}

impl std::fmt::Debug for PatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchClient")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Builder for [`PatchClient`], combining configuration and initial
/// credentials.
#[derive(Debug, Clone, Default)]
pub struct PatchClientBuilder {
    config: ClientConfigBuilder,
    access_token: Option<String>,
    account_type: Option<String>,
}

impl PatchClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.base_url(base_url);
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.default_header(name, value);
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.config = self.config.max_response_bytes(limit);
        self
    }

    pub fn max_multipart_bytes(mut self, limit: usize) -> Self {
        self.config = self.config.max_multipart_bytes(limit);
        self
    }

    pub fn allow_insecure_http(mut self, allow: bool) -> Self {
        self.config = self.config.allow_insecure_http(allow);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config = self.config.follow_redirects(follow);
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn account_type(mut self, account_type: impl Into<String>) -> Self {
        self.account_type = Some(account_type.into());
        self
    }

    pub fn build(self) -> Result<PatchClient> {
        let config = self.config.build()?;
        let transport = BoundedTransport::new(&config)?;
        Ok(PatchClient {
            config,
            credentials: Credentials::new(self.access_token, self.account_type),
            transport,
        })
    }
}

fn has_bearer_prefix(value: &str) -> bool {
    value
        .get(..7)
        .map(|prefix| prefix.eq_ignore_ascii_case("bearer "))
        .unwrap_or(false)
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let value = reject_crlf(value, "header value")?;
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|err| Error::Validation(format!("invalid header name {name:?}: {err}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|err| Error::Validation(format!("invalid value for header {name:?}: {err}")))?;
    map.insert(header_name, header_value);
    Ok(())
}
