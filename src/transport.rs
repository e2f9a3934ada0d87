//! HTTP transport used by the engine.
//!
//! Requests and responses are plain data. The [`Transport`] trait is the only
//! seam between the reconciliation logic and the network, so tests can swap in
//! the in-memory transports from [`crate::testing`].

use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::{ReconcileError, Result};

/// Header carrying the vCenter API session token.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Whether the method can mutate remote state.
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Get)
    }

    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// Absolute path on the server, possibly with an `?action=` query.
    pub path: String,
    /// Extra query pairs, appended after any query already in `path`.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Create a request without query or body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Attach query pairs.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers as received.
    pub headers: Vec<(String, String)>,
    /// Raw body text; `None` when the server sent nothing.
    pub body: Option<String>,
}

impl HttpResponse {
    /// Create a response with the given status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a JSON response.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body.to_string()),
        }
    }

    /// Look up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `Content-Type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is 5xx.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Body text, or an empty string.
    pub fn text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// Executes HTTP requests against a vCenter server.
///
/// Implementations must not retry: a failed write is reported once and the
/// caller decides whether to re-run.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

/// Send a request and log the exchange.
///
/// Only the method, path and status are logged; bodies may carry secrets.
pub(crate) async fn execute<T>(transport: &T, request: HttpRequest) -> Result<HttpResponse>
where
    T: Transport + ?Sized,
{
    let method = request.method;
    let path = request.path.clone();
    let response = transport.send(request).await?;
    debug!(%method, %path, status = response.status, "http exchange");
    Ok(response)
}

/// [`Transport`] over a `reqwest::Client`.
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: Url,
    session_id: Option<SecretString>,
}

impl ReqwestTransport {
    /// Wrap an existing client. Request paths are joined onto `base_url`.
    pub fn new(base_url: Url, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url,
            session_id: None,
        }
    }

    /// Build a client from connection settings.
    ///
    /// The settings are validated first.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.base_url()?, config.build_client()?))
    }

    /// Attach an already established API session token.
    pub fn with_session(mut self, session_id: SecretString) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url.as_str())
            .field("session", &self.session_id.is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = self.base_url.join(&request.path)?;
        trace!(method = %request.method, url = %url, "sending request");

        let mut builder = self.http.request(request.method.into(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(session) = &self.session_id {
            let mut value = HeaderValue::from_str(session.expose_secret()).map_err(|_| {
                ReconcileError::Configuration(
                    "session token is not a valid header value".to_string(),
                )
            })?;
            value.set_sensitive(true);
            builder = builder.header(SESSION_HEADER, value);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let text = resp.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body: if text.is_empty() { None } else { Some(text) },
        })
    }
}
