//! `reqwest` backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{HeaderMap, HeaderName, HeaderValue, Request, Response, Transport, TransportError};
use crate::options::ConnectionOptions;

/// Transport sending requests with a `reqwest` client.
///
/// When `persistent` is false idle connections are not pooled, so every
/// request opens a fresh connection.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    origin: Url,
    persistent: bool,
    options: ConnectionOptions,
    user_agent: Option<String>,
    client: Client,
}

impl HttpTransport {
    /// Create a transport for `origin` (`scheme://host:port`).
    pub fn new(
        origin: &str,
        persistent: bool,
        options: ConnectionOptions,
        user_agent: Option<String>,
    ) -> Result<Self, TransportError> {
        let origin = Url::parse(origin)?;
        let client = build_client(persistent, &options, user_agent.as_deref())?;

        Ok(Self {
            origin,
            persistent,
            options,
            user_agent,
            client,
        })
    }

    /// The origin requests are sent to.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// The URL `request` is sent to.
    ///
    /// URL parsing collapses `.` and `..` segments (percent-encoded ones
    /// included), which would send the request to a different resource. Such
    /// paths are refused instead.
    fn url_for(&self, request: &Request) -> Result<Url, TransportError> {
        if let Some(segment) = request.path.split('/').find(|s| is_dot_segment(s)) {
            return Err(TransportError::InvalidPath(format!(
                "{}: segment `{segment}` would be rewritten",
                request.path
            )));
        }

        let mut url = self.origin.clone();
        url.set_path(&request.path);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.url_for(&request)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        let response = Response::new(status, headers, body);
        if !request.accepts(status) {
            return Err(TransportError::Status {
                response: Box::new(response),
            });
        }

        Ok(response)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        debug!(origin = %self.origin, "Rebuilding HTTP client");
        self.client = build_client(self.persistent, &self.options, self.user_agent.as_deref())?;
        Ok(())
    }
}

fn is_dot_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        "." | "%2e" | ".." | ".%2e" | "%2e." | "%2e%2e"
    )
}

fn build_client(
    persistent: bool,
    options: &ConnectionOptions,
    user_agent: Option<&str>,
) -> Result<Client, TransportError> {
    let mut builder = Client::builder();

    if let Some(timeout) = options.timeout_seconds {
        builder = builder.timeout(Duration::from_secs(timeout));
    }
    if let Some(timeout) = options.connect_timeout_seconds {
        builder = builder.connect_timeout(Duration::from_secs(timeout));
    }
    if !persistent {
        builder = builder.pool_max_idle_per_host(0);
    }
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent);
    }
    if !options.headers.is_empty() {
        builder = builder.default_headers(default_headers(&options.headers)?);
    }

    Ok(builder.build()?)
}

fn default_headers(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}
