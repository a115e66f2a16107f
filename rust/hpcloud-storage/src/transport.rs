//! HTTP transport seam.
//!
//! The dispatcher talks to the network through [`Transport`]. The default
//! implementation is [`HttpTransport`], backed by `reqwest`; tests substitute
//! their own.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};

mod http;
pub use http::HttpTransport;

/// Media type that triggers JSON decoding of a response body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A request relative to the storage endpoint.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path. Relative when handed to the dispatcher, absolute when
    /// handed to a transport.
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request body
    pub body: Option<Bytes>,
    /// Acceptable statuses. Any 2xx when empty.
    pub expects: Vec<StatusCode>,
}

impl Request {
    /// Create a request with no headers, query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            expects: Vec::new(),
        }
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add all headers from `headers`, replacing previous values.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Restrict the acceptable statuses.
    pub fn expecting(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.expects.extend(statuses);
        self
    }

    /// Whether `status` satisfies the expectation of this request.
    pub fn accepts(&self, status: StatusCode) -> bool {
        if self.expects.is_empty() {
            status.is_success()
        } else {
            self.expects.contains(&status)
        }
    }
}

/// A response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Bytes as received
    Raw(Bytes),
    /// Decoded JSON
    Json(serde_json::Value),
}

impl Body {
    /// Whether the body carries no data. A decoded body is never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Raw(bytes) => bytes.is_empty(),
            Self::Json(_) => false,
        }
    }

    /// The raw bytes, if not decoded.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            Self::Json(_) => None,
        }
    }

    /// The decoded value, if decoded.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// Decode raw bytes as JSON. Already decoded bodies are returned as is.
    pub fn into_json(self) -> Result<Self, serde_json::Error> {
        match self {
            Self::Raw(bytes) => Ok(Self::Json(serde_json::from_slice(&bytes)?)),
            json => Ok(json),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::Raw(Bytes::new())
    }
}

/// A response from the storage service.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Body,
}

impl Response {
    /// Create a response with a raw body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: Body::Raw(body.into()),
        }
    }

    /// Whether the `Content-Type` header names JSON.
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains(JSON_CONTENT_TYPE))
    }

    /// Look up a header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The service answered with a status the request did not expect.
    #[error("unexpected HTTP status {}", .response.status)]
    Status {
        /// The full response
        response: Box<Response>,
    },

    /// The HTTP client failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request URL could not be built.
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    /// A configured header is not a valid header.
    #[error("invalid header {0}")]
    InvalidHeader(String),

    /// The request path cannot be sent without being rewritten.
    #[error("invalid request path {0}")]
    InvalidPath(String),
}

impl TransportError {
    /// The status that caused this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { response } => Some(response.status),
            _ => None,
        }
    }
}

/// Sends requests to the storage service.
///
/// A transport is created for one origin (`scheme://host:port`) and receives
/// absolute paths. It returns [`TransportError::Status`] for any status the
/// request does not [accept](Request::accepts).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and collect the full response.
    async fn send(&self, request: Request) -> Result<Response, TransportError>;

    /// Drop the current connection state and start afresh.
    fn reset(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_success_statuses_by_default() {
        let request = Request::new(Method::GET, "container");
        assert!(request.accepts(StatusCode::OK));
        assert!(request.accepts(StatusCode::NO_CONTENT));
        assert!(!request.accepts(StatusCode::NOT_FOUND));
        assert!(!request.accepts(StatusCode::MOVED_PERMANENTLY));
    }

    #[test]
    fn it_accepts_only_expected_statuses() {
        let request = Request::new(Method::PUT, "container")
            .expecting([StatusCode::CREATED, StatusCode::ACCEPTED]);
        assert!(request.accepts(StatusCode::CREATED));
        assert!(!request.accepts(StatusCode::OK));
    }

    #[test]
    fn it_detects_json_content_types() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(Response::new(StatusCode::OK, headers, "[]").is_json());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!Response::new(StatusCode::OK, headers, "[]").is_json());

        assert!(!Response::new(StatusCode::OK, HeaderMap::new(), "[]").is_json());
    }

    #[test]
    fn it_decodes_raw_bodies() {
        let body = Body::Raw(Bytes::from_static(br#"{"count":2}"#))
            .into_json()
            .unwrap();
        assert_eq!(body.as_json().unwrap()["count"], 2);
        assert!(Body::Raw(Bytes::from_static(b"nope")).into_json().is_err());
    }

    #[test]
    fn it_treats_empty_raw_body_as_empty() {
        assert!(Body::default().is_empty());
        assert!(!Body::Json(serde_json::Value::Null).is_empty());
    }
}
