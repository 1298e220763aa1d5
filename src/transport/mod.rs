//! HTTP transport contract
//!
//! The engine never opens sockets itself. Every request goes through an
//! injected [`HttpClient`], so callers own timeouts, retries, proxies and
//! cancellation. A `reqwest` implementation lives in [`http`].

mod http;

pub use self::http::default_client;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// HTTP methods the engine issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET, parameters in the query string
    Get,
    /// POST, parameters in a form-encoded body
    Post,
}

impl Method {
    /// Parse a configured method name (case-insensitive); only GET and POST are accepted
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("GET") {
            Some(Self::Get)
        } else if name.eq_ignore_ascii_case("POST") {
            Some(Self::Post)
        } else {
            None
        }
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute target URL
    pub url: String,
    /// Request headers, in send order
    pub headers: Vec<(String, String)>,
    /// Optional body
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request without headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// First header value with the given name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response as read by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response with no headers
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 301-399 carrying a `Location` header; 300 Multiple Choices is final
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (301..400).contains(&self.status) && self.location().is_some()
    }

    /// First header value with the given name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `Location` header
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Body decoded as UTF-8, lossily
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Transport failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// Error raised by `reqwest`
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection could not be established or was dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport rejected the response but could still read it
    #[error("Bad response (HTTP {}): {message}", response.status)]
    BadResponse {
        /// Transport message
        message: String,
        /// The response that was read
        response: HttpResponse,
    },
}

/// Send a request, receive a response
///
/// Implementations should return non-2xx responses as `Ok` whenever a body
/// could be read, or as [`TransportError::BadResponse`] if their policy is
/// to fail on them. Both forms reach the engine's error classification.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute one request without following redirects
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_accepts_only_get_and_post() {
        assert_eq!(Method::parse("get"), Some(Method::Get));
        assert_eq!(Method::parse("POST"), Some(Method::Post));
        assert_eq!(Method::parse("PUT"), None);
        assert_eq!(Method::parse(""), None);
    }

    #[test]
    fn redirect_requires_location() {
        let bare = HttpResponse::new(302, "");
        assert!(!bare.is_redirect());

        let located = HttpResponse::new(302, "").with_header("Location", "/next");
        assert!(located.is_redirect());
        assert_eq!(located.location(), Some("/next"));
        assert!(!located.is_success());
    }

    #[test]
    fn multiple_choices_is_not_followed() {
        let choices = HttpResponse::new(300, "").with_header("Location", "/pick-one");
        assert!(!choices.is_redirect());
        assert!(HttpResponse::new(301, "").with_header("Location", "/moved").is_redirect());
        assert!(HttpResponse::new(308, "").with_header("Location", "/moved").is_redirect());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(200, "{}").with_header("Content-Type", "application/json");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert!(response.is_success());
    }

    #[test]
    fn bad_response_display_includes_status() {
        let err = TransportError::BadResponse {
            message: "client error".to_string(),
            response: HttpResponse::new(401, "{}"),
        };
        assert_eq!(err.to_string(), "Bad response (HTTP 401): client error");
    }
}
