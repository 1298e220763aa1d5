//! Error types for the OAuth client engine

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for the OAuth client engine
pub type Result<T> = std::result::Result<T, Error>;

/// OAuth client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Provider configuration is invalid or incomplete
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Grant name is not known to the registry
    #[error("Unknown grant: {0}")]
    UnknownGrant(String),

    /// A required request parameter was not supplied
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A supplied value has the wrong shape
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The authorization server reported an error
    #[error(transparent)]
    IdentityProvider(#[from] IdentityProviderError),

    /// The response body could not be decoded
    #[error("Response parsing error: {message}")]
    ResponseParsing {
        /// Decoder message
        message: String,
        /// Raw response body
        body: String,
    },

    /// Transport failure, passed through as reported by the HTTP client
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a response parsing error carrying the raw body
    pub fn response_parsing(message: impl Into<String>, body: &[u8]) -> Self {
        Self::ResponseParsing {
            message: message.into(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// The identity provider error, if this is one
    #[must_use]
    pub fn as_identity_provider(&self) -> Option<&IdentityProviderError> {
        match self {
            Self::IdentityProvider(e) => Some(e),
            _ => None,
        }
    }
}

/// Protocol-level error reported by the authorization server.
///
/// `message` holds the value of the configured error key (an RFC 6749 §5.2
/// code such as `invalid_grant` for compliant servers) so callers can branch
/// on it directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Identity provider error {code}: {message}")]
pub struct IdentityProviderError {
    /// Error value, stringified when the provider sent a structured value
    pub message: String,
    /// `error_description`, when present
    pub description: Option<String>,
    /// Numeric code from the configured code key, or 0
    pub code: i64,
    /// HTTP status of the response
    pub status: u16,
    /// Raw response body
    pub body: String,
}

/// RFC 6749 §5.2 error codes
pub mod oauth_codes {
    /// Request is missing a parameter or is otherwise malformed
    pub const INVALID_REQUEST: &str = "invalid_request";
    /// Client authentication failed
    pub const INVALID_CLIENT: &str = "invalid_client";
    /// Grant or refresh token is invalid, expired, or revoked
    pub const INVALID_GRANT: &str = "invalid_grant";
    /// Client is not allowed to use this grant
    pub const UNAUTHORIZED_CLIENT: &str = "unauthorized_client";
    /// Grant type is not supported by the server
    pub const UNSUPPORTED_GRANT_TYPE: &str = "unsupported_grant_type";
    /// Requested scope is invalid or exceeds what was granted
    pub const INVALID_SCOPE: &str = "invalid_scope";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_provider_error_display() {
        let err = Error::from(IdentityProviderError {
            message: "invalid_grant".to_string(),
            description: None,
            code: 0,
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        });
        assert_eq!(err.to_string(), "Identity provider error 0: invalid_grant");
        assert_eq!(
            err.as_identity_provider().map(|e| e.message.as_str()),
            Some(oauth_codes::INVALID_GRANT)
        );
    }

    #[test]
    fn response_parsing_keeps_lossy_body() {
        let err = Error::response_parsing("expected JSON", b"<html>\xff</html>");
        match err {
            Error::ResponseParsing { body, .. } => assert!(body.starts_with("<html>")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn transport_error_is_transparent() {
        let err = Error::from(TransportError::Connection("refused".to_string()));
        assert_eq!(err.to_string(), "Connection error: refused");
        assert!(err.as_identity_provider().is_none());
    }
}
