//! OAuth 2.0 client protocol engine
//!
//! Implements the client side of RFC 6749 against a single configured
//! authorization server.
//!
//! Features:
//! - Authorization URL with CSRF state and optional PKCE (RFC 7636)
//! - Authorization code, client credentials, password, refresh token and
//!   device code grants, plus caller-defined extension grants
//! - Token responses as JSON or URL-encoded bodies
//! - Resource owner profile fetch with bounded redirect following

mod grant;
mod params;
mod pkce;
mod provider;
mod resource_owner;
mod response;
mod token;

pub use grant::{CustomGrant, DEVICE_CODE_GRANT_TYPE, Grant, GrantRegistry, GrantSelector};
pub use params::RequestParams;
pub use pkce::{PkceChallenge, PkceMethod};
pub use provider::{AuthorizationOptions, AuthorizationRequest, ProfileTransform, Provider};
pub use resource_owner::ResourceOwner;
pub use token::{AccessToken, EXPIRES_TIMESTAMP_THRESHOLD};
