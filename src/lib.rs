//! OAuth 2.0 client library
//!
//! Protocol engine for the client side of OAuth 2.0: one [`Provider`] per
//! authorization server, configured declaratively, talking HTTP through an
//! injected [`HttpClient`].
//!
//! # Features
//!
//! - **Authorization redirect**: state and PKCE generated per request
//! - **Grants**: built-in RFC 6749 grants, device code, custom extensions
//! - **Token exchange**: GET or POST, JSON or URL-encoded responses
//! - **Error classification**: provider errors, malformed responses and
//!   transport failures stay distinct
//! - **Resource owner**: profile fetch with redirect limit and memoization
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use oauth_client::{AuthorizationOptions, Endpoints, Provider, ProviderConfig, RequestParams};
//!
//! # async fn run() -> oauth_client::Result<()> {
//! let config = ProviderConfig::new(
//!     "my-client",
//!     Endpoints::new(
//!         "https://auth.example.com/authorize",
//!         "https://auth.example.com/token",
//!         "https://api.example.com/me",
//!     ),
//! );
//! let http = oauth_client::transport::default_client(Duration::from_secs(30))?;
//! let provider = Provider::new(config, Arc::new(http))?;
//!
//! let request = provider.authorization_url(AuthorizationOptions::default())?;
//! println!("Visit {}", request.url);
//!
//! let token = provider
//!     .get_access_token("authorization_code", RequestParams::from([("code", "abc")]))
//!     .await?;
//! let owner = provider.get_resource_owner(&token).await?;
//! println!("Signed in as {}", owner.id()?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod oauth;
pub mod transport;

pub use config::{ClientAuth, Endpoints, ProfileFields, ProviderConfig, ResponseFormat, TokenPlacement};
pub use error::{Error, IdentityProviderError, Result};
pub use oauth::{
    AccessToken, AuthorizationOptions, AuthorizationRequest, CustomGrant, Grant, GrantRegistry,
    GrantSelector, PkceChallenge, PkceMethod, Provider, RequestParams, ResourceOwner,
};
pub use transport::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`. `format` selects `json` output,
/// anything else gives human-readable lines.
///
/// # Errors
///
/// [`Error::Configuration`] if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Configuration(format!("Failed to install tracing subscriber: {e}")))
}
