//! Provider
//!
//! Drives the protocol against one authorization server: builds the
//! authorization redirect, exchanges grants for tokens, and fetches the
//! resource owner profile. All network I/O goes through the injected
//! [`HttpClient`].

use std::fmt;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::{Url, form_urlencoded};

use super::grant::{CustomGrant, Grant, GrantRegistry, GrantSelector};
use super::params::RequestParams;
use super::pkce::{PkceChallenge, generate_state};
use super::resource_owner::ResourceOwner;
use super::response::{check_response, parse_object, parse_value};
use super::token::AccessToken;
use crate::config::{ClientAuth, ProviderConfig, TokenPlacement};
use crate::transport::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};
use crate::{Error, Result};

/// Reshapes raw profile data before it becomes a [`ResourceOwner`]
pub type ProfileTransform = Arc<dyn Fn(Value) -> Result<Map<String, Value>> + Send + Sync>;

/// Per-call overrides for the authorization URL
#[derive(Debug, Clone, Default)]
pub struct AuthorizationOptions {
    /// Use this state instead of a generated one
    pub state: Option<String>,
    /// Replace the configured default scopes
    pub scopes: Option<Vec<String>>,
    /// `response_type`, defaults to `code`
    pub response_type: Option<String>,
    /// Replace the configured redirect URI
    pub redirect_uri: Option<String>,
    /// Extra parameters, applied last
    pub extra: RequestParams,
}

impl AuthorizationOptions {
    /// Fixed state value
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Scopes for this request only
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Additional query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.set(key, value);
        self
    }
}

/// Authorization redirect plus what the caller must keep for the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Full authorization URL
    pub url: String,
    /// State to compare against the callback
    pub state: String,
    /// PKCE pair, when the provider is configured for it
    pub pkce: Option<PkceChallenge>,
}

impl AuthorizationRequest {
    /// Verifier to send as `code_verifier` in the token exchange
    #[must_use]
    pub fn pkce_verifier(&self) -> Option<&str> {
        self.pkce.as_ref().map(|p| p.verifier.as_str())
    }
}

struct OwnerMemo {
    token: String,
    owner: ResourceOwner,
}

/// OAuth 2.0 client for a single authorization server
pub struct Provider {
    /// Validated configuration
    config: ProviderConfig,

    /// Injected transport
    http_client: Arc<dyn HttpClient>,

    /// Grants resolvable by name
    grants: GrantRegistry,

    /// Optional profile reshaping
    profile_transform: Option<ProfileTransform>,

    /// Last fetched resource owner, keyed by access token
    owner_memo: RwLock<Option<OwnerMemo>>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("client_id", &self.config.client_id)
            .field("endpoints", &self.config.endpoints)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Create a provider
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the configuration fails validation.
    pub fn new(config: ProviderConfig, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        config.validate()?;
        debug!(client_id = %config.client_id, token_url = %config.endpoints.token, "Provider created");
        Ok(Self {
            config,
            http_client,
            grants: GrantRegistry::default(),
            profile_transform: None,
            owner_memo: RwLock::new(None),
        })
    }

    /// Register a custom grant, resolvable by its name
    #[must_use]
    pub fn with_grant(mut self, grant: CustomGrant) -> Self {
        self.grants.register(grant);
        self
    }

    /// Reshape profile responses before they are wrapped
    #[must_use]
    pub fn with_profile_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Map<String, Value>> + Send + Sync + 'static,
    {
        self.profile_transform = Some(Arc::new(transform));
        self
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Grant registry in use
    #[must_use]
    pub fn grants(&self) -> &GrantRegistry {
        &self.grants
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    /// Build the authorization URL.
    ///
    /// Parameters are emitted in the order `client_id`, `redirect_uri`,
    /// `state`, `scope`, `response_type`, then PKCE and extras. `scope` is
    /// omitted when no scopes are in effect.
    pub fn authorization_url(&self, options: AuthorizationOptions) -> Result<AuthorizationRequest> {
        let AuthorizationOptions {
            state,
            scopes,
            response_type,
            redirect_uri,
            extra,
        } = options;

        let mut params = RequestParams::new();
        params.set("client_id", &self.config.client_id);
        if let Some(uri) = redirect_uri.or_else(|| self.config.redirect_uri.clone()) {
            params.set("redirect_uri", uri);
        }
        params.set("state", state.unwrap_or_else(generate_state));
        let scopes = scopes.unwrap_or_else(|| self.config.scopes.clone());
        if !scopes.is_empty() {
            params.set("scope", scopes.join(&self.config.scope_separator));
        }
        params.set("response_type", response_type.unwrap_or_else(|| "code".to_string()));

        let pkce = self.config.pkce_method.map(PkceChallenge::generate);
        if let Some(pkce) = &pkce {
            params.set("code_challenge", &pkce.challenge);
            params.set("code_challenge_method", pkce.method.as_str());
        }

        let mut params = params.merged(extra);
        if params.get("scope").is_some_and(str::is_empty) {
            params.remove("scope");
        }
        let state = params.get("state").unwrap_or_default().to_string();

        let mut url = endpoint_url(&self.config.endpoints.authorization)?;
        url.query_pairs_mut().extend_pairs(params.iter());

        debug!(url = %self.config.endpoints.authorization, pkce = pkce.is_some(), "Built authorization URL");
        Ok(AuthorizationRequest {
            url: url.into(),
            state,
            pkce,
        })
    }

    // ========================================================================
    // Token exchange
    // ========================================================================

    /// Token endpoint without parameters
    #[must_use]
    pub fn base_access_token_url(&self) -> &str {
        &self.config.endpoints.token
    }

    /// Exchange a grant for an access token.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownGrant`] for an unresolvable grant name
    /// - [`Error::MissingParameter`] before any request is sent
    /// - [`Error::Configuration`] for an unsupported token request method
    /// - [`Error::IdentityProvider`] when the server reports an error
    /// - [`Error::ResponseParsing`] when the body is not a usable token response
    /// - [`Error::Transport`] as reported by the HTTP client
    pub async fn get_access_token(
        &self,
        grant: impl Into<GrantSelector>,
        params: RequestParams,
    ) -> Result<AccessToken> {
        let grant = self.grants.resolve(grant.into())?;
        let params = grant.prepare_request_parameters(self.default_token_params(), params)?;
        let request = self.access_token_request(params)?;

        debug!(grant = %grant, method = %request.method, url = %self.config.endpoints.token, "Requesting access token");
        let response = self.send(request).await?;
        let data = self.parsed(&response)?;

        let token = grant
            .create_access_token(data, self.config.access_token_resource_owner_id_key.as_deref())
            .map_err(|e| match e {
                Error::MissingParameter(_) | Error::InvalidParameter { .. } => Error::response_parsing(
                    format!("Invalid token response: {e}"),
                    &response.body,
                ),
                other => other,
            })?;

        info!(grant = %grant, expires = ?token.expires(), "Access token obtained");
        Ok(token)
    }

    /// Refresh an access token.
    ///
    /// Keeps the current refresh token when the server does not rotate it.
    pub async fn refresh_access_token(&self, token: &AccessToken) -> Result<AccessToken> {
        let refresh_token = token
            .refresh_token()
            .ok_or_else(|| Error::MissingParameter("refresh_token".to_string()))?;

        let refreshed = self
            .get_access_token(
                Grant::RefreshToken,
                RequestParams::from([("refresh_token", refresh_token)]),
            )
            .await?;

        if refreshed.refresh_token().is_some() {
            Ok(refreshed)
        } else {
            debug!("Server did not rotate refresh token, keeping the previous one");
            Ok(refreshed.with_refresh_token(refresh_token))
        }
    }

    fn default_token_params(&self) -> RequestParams {
        let mut params = RequestParams::new();
        params.set("client_id", &self.config.client_id);
        if let Some(secret) = &self.config.client_secret {
            params.set("client_secret", secret);
        }
        if let Some(uri) = &self.config.redirect_uri {
            params.set("redirect_uri", uri);
        }
        params
    }

    fn access_token_method(&self) -> Result<Method> {
        Method::parse(&self.config.access_token_method).ok_or_else(|| {
            Error::Configuration(format!(
                "Unsupported access token request method: {}",
                self.config.access_token_method
            ))
        })
    }

    /// Token request for prepared parameters: POST sends a form body, GET
    /// appends the parameters to the token URL.
    pub fn access_token_request(&self, mut params: RequestParams) -> Result<HttpRequest> {
        let method = self.access_token_method()?;
        let mut headers = self.default_headers();

        if self.config.client_auth == ClientAuth::Basic {
            let id = params.remove("client_id").unwrap_or_default();
            let secret = params.remove("client_secret").unwrap_or_default();
            let credentials = format!("{}:{}", form_encode(&id), form_encode(&secret));
            headers.push((
                "Authorization".to_string(),
                format!("Basic {}", STANDARD.encode(credentials)),
            ));
        }

        let request = match method {
            Method::Post => {
                headers.push((
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ));
                HttpRequest {
                    method,
                    url: self.config.endpoints.token.clone(),
                    headers,
                    body: Some(params.to_form_urlencoded().into_bytes()),
                }
            }
            Method::Get => {
                let mut url = endpoint_url(&self.config.endpoints.token)?;
                url.query_pairs_mut().extend_pairs(params.iter());
                HttpRequest {
                    method,
                    url: url.into(),
                    headers,
                    body: None,
                }
            }
        };
        Ok(request)
    }

    // ========================================================================
    // Resource owner
    // ========================================================================

    /// Resource-owner endpoint as requested for `token`; carries the token
    /// when it is placed in the query
    pub fn resource_owner_details_url(&self, token: &AccessToken) -> Result<String> {
        self.authorized_url(&self.config.endpoints.resource_owner, token)
    }

    /// Request to `url` carrying the access token per the configured placement
    pub fn authenticated_request(
        &self,
        method: Method,
        url: &str,
        token: &AccessToken,
    ) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(method, self.authorized_url(url, token)?);
        request.headers = self.default_headers();
        if self.config.token_placement == TokenPlacement::Header {
            request
                .headers
                .push(("Authorization".to_string(), format!("Bearer {}", token.token())));
        }
        Ok(request)
    }

    /// Profile for `token`, fetched once and then served from memory until a
    /// different token is passed
    pub async fn get_resource_owner(&self, token: &AccessToken) -> Result<ResourceOwner> {
        let memoized = self
            .owner_memo
            .read()
            .as_ref()
            .filter(|memo| memo.token == token.token())
            .map(|memo| memo.owner.clone());
        if let Some(owner) = memoized {
            debug!("Resource owner served from memo");
            return Ok(owner);
        }
        self.refetch_resource_owner(token).await
    }

    /// Fetch the profile regardless of the memo, then replace it
    pub async fn refetch_resource_owner(&self, token: &AccessToken) -> Result<ResourceOwner> {
        self.owner_memo.write().take();

        let response = self.fetch_resource_owner_response(token).await?;
        let value = parse_value(&response, self.config.response_format)?;
        if let Value::Object(data) = &value {
            self.check(&response, data)?;
        } else if response.status >= 400 {
            self.check(&response, &Map::new())?;
        }

        let data = match (&self.profile_transform, value) {
            (Some(transform), value) => transform(value)?,
            (None, Value::Object(data)) => data,
            (None, _) => {
                return Err(Error::response_parsing(
                    "Invalid resource owner response: expected an object",
                    &response.body,
                ));
            }
        };

        let owner = ResourceOwner::new(data, &self.config.resource_owner_id_key);
        *self.owner_memo.write() = Some(OwnerMemo {
            token: token.token().to_string(),
            owner: owner.clone(),
        });
        info!(status = response.status, "Resource owner fetched");
        Ok(owner)
    }

    /// Raw resource-owner response, following at most `redirect_limit - 1`
    /// redirects. The final response is returned even when it is itself a
    /// redirect.
    pub async fn fetch_resource_owner_response(&self, token: &AccessToken) -> Result<HttpResponse> {
        let request = self.authenticated_request(Method::Get, &self.config.endpoints.resource_owner, token)?;
        self.send_following_redirects(request, token).await
    }

    /// Resource owner id
    pub async fn user_id(&self, token: &AccessToken) -> Result<String> {
        self.get_resource_owner(token).await?.id()
    }

    /// Email from the configured profile field
    pub async fn user_email(&self, token: &AccessToken) -> Result<Option<String>> {
        let owner = self.get_resource_owner(token).await?;
        Ok(owner.get_str(&self.config.profile.email))
    }

    /// Display name from the configured profile field
    pub async fn user_name(&self, token: &AccessToken) -> Result<Option<String>> {
        let owner = self.get_resource_owner(token).await?;
        Ok(owner.get_str(&self.config.profile.name))
    }

    /// Screen name from the configured profile field
    pub async fn user_screen_name(&self, token: &AccessToken) -> Result<Option<String>> {
        let owner = self.get_resource_owner(token).await?;
        Ok(owner.get_str(&self.config.profile.screen_name))
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send any request and decode the body, with the same error
    /// classification as token responses
    pub async fn parsed_response(&self, request: HttpRequest) -> Result<Map<String, Value>> {
        let response = self.send(request).await?;
        self.parsed(&response)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        match self.http_client.send(request).await {
            Ok(response) => Ok(response),
            Err(TransportError::BadResponse { message, response }) => {
                debug!(status = response.status, error = %message, "Classifying body of rejected response");
                Ok(response)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_following_redirects(
        &self,
        mut request: HttpRequest,
        token: &AccessToken,
    ) -> Result<HttpResponse> {
        let mut sent = 0;
        loop {
            sent += 1;
            let response = self.send(request.clone()).await?;
            if !response.is_redirect() {
                return Ok(response);
            }
            if sent >= self.config.redirect_limit {
                debug!(status = response.status, limit = self.config.redirect_limit, "Redirect limit reached");
                return Ok(response);
            }

            let location = response.location().unwrap_or_default();
            let next = match Url::parse(&request.url).and_then(|base| base.join(location)) {
                Ok(next) => next,
                Err(e) => {
                    warn!(location = %location, error = %e, "Unresolvable redirect location");
                    return Ok(response);
                }
            };
            debug!(status = response.status, to = %next, "Following redirect");
            request.url = self.authorized_url(next.as_str(), token)?;
        }
    }

    fn parsed(&self, response: &HttpResponse) -> Result<Map<String, Value>> {
        let data = parse_object(response, self.config.response_format)?;
        self.check(response, &data)?;
        Ok(data)
    }

    fn check(&self, response: &HttpResponse, data: &Map<String, Value>) -> Result<()> {
        check_response(
            response,
            data,
            &self.config.error_key,
            self.config.code_key.as_deref(),
        )
    }

    fn default_headers(&self) -> Vec<(String, String)> {
        self.config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn authorized_url(&self, url: &str, token: &AccessToken) -> Result<String> {
        match self.config.token_placement {
            TokenPlacement::Header => Ok(url.to_string()),
            TokenPlacement::Query => {
                let mut url = endpoint_url(url)?;
                let name = &self.config.token_query_parameter;
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(k, _)| k != name)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                url.set_query(None);
                url.query_pairs_mut()
                    .extend_pairs(kept)
                    .append_pair(name, token.token());
                Ok(url.into())
            }
        }
    }
}

fn endpoint_url(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint)
        .map_err(|e| Error::Configuration(format!("Invalid endpoint URL `{endpoint}`: {e}")))
}

fn form_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
