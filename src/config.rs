//! Provider configuration
//!
//! One declarative record describes an authorization server: endpoints,
//! credentials, and the field names it uses in responses. Configurations
//! can be built in code or loaded from YAML plus `OAUTH_CLIENT_*`
//! environment variables.

use std::{collections::BTreeMap, env, path::Path};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::oauth::PkceMethod;
use crate::{Error, Result};

/// Default redirect limit for resource-owner fetches
pub const DEFAULT_REDIRECT_LIMIT: u32 = 2;

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Client identifier
    pub client_id: String,
    /// Client secret; public clients leave it unset
    pub client_secret: Option<String>,
    /// Redirect URI registered with the provider
    pub redirect_uri: Option<String>,
    /// Default scopes, in request order (a space/comma separated string is also accepted)
    #[serde(deserialize_with = "deserialize_scopes")]
    pub scopes: Vec<String>,
    /// Separator used to join scopes
    pub scope_separator: String,
    /// Protocol endpoints
    pub endpoints: Endpoints,
    /// Token request method; only GET and POST are accepted, checked per call
    pub access_token_method: String,
    /// How response bodies are decoded
    pub response_format: ResponseFormat,
    /// Profile field holding the resource owner id (dotted paths allowed)
    pub resource_owner_id_key: String,
    /// Token response field holding the resource owner id (dotted paths allowed)
    pub access_token_resource_owner_id_key: Option<String>,
    /// Response field signalling an error
    pub error_key: String,
    /// Response field carrying a numeric error code
    pub code_key: Option<String>,
    /// Where the access token goes on resource-owner requests
    pub token_placement: TokenPlacement,
    /// Query parameter name used with [`TokenPlacement::Query`]
    pub token_query_parameter: String,
    /// How client credentials are sent to the token endpoint
    pub client_auth: ClientAuth,
    /// Maximum requests issued while following resource-owner redirects (at least 1)
    pub redirect_limit: u32,
    /// Attach a PKCE challenge to authorization URLs
    pub pkce_method: Option<PkceMethod>,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Profile field names for the convenience getters
    pub profile: ProfileFields,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: None,
            scopes: Vec::new(),
            scope_separator: ",".to_string(),
            endpoints: Endpoints::default(),
            access_token_method: "POST".to_string(),
            response_format: ResponseFormat::default(),
            resource_owner_id_key: "id".to_string(),
            access_token_resource_owner_id_key: None,
            error_key: "error".to_string(),
            code_key: None,
            token_placement: TokenPlacement::default(),
            token_query_parameter: "access_token".to_string(),
            client_auth: ClientAuth::default(),
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            pkce_method: None,
            headers: BTreeMap::new(),
            profile: ProfileFields::default(),
        }
    }
}

/// Authorization, token, and resource-owner endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Authorization endpoint
    pub authorization: String,
    /// Token endpoint
    pub token: String,
    /// Resource-owner (user info) endpoint
    pub resource_owner: String,
}

impl Endpoints {
    /// All three endpoints
    pub fn new(
        authorization: impl Into<String>,
        token: impl Into<String>,
        resource_owner: impl Into<String>,
    ) -> Self {
        Self {
            authorization: authorization.into(),
            token: token.into(),
            resource_owner: resource_owner.into(),
        }
    }
}

/// Response body decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// JSON object
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` query string
    #[serde(alias = "string", alias = "query")]
    UrlEncoded,
    /// Pick by `Content-Type`, then try JSON, then URL-encoded
    Auto,
}

/// Access token placement on authenticated requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>`
    #[default]
    Header,
    /// Query parameter
    Query,
}

/// Client authentication at the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuth {
    /// `client_id` / `client_secret` in the request parameters
    #[default]
    #[serde(alias = "post")]
    RequestBody,
    /// HTTP Basic authorization header
    Basic,
}

/// Profile field names read by the convenience getters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    /// Email field
    pub email: String,
    /// Display name field
    pub name: String,
    /// Screen name / nickname field
    pub screen_name: String,
}

impl Default for ProfileFields {
    fn default() -> Self {
        Self {
            email: "email".to_string(),
            name: "name".to_string(),
            screen_name: "nickname".to_string(),
        }
    }
}

/// Scopes may arrive as a list or as a single space/comma separated string
fn deserialize_scopes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Ok(s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
        StringOrVec::Vec(v) => Ok(v),
    }
}

impl ProviderConfig {
    /// Configuration with the required fields set and everything else defaulted
    pub fn new(client_id: impl Into<String>, endpoints: Endpoints) -> Self {
        Self {
            client_id: client_id.into(),
            endpoints,
            ..Self::default()
        }
    }

    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or the
    /// result fails [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // OAUTH_CLIENT_ENDPOINTS__TOKEN=... style overrides
        figment = figment.merge(Env::prefixed("OAUTH_CLIENT_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        config.expand_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the construction-time invariants
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming every missing option, or the first
    /// malformed endpoint.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        for (name, url) in self.endpoint_list() {
            if url.trim().is_empty() {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "Required options not defined: {}",
                missing.join(", ")
            )));
        }

        for (name, url) in self.endpoint_list() {
            Url::parse(url)
                .map_err(|e| Error::Configuration(format!("Invalid {name} URL `{url}`: {e}")))?;
        }

        if self.redirect_limit < 1 {
            return Err(Error::Configuration(
                "redirect_limit must be at least 1".to_string(),
            ));
        }

        if self.error_key.is_empty() {
            return Err(Error::Configuration("error_key must not be empty".to_string()));
        }

        Ok(())
    }

    fn endpoint_list(&self) -> [(&'static str, &str); 3] {
        [
            ("endpoints.authorization", &self.endpoints.authorization),
            ("endpoints.token", &self.endpoints.token),
            ("endpoints.resource_owner", &self.endpoints.resource_owner),
        ]
    }

    /// Expand `${VAR}` and `${VAR:-default}` in credentials, redirect URI and headers
    fn expand_env_vars(&mut self) -> Result<()> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| Error::Configuration(e.to_string()))?;

        self.client_id = Self::expand_string(&re, &self.client_id);
        if let Some(secret) = self.client_secret.as_mut() {
            *secret = Self::expand_string(&re, secret);
        }
        if let Some(uri) = self.redirect_uri.as_mut() {
            *uri = Self::expand_string(&re, uri);
        }
        for value in self.headers.values_mut() {
            *value = Self::expand_string(&re, value);
        }
        Ok(())
    }

    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}
