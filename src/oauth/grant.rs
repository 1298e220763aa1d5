//! Grant types
//!
//! Each grant knows its `grant_type` wire name, the parameters it cannot do
//! without, and how to turn a token response into an [`AccessToken`].
//! Grants are resolved by name through a [`GrantRegistry`] built once per
//! provider.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use super::params::RequestParams;
use super::token::AccessToken;
use crate::{Error, Result};

/// Wire name of the device authorization grant (RFC 8628)
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extension grant defined by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomGrant {
    name: String,
    required: Vec<String>,
}

impl CustomGrant {
    /// Grant with the given `grant_type` value and required parameter names
    pub fn new<I, S>(name: impl Into<String>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// `grant_type` value
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Grant kinds understood by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// `authorization_code`; requires `code`, accepts `code_verifier`
    AuthorizationCode,
    /// `client_credentials`
    ClientCredentials,
    /// `password`; requires `username` and `password`
    Password,
    /// `refresh_token`; requires `refresh_token`
    RefreshToken,
    /// Device authorization grant; requires `device_code`
    DeviceCode,
    /// Caller-defined extension grant
    Custom(CustomGrant),
}

impl Grant {
    /// `grant_type` wire value
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::Password => "password",
            Self::RefreshToken => "refresh_token",
            Self::DeviceCode => DEVICE_CODE_GRANT_TYPE,
            Self::Custom(custom) => &custom.name,
        }
    }

    /// Parameters that must be present with a non-empty value
    #[must_use]
    pub fn required_parameters(&self) -> Vec<&str> {
        match self {
            Self::AuthorizationCode => vec!["code"],
            Self::ClientCredentials => vec![],
            Self::Password => vec!["username", "password"],
            Self::RefreshToken => vec!["refresh_token"],
            Self::DeviceCode => vec!["device_code"],
            Self::Custom(custom) => custom.required.iter().map(String::as_str).collect(),
        }
    }

    /// Merge caller parameters over the defaults, stamp `grant_type`, and
    /// check the required set
    pub fn prepare_request_parameters(
        &self,
        defaults: RequestParams,
        params: RequestParams,
    ) -> Result<RequestParams> {
        let provided = defaults
            .with("grant_type", self.name())
            .merged(params);

        if let Some(missing) = self
            .required_parameters()
            .into_iter()
            .find(|name| !provided.has_value(name))
        {
            return Err(Error::MissingParameter(missing.to_string()));
        }

        Ok(provided)
    }

    /// Build the access token from a successful, error-checked token response
    pub fn create_access_token(
        &self,
        response: Map<String, Value>,
        owner_id_key: Option<&str>,
    ) -> Result<AccessToken> {
        AccessToken::from_fields(response, owner_id_key)
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A grant chosen by name or passed pre-built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantSelector {
    /// Resolve through the registry
    Name(String),
    /// Use as-is
    Grant(Grant),
}

impl From<&str> for GrantSelector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for GrantSelector {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Grant> for GrantSelector {
    fn from(grant: Grant) -> Self {
        Self::Grant(grant)
    }
}

impl From<CustomGrant> for GrantSelector {
    fn from(grant: CustomGrant) -> Self {
        Self::Grant(Grant::Custom(grant))
    }
}

/// Name-to-grant lookup table
#[derive(Debug, Clone)]
pub struct GrantRegistry {
    grants: HashMap<String, Grant>,
}

impl Default for GrantRegistry {
    fn default() -> Self {
        let mut grants = HashMap::new();
        for grant in [
            Grant::AuthorizationCode,
            Grant::ClientCredentials,
            Grant::Password,
            Grant::RefreshToken,
            Grant::DeviceCode,
        ] {
            grants.insert(grant.name().to_string(), grant);
        }
        grants.insert("device_code".to_string(), Grant::DeviceCode);
        Self { grants }
    }
}

impl GrantRegistry {
    /// Registry holding the built-in grants
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a custom grant under its wire name
    pub fn register(&mut self, grant: CustomGrant) {
        self.grants.insert(grant.name.clone(), Grant::Custom(grant));
    }

    /// Grant registered under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Grant> {
        self.grants.get(name)
    }

    /// Turn a selector into a grant
    pub fn resolve(&self, selector: GrantSelector) -> Result<Grant> {
        match selector {
            GrantSelector::Name(name) => self
                .get(&name)
                .cloned()
                .ok_or(Error::UnknownGrant(name)),
            GrantSelector::Grant(Grant::Custom(custom)) if custom.name.is_empty() => {
                Err(Error::UnknownGrant(String::new()))
            }
            GrantSelector::Grant(grant) => Ok(grant),
        }
    }
}
