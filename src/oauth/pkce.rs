//! PKCE (RFC 7636)

use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Code challenge method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    /// Challenge equals the verifier
    #[serde(rename = "plain")]
    Plain,
    /// Challenge is base64url(SHA-256(verifier))
    #[serde(alias = "s256")]
    S256,
}

impl PkceMethod {
    /// Value of `code_challenge_method`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }

    /// Derive the challenge for a verifier
    #[must_use]
    pub fn challenge(self, verifier: &str) -> String {
        match self {
            Self::Plain => verifier.to_string(),
            Self::S256 => {
                let mut hasher = Sha256::new();
                hasher.update(verifier.as_bytes());
                URL_SAFE_NO_PAD.encode(hasher.finalize())
            }
        }
    }
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PkceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" | "s256" => Ok(Self::S256),
            other => Err(format!("unsupported PKCE method: {other}")),
        }
    }
}

/// Verifier and its derived challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    /// Secret the caller keeps until the token exchange
    pub verifier: String,
    /// Value sent in the authorization request
    pub challenge: String,
    /// Method used to derive the challenge
    pub method: PkceMethod,
}

impl PkceChallenge {
    /// Fresh random verifier (32 bytes, 43 base64url characters)
    #[must_use]
    pub fn generate(method: PkceMethod) -> Self {
        let verifier_bytes: [u8; 32] = rand::rng().random();
        Self::from_verifier(URL_SAFE_NO_PAD.encode(verifier_bytes), method)
    }

    /// Challenge for a caller-chosen verifier
    #[must_use]
    pub fn from_verifier(verifier: impl Into<String>, method: PkceMethod) -> Self {
        let verifier = verifier.into();
        let challenge = method.challenge(&verifier);
        Self {
            verifier,
            challenge,
            method,
        }
    }
}

/// Random CSRF state, 16 bytes base64url-encoded
pub(crate) fn generate_state() -> String {
    let state_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(state_bytes)
}
