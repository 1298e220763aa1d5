//! Shared test fixtures: a scripted HTTP client and provider builders

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use oauth_client::{
    Endpoints, HttpClient, HttpRequest, HttpResponse, Provider, ProviderConfig, TransportError,
};
use parking_lot::Mutex;
use serde_json::Value;

pub const AUTHORIZE_URL: &str = "https://auth.example.com/oauth/authorize";
pub const TOKEN_URL: &str = "https://auth.example.com/oauth/token";
pub const PROFILE_URL: &str = "https://api.example.com/v1/me";

/// Replays queued responses in order and records every request it sees
#[derive(Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    pub fn push_json(&self, status: u16, body: &Value) -> &Self {
        self.push(json_response(status, body))
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no response queued".to_string())))
    }
}

pub fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("Content-Type", "application/json")
}

pub fn redirect(status: u16, location: &str) -> HttpResponse {
    HttpResponse::new(status, "").with_header("Location", location)
}

pub fn config() -> ProviderConfig {
    ProviderConfig {
        client_secret: Some("mock_secret".to_string()),
        redirect_uri: Some("none".to_string()),
        ..ProviderConfig::new(
            "mock_client_id",
            Endpoints::new(AUTHORIZE_URL, TOKEN_URL, PROFILE_URL),
        )
    }
}

pub fn provider_with(config: ProviderConfig) -> (Provider, Arc<MockHttpClient>) {
    let http = MockHttpClient::new();
    let provider = Provider::new(config, http.clone()).expect("valid test config");
    (provider, http)
}

pub fn provider() -> (Provider, Arc<MockHttpClient>) {
    provider_with(config())
}

/// Decoded form body of a request
pub fn form_body(request: &HttpRequest) -> Vec<(String, String)> {
    serde_urlencoded::from_bytes(request.body.as_deref().unwrap_or_default())
        .expect("form-encoded body")
}

/// Decoded query of a request URL
pub fn query_pairs(url: &str) -> Vec<(String, String)> {
    url::Url::parse(url)
        .expect("absolute url")
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
