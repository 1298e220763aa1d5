//! `reqwest` transport
//!
//! Redirects are never followed here: the provider chases `Location`
//! headers itself so it can bound the chain and keep the signed request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use super::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};

/// Build a `reqwest` client suitable for the engine
///
/// Automatic redirects are disabled; the timeout applies to the whole request.
pub fn default_client(timeout: Duration) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(TransportError::from)
}

fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        match (
            key.parse::<HeaderName>(),
            value.parse::<HeaderValue>(),
        ) {
            (Ok(k), Ok(v)) => {
                map.append(k, v);
            }
            _ => warn!(header = %key, "Skipping header that is not valid HTTP"),
        }
    }
    map
}

#[async_trait]
impl HttpClient for Client {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .request(method, &request.url)
            .headers(header_map(&request.headers));
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "HTTP response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_builds() {
        assert!(default_client(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn header_map_skips_invalid_names() {
        let map = header_map(&[
            ("Accept".to_string(), "application/json".to_string()),
            ("bad header".to_string(), "x".to_string()),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn header_map_keeps_repeated_headers() {
        let map = header_map(&[
            ("X-Trace".to_string(), "a".to_string()),
            ("X-Trace".to_string(), "b".to_string()),
        ]);
        assert_eq!(map.get_all("x-trace").iter().count(), 2);
    }
}
