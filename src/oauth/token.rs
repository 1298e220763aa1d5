//! Access token value object

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Largest `expires` value still read as a relative offset.
///
/// Publication date of the OAuth 2.0 draft (2012-10-01). Anything above it is
/// taken to be an absolute, possibly past, Unix timestamp.
pub const EXPIRES_TIMESTAMP_THRESHOLD: i64 = 1_349_067_600;

/// Bearer token returned by a successful grant.
///
/// Immutable: refreshing produces a new instance. Fields the provider sent
/// beyond the standard ones are kept in [`values`](Self::values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct AccessToken {
    access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,

    /// Absolute expiry (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    resource_owner_id: Option<String>,

    #[serde(flatten)]
    values: Map<String, Value>,
}

impl AccessToken {
    /// Token with no refresh token, expiry or extra values
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(Error::MissingParameter("access_token".to_string()));
        }
        Ok(Self {
            access_token,
            refresh_token: None,
            expires: None,
            resource_owner_id: None,
            values: Map::new(),
        })
    }

    /// Build a token from a parsed token response or a serialized token.
    ///
    /// `owner_id_key` names the response field holding the resource owner id;
    /// an explicit `resource_owner_id` field always wins.
    pub fn from_fields(fields: Map<String, Value>, owner_id_key: Option<&str>) -> Result<Self> {
        Self::from_fields_at(fields, owner_id_key, Utc::now().timestamp())
    }

    /// [`from_fields`](Self::from_fields) with an explicit "now" (Unix seconds)
    pub fn from_fields_at(
        mut fields: Map<String, Value>,
        owner_id_key: Option<&str>,
        now: i64,
    ) -> Result<Self> {
        let access_token = match fields.remove("access_token") {
            Some(Value::String(token)) if !token.is_empty() => token,
            _ => return Err(Error::MissingParameter("access_token".to_string())),
        };

        let refresh_token = fields.remove("refresh_token").and_then(|v| value_to_string(&v));

        let resource_owner_id = match fields.remove("resource_owner_id") {
            Some(v) if !v.is_null() => value_to_string(&v),
            _ => owner_id_key
                .and_then(|key| lookup_path(&fields, key))
                .and_then(value_to_string),
        };

        let expires_in = fields.remove("expires_in");
        let expires = fields.remove("expires");
        let expires = match expires_in {
            Some(v) if !v.is_null() => {
                let secs = value_to_i64(&v).ok_or_else(|| {
                    Error::invalid_parameter("expires_in", "must be an integer")
                })?;
                (secs != 0).then(|| now.saturating_add(secs))
            }
            _ => expires
                .as_ref()
                .and_then(value_to_i64)
                .filter(|&v| v != 0)
                .map(|v| {
                    if v > EXPIRES_TIMESTAMP_THRESHOLD {
                        v
                    } else {
                        now.saturating_add(v)
                    }
                }),
        };

        Ok(Self {
            access_token,
            refresh_token,
            expires,
            resource_owner_id,
            values: fields,
        })
    }

    /// Bearer token string
    #[must_use]
    pub fn token(&self) -> &str {
        &self.access_token
    }

    /// Refresh token, if issued
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Absolute expiry in Unix seconds, if known
    #[must_use]
    pub fn expires(&self) -> Option<i64> {
        self.expires
    }

    /// Absolute expiry as a timestamp, if known
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Resource owner id supplied with the token, if any
    #[must_use]
    pub fn resource_owner_id(&self) -> Option<&str> {
        self.resource_owner_id.as_deref()
    }

    /// Additional fields from the token response
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Whether the expiry has passed. Tokens without an expiry never expire.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.expires
            .is_some_and(|expires| expires <= Utc::now().timestamp())
    }

    /// Whether the token expires within `leeway` from now
    #[must_use]
    pub fn expires_within(&self, leeway: Duration) -> bool {
        let leeway = i64::try_from(leeway.as_secs()).unwrap_or(i64::MAX);
        self.expires
            .is_some_and(|expires| expires <= Utc::now().timestamp().saturating_add(leeway))
    }

    /// Time until expiry; `None` when unknown or already expired
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        self.expires
            .filter(|&expires| expires > now)
            .and_then(|expires| u64::try_from(expires - now).ok())
            .map(Duration::from_secs)
    }

    /// Same token with a different refresh token
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl TryFrom<Map<String, Value>> for AccessToken {
    type Error = Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self> {
        Self::from_fields(fields, None)
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.access_token)
    }
}

/// Value at `key`: the exact key first, then a dotted path into nested objects
pub(crate) fn lookup_path<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    let mut parts = key.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Strings as-is, numbers and booleans stringified; null, empty and structured values dropped
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integers, truncated floats, and numeric strings
#[allow(clippy::cast_possible_truncation)]
fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn requires_access_token() {
        let err = AccessToken::from_fields(fields(json!({"expires_in": 10})), None).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(p) if p == "access_token"));

        let err = AccessToken::from_fields(fields(json!({"access_token": ""})), None).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(_)));

        assert!(AccessToken::new("").is_err());
    }

    #[test]
    fn expires_in_is_relative_to_now() {
        let token =
            AccessToken::from_fields_at(fields(json!({"access_token": "T", "expires_in": 3600})), None, NOW)
                .unwrap();
        assert_eq!(token.expires(), Some(NOW + 3600));
    }

    #[test]
    fn expires_in_accepts_numeric_strings() {
        let token = AccessToken::from_fields_at(
            fields(json!({"access_token": "T", "expires_in": "120"})),
            None,
            NOW,
        )
        .unwrap();
        assert_eq!(token.expires(), Some(NOW + 120));
    }

    #[test]
    fn expires_in_rejects_non_numeric() {
        let err = AccessToken::from_fields_at(
            fields(json!({"access_token": "T", "expires_in": "soon"})),
            None,
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name, .. } if name == "expires_in"));
    }

    #[test]
    fn expires_in_zero_means_unknown() {
        let token =
            AccessToken::from_fields_at(fields(json!({"access_token": "T", "expires_in": 0})), None, NOW)
                .unwrap();
        assert_eq!(token.expires(), None);
        assert!(!token.has_expired());
    }

    #[test]
    fn expires_in_takes_precedence_over_expires() {
        let token = AccessToken::from_fields_at(
            fields(json!({"access_token": "T", "expires_in": 60, "expires": 1_800_000_000})),
            None,
            NOW,
        )
        .unwrap();
        assert_eq!(token.expires(), Some(NOW + 60));
    }

    #[test]
    fn small_expires_is_treated_as_offset() {
        let token =
            AccessToken::from_fields_at(fields(json!({"access_token": "T", "expires": 300})), None, NOW)
                .unwrap();
        assert_eq!(token.expires(), Some(NOW + 300));
    }

    #[test]
    fn timestamp_expires_is_not_offset_again() {
        let past = 1_400_000_000;
        let token =
            AccessToken::from_fields_at(fields(json!({"access_token": "T", "expires": past})), None, NOW)
                .unwrap();
        assert_eq!(token.expires(), Some(past));
        assert!(token.has_expired());
    }

    #[test]
    fn threshold_boundary_is_relative() {
        let token = AccessToken::from_fields_at(
            fields(json!({"access_token": "T", "expires": EXPIRES_TIMESTAMP_THRESHOLD})),
            None,
            0,
        )
        .unwrap();
        assert_eq!(token.expires(), Some(EXPIRES_TIMESTAMP_THRESHOLD));

        let token = AccessToken::from_fields_at(
            fields(json!({"access_token": "T", "expires": EXPIRES_TIMESTAMP_THRESHOLD})),
            None,
            10,
        )
        .unwrap();
        assert_eq!(token.expires(), Some(EXPIRES_TIMESTAMP_THRESHOLD + 10));
    }

    #[test]
    fn owner_id_from_configured_key() {
        let token = AccessToken::from_fields(
            fields(json!({"access_token": "T", "user_id": 42})),
            Some("user_id"),
        )
        .unwrap();
        assert_eq!(token.resource_owner_id(), Some("42"));
        // The source field stays available
        assert_eq!(token.values().get("user_id"), Some(&json!(42)));
    }

    #[test]
    fn extra_fields_are_kept() {
        let token = AccessToken::from_fields(
            fields(json!({"access_token": "T", "token_type": "bearer", "scope": "a b"})),
            None,
        )
        .unwrap();
        assert_eq!(token.values().get("scope"), Some(&json!("a b")));
        assert!(token.values().get("access_token").is_none());
    }

    // =========================================================================
    // Expiry queries
    // =========================================================================

    #[test]
    fn expiry_queries() {
        let token = AccessToken::from_fields(fields(json!({"access_token": "T", "expires_in": 3600})), None)
            .unwrap();
        assert!(!token.has_expired());
        assert!(token.expires_within(Duration::from_secs(7200)));
        assert!(!token.expires_within(Duration::from_secs(60)));
        let remaining = token.expires_in().unwrap();
        assert!(remaining <= Duration::from_secs(3600));
        assert!(remaining >= Duration::from_secs(3590));
        assert_eq!(token.expires_at().map(|t| t.timestamp()), token.expires());
    }

    #[test]
    fn no_expiry_never_expires() {
        let token = AccessToken::new("T").unwrap();
        assert!(!token.has_expired());
        assert!(!token.expires_within(Duration::from_secs(1_000_000)));
        assert!(token.expires_in().is_none());
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn serialized_form_round_trips() {
        let token = AccessToken::from_fields(
            fields(json!({
                "access_token": "T",
                "refresh_token": "R",
                "expires_in": 3600,
                "uid": "u-1",
                "scope": "read"
            })),
            Some("uid"),
        )
        .unwrap();

        let json = serde_json::to_string(&token).unwrap();
        let restored: AccessToken = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.token(), "T");
        assert_eq!(restored.refresh_token(), Some("R"));
        assert_eq!(restored.expires(), token.expires());
        assert_eq!(restored.resource_owner_id(), Some("u-1"));
        assert_eq!(restored, token);
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let value = serde_json::to_value(AccessToken::new("T").unwrap()).unwrap();
        assert_eq!(value, json!({"access_token": "T"}));
    }

    #[test]
    fn nested_resource_owner_id_key() {
        let token = AccessToken::from_fields_at(
            fields(json!({"access_token": "T", "user": {"id": 42}})),
            Some("user.id"),
            NOW,
        )
        .unwrap();
        assert_eq!(token.resource_owner_id(), Some("42"));
        assert_eq!(token.values().get("user"), Some(&json!({"id": 42})));
    }

    #[test]
    fn display_is_bare_token() {
        assert_eq!(AccessToken::new("abc").unwrap().to_string(), "abc");
    }

    #[test]
    fn with_refresh_token_replaces() {
        let token = AccessToken::new("T").unwrap().with_refresh_token("R2");
        assert_eq!(token.refresh_token(), Some("R2"));
    }
}
