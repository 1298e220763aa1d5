//! Ordered request parameters
//!
//! Keys are unique; setting an existing key replaces its value in place, so
//! the encoded order stays deterministic across calls.

use url::form_urlencoded;

/// Ordered, key-unique request parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    /// Empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous value for the key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Builder form of [`set`](Self::set)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when the key is present with a non-empty value
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    /// Overlay `other` on top of `self`; later values win
    #[must_use]
    pub fn merged(mut self, other: Self) -> Self {
        for (k, v) in other.pairs {
            self.set(k, v);
        }
        self
    }

    /// Iterate pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `application/x-www-form-urlencoded` serialization
    #[must_use]
    pub fn to_form_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for RequestParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut params = RequestParams::from([("a", "1"), ("b", "2")]);
        params.set("a", "3");
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn merged_overrides_and_appends() {
        let base = RequestParams::from([("client_id", "id"), ("grant_type", "x")]);
        let merged = base.merged(RequestParams::from([("grant_type", "y"), ("code", "c")]));
        assert_eq!(merged.get("grant_type"), Some("y"));
        assert_eq!(merged.get("code"), Some("c"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn has_value_ignores_empty_strings() {
        let params = RequestParams::from([("code", "")]);
        assert!(!params.has_value("code"));
        assert!(!params.has_value("missing"));
    }

    #[test]
    fn form_encoding_escapes_reserved_characters() {
        let params = RequestParams::from([("scope", "a,b c"), ("redirect_uri", "https://x/cb?y=1")]);
        assert_eq!(
            params.to_form_urlencoded(),
            "scope=a%2Cb+c&redirect_uri=https%3A%2F%2Fx%2Fcb%3Fy%3D1"
        );
    }

    #[test]
    fn remove_returns_value() {
        let mut params = RequestParams::from([("client_secret", "s")]);
        assert_eq!(params.remove("client_secret").as_deref(), Some("s"));
        assert!(params.is_empty());
    }
}
