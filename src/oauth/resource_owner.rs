//! Resource owner profile

use serde::Serialize;
use serde_json::{Map, Value};

use super::token::{lookup_path, value_to_string};
use crate::{Error, Result};

/// Read-only view over the profile returned by the resource-owner endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceOwner {
    #[serde(flatten)]
    data: Map<String, Value>,
    #[serde(skip)]
    id_key: String,
}

impl ResourceOwner {
    /// Wrap parsed profile data; `id_key` may be a dotted path such as `data.id`
    pub fn new(data: Map<String, Value>, id_key: impl Into<String>) -> Self {
        Self {
            data,
            id_key: id_key.into(),
        }
    }

    /// Resource owner identifier.
    ///
    /// Numeric ids are stringified. A missing id means the configured id key
    /// does not match what the provider sends.
    pub fn id(&self) -> Result<String> {
        self.get(&self.id_key)
            .and_then(value_to_string)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "resource owner id field `{}` not found in profile response",
                    self.id_key
                ))
            })
    }

    /// Configured id field name
    #[must_use]
    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    /// Value at `key`. Exact keys are tried first, then dotted paths into nested objects.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup_path(&self.data, key)
    }

    /// String (or stringified scalar) at `key`
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_string)
    }

    /// Raw profile data
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Consume into the raw profile data
    #[must_use]
    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }
}
