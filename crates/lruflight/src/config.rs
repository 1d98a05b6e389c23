// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Validated cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::eviction::EvictionPolicy;
use crate::{Error, Result};

/// Longest accepted time-to-live; keeps every computed expiry representable.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Size and expiry options for an [`LruCache`][crate::LruCache].
///
/// A zero `max` means the cache is unbounded and a zero `ttl` means entries never
/// expire; both are the defaults.
///
/// In documents `ttl` is given in milliseconds and unknown keys are rejected.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use lruflight::CacheConfig;
///
/// let config = CacheConfig::from_json(r#"{ "max": 100, "ttl": 1500 }"#)?;
/// assert_eq!(config.max, 100);
/// assert_eq!(config.ttl, Duration::from_millis(1500));
/// # Ok::<(), lruflight::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of entries; `0` disables the bound.
    pub max: u64,

    /// Time after which an entry becomes stale; zero disables expiry.
    #[serde(with = "millis")]
    pub ttl: Duration,
}

impl CacheConfig {
    /// Parses a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is malformed, contains an
    /// unknown key, or holds a negative, fractional or non-numeric value.
    pub fn from_json(document: &str) -> Result<Self> {
        serde_json::from_str(document).map_err(Error::config_document)
    }

    pub(crate) fn validate(&self) -> Result<EvictionPolicy> {
        let max = usize::try_from(self.max)
            .map_err(|error| Error::config(format!("max of {} entries is not addressable: {error}", self.max)))?;

        if self.ttl > MAX_TTL {
            return Err(Error::config(format!(
                "ttl of {:?} exceeds the longest supported ttl of {MAX_TTL:?}",
                self.ttl
            )));
        }

        let ttl = (!self.ttl.is_zero()).then_some(self.ttl);
        Ok(EvictionPolicy::new(NonZeroUsize::new(max), ttl))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
