use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Rate, batching and per-attempt settings for one dispatch.
///
/// `batch_size` is clamped to `requests_per_second` on construction, a batch can never
/// exceed one second's quota.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "DispatchConfigFile")]
pub struct DispatchConfig {
    requests_per_second: u32,
    batch_size: u32,
    repetitions: u32,
    timeout_seconds: u64,
    include_response_body: bool,
    correlation_id: Option<Arc<str>>,
}

impl DispatchConfig {
    pub fn new(
        requests_per_second: u32,
        batch_size: u32,
        repetitions: u32,
    ) -> Result<Self, ConfigError> {
        if requests_per_second == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if batch_size == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if repetitions == 0 {
            return Err(ConfigError::ZeroRepetitions);
        }
        Ok(Self {
            requests_per_second,
            batch_size: batch_size.min(requests_per_second),
            repetitions,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            include_response_body: false,
            correlation_id: None,
        })
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Result<Self, ConfigError> {
        if timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.timeout_seconds = timeout_seconds;
        Ok(self)
    }

    #[must_use]
    pub fn with_response_body(mut self, include_response_body: bool) -> Self {
        self.include_response_body = include_response_body;
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<Arc<str>>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    #[inline]
    #[must_use]
    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    #[inline]
    #[must_use]
    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    #[inline]
    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[inline]
    #[must_use]
    pub fn include_response_body(&self) -> bool {
        self.include_response_body
    }

    #[inline]
    #[must_use]
    pub fn correlation_id(&self) -> Option<&Arc<str>> {
        self.correlation_id.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn total_attempts(&self) -> usize {
        self.requests_per_second as usize * self.repetitions as usize
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DispatchConfigFile {
    requests_per_second: u32,
    #[serde(default = "one")]
    batch_size: u32,
    #[serde(default = "one")]
    repetitions: u32,
    #[serde(default = "default_timeout")]
    timeout_seconds: u64,
    #[serde(default)]
    include_response_body: bool,
    #[serde(default)]
    correlation_id: Option<String>,
}

fn one() -> u32 {
    1
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl TryFrom<DispatchConfigFile> for DispatchConfig {
    type Error = ConfigError;

    fn try_from(file: DispatchConfigFile) -> Result<Self, Self::Error> {
        let cfg = DispatchConfig::new(file.requests_per_second, file.batch_size, file.repetitions)?
            .with_timeout_seconds(file.timeout_seconds)?
            .with_response_body(file.include_response_body);
        Ok(match file.correlation_id {
            Some(id) => cfg.with_correlation_id(id),
            None => cfg,
        })
    }
}

/// Knobs for [`crate::HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportOptions {
    pub decompress: bool,
    pub connect_timeout_seconds: Option<u64>,
    pub pool_idle_timeout_seconds: u64,
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            decompress: true,
            connect_timeout_seconds: None,
            pool_idle_timeout_seconds: 90,
            pool_max_idle_per_host: None,
        }
    }
}
