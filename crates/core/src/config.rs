use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9200;
pub const DEFAULT_PER_PAGE: u32 = 100;
pub const DEFAULT_PER_PAGE_MAX: u32 = 500;
pub const DEFAULT_SCROLL_TTL: &str = "2m";
pub const DEFAULT_SCROLL_TRIGGER: u64 = 10_000;
pub const DEFAULT_BULK_BATCH_SIZE: usize = 5_000;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECONDS: f64 = 5.0;

/// Every option the client recognises. Unknown keys are rejected when the
/// configuration is deserialised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Overrides the port-based scheme selection.
    pub scheme: Option<String>,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub per_page: u32,
    pub per_page_max: u32,
    pub slow_query_threshold_seconds: Option<f64>,
    pub scroll_ttl: String,
    pub scroll_trigger: u64,
    pub bulk_batch_size: usize,
    pub strict: bool,
    pub timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            scheme: None,
            index: None,
            doc_type: None,
            per_page: DEFAULT_PER_PAGE,
            per_page_max: DEFAULT_PER_PAGE_MAX,
            slow_query_threshold_seconds: None,
            scroll_ttl: DEFAULT_SCROLL_TTL.to_string(),
            scroll_trigger: DEFAULT_SCROLL_TRIGGER,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
            strict: true,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_seconds: f64,
    pub accepted_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_seconds: DEFAULT_RETRY_DELAY_SECONDS,
            accepted_statuses: vec![200, 201],
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, SearchError> {
        let config: ClientConfig = serde_json::from_str(raw)
            .map_err(|error| SearchError::Configuration(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.host.trim().is_empty() {
            return Err(invalid("host must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port must be non-zero"));
        }
        if let Some(scheme) = &self.scheme {
            if scheme != "http" && scheme != "https" {
                return Err(invalid(format!("unsupported scheme {scheme}")));
            }
        }
        if self.per_page == 0 {
            return Err(invalid("per_page must be positive"));
        }
        if self.per_page_max == 0 {
            return Err(invalid("per_page_max must be positive"));
        }
        if self.scroll_ttl.trim().is_empty() {
            return Err(invalid("scroll_ttl must not be empty"));
        }
        if self.bulk_batch_size == 0 {
            return Err(invalid("bulk_batch_size must be positive"));
        }
        if let Some(threshold) = self.slow_query_threshold_seconds {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(invalid("slow_query_threshold_seconds must be a non-negative number"));
            }
        }
        self.retry.validate()
    }

    pub fn scheme(&self) -> &str {
        match self.scheme.as_deref() {
            Some(scheme) => scheme,
            None if self.port == 443 => "https",
            None => "http",
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.port)
    }

    /// Page size after clamping to `per_page_max`.
    pub fn effective_per_page(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.per_page).min(self.per_page_max)
    }

    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.slow_query_threshold_seconds.map(Duration::from_secs_f64)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if !self.delay_seconds.is_finite() || self.delay_seconds < 0.0 {
            return Err(invalid("retry.delay_seconds must be a non-negative number"));
        }
        if self.accepted_statuses.is_empty() {
            return Err(invalid("retry.accepted_statuses must not be empty"));
        }
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_seconds)
    }
}

fn invalid(message: impl Into<String>) -> SearchError {
    SearchError::Configuration(message.into())
}
