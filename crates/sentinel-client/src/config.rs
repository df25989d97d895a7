//! Client configuration.

use std::time::Duration;

use sentinel_models::Feature;

use crate::error::{SessionError, SessionResult};

/// Configuration for the engine client and job sessions.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the analysis engine
    pub base_url: String,
    /// Timeout for poll and stop requests
    pub request_timeout: Duration,
    /// Timeout for the multipart start request (covers the upload)
    pub upload_timeout: Duration,
    /// Consecutive poll failures before a job is marked failed
    pub poll_failure_threshold: u32,
    /// Poll period for mask detection
    pub mask_poll_interval: Duration,
    /// Poll period for people counting
    pub count_poll_interval: Duration,
    /// Poll period for plate detection
    pub plate_poll_interval: Duration,
    /// Largest file the upload gate will stage
    pub max_upload_bytes: u64,
    /// Webhook receiving completion notifications
    pub notify_webhook: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(300), // large videos
            poll_failure_threshold: 5,
            mask_poll_interval: Feature::Mask.default_poll_interval(),
            count_poll_interval: Feature::PeopleCount.default_poll_interval(),
            plate_poll_interval: Feature::Plate.default_poll_interval(),
            max_upload_bytes: 500 * 1024 * 1024,
            notify_webhook: None,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_url: std::env::var("SENTINEL_ENGINE_URL").unwrap_or(defaults.base_url),
            request_timeout: Duration::from_secs(
                std::env::var("SENTINEL_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            upload_timeout: Duration::from_secs(
                std::env::var("SENTINEL_UPLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            poll_failure_threshold: std::env::var("SENTINEL_POLL_FAILURE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.poll_failure_threshold),
            mask_poll_interval: env_millis("SENTINEL_MASK_POLL_MS")
                .unwrap_or(defaults.mask_poll_interval),
            count_poll_interval: env_millis("SENTINEL_COUNT_POLL_MS")
                .unwrap_or(defaults.count_poll_interval),
            plate_poll_interval: env_millis("SENTINEL_PLATE_POLL_MS")
                .unwrap_or(defaults.plate_poll_interval),
            max_upload_bytes: std::env::var("SENTINEL_MAX_UPLOAD_MB")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_upload_bytes),
            notify_webhook: std::env::var("SENTINEL_NOTIFY_WEBHOOK")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Override the engine base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Poll period for a feature.
    pub fn poll_interval(&self, feature: Feature) -> Duration {
        match feature {
            Feature::Mask => self.mask_poll_interval,
            Feature::PeopleCount => self.count_poll_interval,
            Feature::Plate => self.plate_poll_interval,
        }
    }

    /// Reject settings that would make a session misbehave.
    pub fn validate(&self) -> SessionResult<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| SessionError::config(format!("invalid engine URL {}: {}", self.base_url, e)))?;

        if self.poll_failure_threshold == 0 {
            return Err(SessionError::config("poll failure threshold must be at least 1"));
        }

        if self.max_upload_bytes == 0 {
            return Err(SessionError::config("upload size limit must be greater than zero"));
        }

        for feature in Feature::ALL {
            if self.poll_interval(feature).is_zero() {
                return Err(SessionError::config(format!(
                    "poll interval for {} must be non-zero",
                    feature
                )));
            }
        }

        Ok(())
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.poll_interval(Feature::Plate), Duration::from_millis(100));
        assert_eq!(config.poll_interval(Feature::PeopleCount), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let config = ClientConfig::default().with_base_url("not a url");
        assert!(config.validate().is_err());

        let config = ClientConfig {
            poll_failure_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            mask_poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
