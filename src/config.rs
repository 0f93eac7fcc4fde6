//! Library-level fetch configuration.
//!
//! Every policy knob of the fetch loop lives here so callers (and tests)
//! can move thresholds and endpoints without touching the pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::constants::{
    ACCEPT_LENGTH_THRESHOLD, DEFAULT_CONFIRM_BASE_URL, DEFAULT_REFERER, MAX_REDIRECTS,
    MIN_PLAUSIBLE_FILE_SIZE, REQUEST_TIMEOUT_SECS,
};
use crate::fetch::endpoint::REDACTED;
use crate::fetch::{EndpointStrategy, TransportSettings};

/// Default storage directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "videos";

/// Environment variable consulted for the drive API key.
pub const API_KEY_ENV: &str = "DRIVEFETCH_API_KEY";

/// Configuration for a [`DriveFetcher`](crate::DriveFetcher).
///
/// `Debug` output masks the API key.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Directory that receives temporary and final files.
    pub output_dir: PathBuf,
    /// Stored files smaller than this are re-read as error pages.
    pub min_file_size: u64,
    /// Declared length above which a 200 response is accepted as content.
    pub accept_length_threshold: u64,
    /// Time allowed until response headers arrive.
    pub request_timeout: Duration,
    /// Maximum redirects followed per request.
    pub max_redirects: usize,
    /// Key for the drive REST endpoint; the endpoint is skipped without one.
    pub api_key: Option<String>,
    /// Base for relative confirmation links.
    pub confirm_base_url: String,
    /// Referer header sent with every request.
    pub referer: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            min_file_size: MIN_PLAUSIBLE_FILE_SIZE,
            accept_length_threshold: ACCEPT_LENGTH_THRESHOLD,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_redirects: MAX_REDIRECTS,
            api_key: None,
            confirm_base_url: DEFAULT_CONFIRM_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("output_dir", &self.output_dir)
            .field("min_file_size", &self.min_file_size)
            .field("accept_length_threshold", &self.accept_length_threshold)
            .field("request_timeout", &self.request_timeout)
            .field("max_redirects", &self.max_redirects)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("confirm_base_url", &self.confirm_base_url)
            .field("referer", &self.referer)
            .finish()
    }
}

impl FetchConfig {
    /// Creates a default configuration storing into `output_dir`.
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Transport settings derived from this configuration.
    #[must_use]
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            request_timeout: self.request_timeout,
            max_redirects: self.max_redirects,
            referer: self.referer.clone(),
        }
    }

    /// The default endpoint chain for this configuration.
    #[must_use]
    pub fn endpoint_strategy(&self) -> EndpointStrategy {
        EndpointStrategy::google_drive(self.api_key.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_policy() {
        let config = FetchConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("videos"));
        assert_eq!(config.min_file_size, 1000);
        assert_eq!(config.accept_length_threshold, 100_000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 10);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_endpoint_strategy_follows_api_key() {
        let mut config = FetchConfig::with_output_dir("/tmp/out");
        assert_eq!(config.endpoint_strategy().len(), 2);
        config.api_key = Some("k".to_string());
        assert_eq!(config.endpoint_strategy().len(), 3);
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = FetchConfig {
            api_key: Some("SEKRET-KEY-123".to_string()),
            ..FetchConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("SEKRET"), "got: {rendered}");
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_transport_settings_copy_fields() {
        let config = FetchConfig {
            request_timeout: Duration::from_secs(5),
            max_redirects: 3,
            ..FetchConfig::default()
        };
        let settings = config.transport_settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_redirects, 3);
    }
}
