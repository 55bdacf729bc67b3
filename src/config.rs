//! Configuration types for attachment-tree

use crate::error::{Error, Result};
use crate::types::Layout;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Labels and defaults used when building and editing the tree
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Name of the root node, also the top folder of the archive (default: "Attachments")
    #[serde(default = "default_root_label")]
    pub root_label: String,

    /// Folder name for the main form's attachments (default: "MainForm")
    #[serde(default = "default_main_form_label")]
    pub main_form_label: String,

    /// Folder name for records without a type label (default: "Uncategorized")
    #[serde(default = "default_uncategorized_label")]
    pub uncategorized_label: String,

    /// Prefix of per-row folders in the row-grouped layout (default: "Row", giving "Row 1")
    #[serde(default = "default_row_label_prefix")]
    pub row_label_prefix: String,

    /// Name given to folders created by `add_folder` (default: "New Folder")
    #[serde(default = "default_new_folder_label")]
    pub new_folder_label: String,

    /// Layout used when a session opens (default: row-grouped)
    #[serde(default)]
    pub default_layout: Layout,

    /// Containers at this depth or deeper start collapsed (None = everything expanded)
    #[serde(default = "default_initial_expand_level")]
    pub initial_expand_level: Option<usize>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            root_label: default_root_label(),
            main_form_label: default_main_form_label(),
            uncategorized_label: default_uncategorized_label(),
            row_label_prefix: default_row_label_prefix(),
            new_folder_label: default_new_folder_label(),
            default_layout: Layout::default(),
            initial_expand_level: default_initial_expand_level(),
        }
    }
}

/// Export pipeline behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum content fetches in flight (default: 6, 1 = strictly sequential)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Number of file ids sent per URL-resolution request (default: 50)
    #[serde(default = "default_resolve_batch_size")]
    pub resolve_batch_size: usize,

    /// Treat an export where every file failed as an error (default: false)
    ///
    /// When false the caller still receives the (degenerate) archive made only
    /// of placeholders.
    #[serde(default)]
    pub require_success: bool,

    /// Deflate file contents inside the archive (default: true)
    #[serde(default = "default_true")]
    pub compress: bool,

    /// Prefix of the generated archive file name (default: "attachments")
    #[serde(default = "default_archive_name_prefix")]
    pub archive_name_prefix: String,

    /// Capacity of the export event broadcast channel (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            resolve_batch_size: default_resolve_batch_size(),
            require_success: false,
            compress: true,
            archive_name_prefix: default_archive_name_prefix(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Remote service endpoints used during export
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Endpoint that maps file ids to temporary download URLs
    #[serde(default)]
    pub resolve_url: String,

    /// Per-request timeout applied by the HTTP client (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Header carrying the auth token (default: "Authorization")
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            resolve_url: String::new(),
            request_timeout: default_request_timeout(),
            auth_header: default_auth_header(),
        }
    }
}

/// Notification surface behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoticeConfig {
    /// How long a notice stays visible before it is dismissed (default: 3 seconds)
    #[serde(default = "default_notice_duration", with = "duration_serde")]
    pub display_duration: Duration,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            display_duration: default_notice_duration(),
        }
    }
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration
///
/// Every sub-config has serde defaults, so `{}` is a valid configuration
/// (except that exports need `service.resolve_url` when the HTTP resolver is used).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tree labels and initial layout
    #[serde(default)]
    pub builder: BuilderConfig,

    /// Export pipeline behavior
    #[serde(default)]
    pub export: ExportConfig,

    /// Remote service endpoints
    #[serde(default)]
    pub service: ServiceConfig,

    /// Notification surface
    #[serde(default)]
    pub notices: NoticeConfig,

    /// Retry policy for content fetches
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Check values that would make the pipeline stall or misbehave
    pub fn validate(&self) -> Result<()> {
        if self.export.max_concurrent_fetches == 0 {
            return Err(config_error(
                "max_concurrent_fetches must be at least 1",
                "max_concurrent_fetches",
            ));
        }
        if self.export.resolve_batch_size == 0 {
            return Err(config_error(
                "resolve_batch_size must be at least 1",
                "resolve_batch_size",
            ));
        }
        if self.export.event_capacity == 0 {
            return Err(config_error(
                "event_capacity must be at least 1",
                "event_capacity",
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(config_error(
                "backoff_multiplier must be a finite number of at least 1.0",
                "backoff_multiplier",
            ));
        }
        if self.builder.root_label.trim().is_empty() {
            return Err(config_error("root_label must not be empty", "root_label"));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_root_label() -> String {
    "Attachments".to_string()
}

fn default_main_form_label() -> String {
    "MainForm".to_string()
}

fn default_uncategorized_label() -> String {
    "Uncategorized".to_string()
}

fn default_row_label_prefix() -> String {
    "Row".to_string()
}

fn default_new_folder_label() -> String {
    "New Folder".to_string()
}

fn default_initial_expand_level() -> Option<usize> {
    Some(2)
}

fn default_max_concurrent_fetches() -> usize {
    6
}

fn default_resolve_batch_size() -> usize {
    50
}

fn default_archive_name_prefix() -> String {
    "attachments".to_string()
}

fn default_event_capacity() -> usize {
    256
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_notice_duration() -> Duration {
    Duration::from_secs(3)
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.builder.root_label, "Attachments");
        assert_eq!(config.builder.default_layout, Layout::RowGrouped);
        assert_eq!(config.export.max_concurrent_fetches, 6);
        assert_eq!(config.service.request_timeout, Duration::from_secs(30));
        assert_eq!(config.notices.display_duration, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sub_config_keeps_other_defaults() {
        let json = r#"{
            "builder": { "default_layout": "row_flattened", "uncategorized_label": "Other" },
            "service": { "resolve_url": "https://files.example.com/urls", "request_timeout": 5 }
        }"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.builder.default_layout, Layout::RowFlattened);
        assert_eq!(config.builder.uncategorized_label, "Other");
        assert_eq!(config.builder.main_form_label, "MainForm");
        assert_eq!(config.service.request_timeout, Duration::from_secs(5));
        assert_eq!(config.service.auth_header, "Authorization");
    }

    #[test]
    fn durations_round_trip_as_seconds() {
        let config = Config::default();
        let json = serde_json::to_value(&config).expect("serialize failed");

        assert_eq!(json["notices"]["display_duration"], 3);
        assert_eq!(json["retry"]["max_delay"], 10);
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.export.max_concurrent_fetches = 0;

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_concurrent_fetches"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_unusable_backoff_multiplier() {
        for multiplier in [-1.0, 0.5, f64::NAN, f64::INFINITY] {
            let mut config = Config::default();
            config.retry.backoff_multiplier = multiplier;

            match config.validate() {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some("backoff_multiplier"))
                }
                other => panic!("multiplier {multiplier}: expected config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn validate_rejects_blank_root_label() {
        let mut config = Config::default();
        config.builder.root_label = "   ".to_string();
        assert!(config.validate().is_err());
    }
}
