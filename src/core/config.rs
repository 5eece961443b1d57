//! Configuration structures for dataset-publisher
//!
//! Sections are optional so that layered files can be merged section by
//! section; accessors fall back to defaults.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::retry::RetryOptions;
use crate::core::traits::SettingsLookup;

/// Setting that selects the identifier registrar provider
pub const DOI_PROVIDER_SETTING: &str = ":DoiProvider";

/// Root configuration object
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishConfig {
    /// Schema version
    #[serde(default)]
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(default)]
    pub extends: Option<String>,

    /// Installation settings (`:DoiProvider`, ...)
    #[serde(default)]
    pub settings: HashMap<String, String>,

    #[serde(default)]
    pub registrar: Option<RegistrarConfig>,

    #[serde(default)]
    pub export: Option<ExportConfig>,

    #[serde(default)]
    pub timeouts: Option<TimeoutConfig>,

    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl PublishConfig {
    pub fn export(&self) -> ExportConfig {
        self.export.clone().unwrap_or_default()
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        self.timeouts.clone().unwrap_or_default()
    }

    pub fn retry_options(&self) -> RetryOptions {
        self.retry.clone().unwrap_or_default().into()
    }

    /// Configured provider name, empty when unset
    pub fn doi_provider(&self) -> String {
        self.get_value(DOI_PROVIDER_SETTING, "")
    }
}

impl SettingsLookup for PublishConfig {
    fn get_value(&self, key: &str, default: &str) -> String {
        self.settings
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

// ============================================================================
// Registrar
// ============================================================================

/// Identifier registrar configuration
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrarConfig {
    #[serde(default)]
    pub ezid: Option<EzidConfig>,

    #[serde(default)]
    pub datacite: Option<DataCiteConfig>,

    /// Prefix of generated local identifiers (default: "FK2")
    #[serde(default)]
    pub shoulder: Option<String>,

    /// First value of the identifier sequence (default: 1)
    #[serde(default)]
    pub sequence_start: Option<u64>,

    /// Landing page URL; `{pid}` is replaced with the identifier
    #[serde(default)]
    pub target_url_template: Option<String>,
}

impl RegistrarConfig {
    pub fn shoulder(&self) -> String {
        self.shoulder.clone().unwrap_or_else(|| "FK2".to_string())
    }

    pub fn sequence_start(&self) -> u64 {
        self.sequence_start.unwrap_or(1)
    }

    pub fn target_url_template(&self) -> String {
        self.target_url_template
            .clone()
            .unwrap_or_else(|| "https://localhost/dataset.xhtml?persistentId={pid}".to_string())
    }
}

/// EZID account
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EzidConfig {
    #[serde(default = "default_ezid_url")]
    pub base_url: String,
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

fn default_ezid_url() -> String {
    "https://ezid.cdlib.org".to_string()
}

/// DataCite REST API account
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCiteConfig {
    #[serde(default = "default_datacite_url")]
    pub base_url: String,
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    #[serde(default = "default_publisher")]
    pub publisher: String,
}

fn default_datacite_url() -> String {
    "https://api.test.datacite.org".to_string()
}

fn default_publisher() -> String {
    "Dataverse".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(SecretString::new(value.into()))
}

// ============================================================================
// Export, timeouts, retry
// ============================================================================

/// Metadata export cache settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_export_format")]
    pub format: String,
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: default_export_format(),
            cache_root: default_cache_root(),
            extension: default_extension(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_export_format() -> String {
    "ddi".to_string()
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("./export-cache")
}

fn default_extension() -> String {
    "xml".to_string()
}

/// Deadlines for blocking network calls
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    #[serde(default = "default_registrar_secs")]
    pub registrar_secs: u64,
    #[serde(default = "default_index_secs")]
    pub index_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            registrar_secs: default_registrar_secs(),
            index_secs: default_index_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn registrar(&self) -> Duration {
        Duration::from_secs(self.registrar_secs)
    }

    pub fn index(&self) -> Duration {
        Duration::from_secs(self.index_secs)
    }
}

fn default_registrar_secs() -> u64 {
    30
}

fn default_index_secs() -> u64 {
    60
}

/// Backoff for post-release network calls
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_multiplier(),
        }
    }
}

impl From<RetryConfig> for RetryOptions {
    fn from(config: RetryConfig) -> Self {
        RetryOptions {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}
