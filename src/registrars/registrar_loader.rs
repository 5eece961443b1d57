//! Registrar Loader - Selects the identifier registrar once at startup
//!
//! The provider is named by the `:DoiProvider` setting. Unknown names, and
//! known providers without credentials, load as an `UnsupportedRegistrar`
//! so that publication of unregistered datasets fails before any network
//! call.
//!
//! # Example
//!
//! ```no_run
//! use dataset_publisher::core::PublishConfig;
//! use dataset_publisher::registrars::RegistrarLoader;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), dataset_publisher::core::PublishError> {
//! let config = PublishConfig::default();
//! let registrar = RegistrarLoader::new(Duration::from_secs(30)).load_from_settings(&config, None)?;
//!
//! println!("Using registrar {}", registrar.name());
//! # Ok(())
//! # }
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::datacite::DataCiteRegistrar;
use super::ezid::EzidRegistrar;
use super::null_registrar::{NullRegistrar, UnsupportedRegistrar};
use crate::core::config::{DOI_PROVIDER_SETTING, RegistrarConfig};
use crate::core::error::PublishError;
use crate::core::traits::{IdentifierRegistrar, SettingsLookup};

/// Registrar provider kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrarKind {
    Ezid,
    DataCite,
    None,
    Unsupported(String),
}

impl RegistrarKind {
    /// Parse the `:DoiProvider` setting value
    pub fn from_setting(value: &str) -> Self {
        match value.trim() {
            "EZID" => RegistrarKind::Ezid,
            "DataCite" => RegistrarKind::DataCite,
            "none" => RegistrarKind::None,
            other => RegistrarKind::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RegistrarKind::Ezid => "EZID",
            RegistrarKind::DataCite => "DataCite",
            RegistrarKind::None => "none",
            RegistrarKind::Unsupported(name) => name,
        }
    }
}

/// Loader for identifier registrars
pub struct RegistrarLoader {
    timeout: Duration,
}

impl RegistrarLoader {
    /// # Arguments
    ///
    /// * `timeout` - Request deadline for provider HTTP calls
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Load the registrar named by the `:DoiProvider` setting
    pub fn load_from_settings(
        &self,
        settings: &dyn SettingsLookup,
        config: Option<&RegistrarConfig>,
    ) -> Result<Arc<dyn IdentifierRegistrar>, PublishError> {
        let kind = RegistrarKind::from_setting(&settings.get_value(DOI_PROVIDER_SETTING, ""));
        self.load(kind, config)
    }

    /// Load a registrar for a specific provider kind
    ///
    /// # Errors
    ///
    /// `PublishError::Config` if the HTTP client cannot be built
    pub fn load(
        &self,
        kind: RegistrarKind,
        config: Option<&RegistrarConfig>,
    ) -> Result<Arc<dyn IdentifierRegistrar>, PublishError> {
        let defaults = RegistrarConfig::default();
        let config = config.unwrap_or(&defaults);
        let template = config.target_url_template();

        let registrar: Arc<dyn IdentifierRegistrar> = match &kind {
            RegistrarKind::Ezid => match &config.ezid {
                Some(ezid) => Arc::new(
                    EzidRegistrar::new(ezid, template, self.timeout)
                        .map_err(|e| PublishError::Config(format!("EZID client: {}", e)))?,
                ),
                None => {
                    warn!("EZID selected but registrar.ezid is not configured");
                    Arc::new(UnsupportedRegistrar::new(kind.as_str()))
                }
            },
            RegistrarKind::DataCite => match &config.datacite {
                Some(datacite) => Arc::new(
                    DataCiteRegistrar::new(datacite, template, self.timeout)
                        .map_err(|e| PublishError::Config(format!("DataCite client: {}", e)))?,
                ),
                None => {
                    warn!("DataCite selected but registrar.datacite is not configured");
                    Arc::new(UnsupportedRegistrar::new(kind.as_str()))
                }
            },
            RegistrarKind::None => Arc::new(NullRegistrar::new()),
            RegistrarKind::Unsupported(name) => {
                warn!("Identifier provider '{}' is not supported", name);
                Arc::new(UnsupportedRegistrar::new(name.clone()))
            }
        };

        info!("Identifier registrar: {}", registrar.name());
        Ok(registrar)
    }
}
