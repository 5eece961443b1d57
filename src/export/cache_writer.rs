//! Export & cache writer
//!
//! Renders the version being released and stores it in the side cache at
//! `<cacheRoot>/<authority>/<identifier>/export_<format>.<ext>`. Failures
//! are logged and reported in the outcome; they never abort a release.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::document::VersionDocument;
use crate::core::config::ExportConfig;
use crate::core::error::ExportError;
use crate::core::traits::{ExportRenderer, FileSystemCache};
use crate::model::Dataset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExportOutcome {
    Written { path: PathBuf },
    Skipped { reason: String },
    Failed { error: String },
}

impl ExportOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, ExportOutcome::Written { .. })
    }
}

pub struct ExportCacheWriter {
    renderer: Arc<dyn ExportRenderer>,
    cache: Arc<dyn FileSystemCache>,
    config: ExportConfig,
}

impl ExportCacheWriter {
    pub fn new(
        renderer: Arc<dyn ExportRenderer>,
        cache: Arc<dyn FileSystemCache>,
        config: ExportConfig,
    ) -> Self {
        Self {
            renderer,
            cache,
            config,
        }
    }

    /// Cache file of a dataset for the configured format
    pub fn cache_path(&self, dataset: &Dataset) -> Result<PathBuf, ExportError> {
        let relative = dataset.storage_path().ok_or_else(|| ExportError::UnsafePath {
            dataset: dataset.label(),
        })?;
        Ok(self
            .config
            .cache_root
            .join(relative)
            .join(format!("export_{}.{}", self.config.format, self.config.extension)))
    }

    /// Export the latest version; `last_export_time` moves to `now` only on success
    pub async fn write_export(&self, dataset: &mut Dataset, now: DateTime<Utc>) -> ExportOutcome {
        if !self.config.enabled {
            return ExportOutcome::Skipped {
                reason: "export disabled".to_string(),
            };
        }

        match self.try_write(dataset).await {
            Ok(path) => {
                dataset.last_export_time = Some(now);
                info!("Cached {} export of {} at {}", self.config.format, dataset.label(), path.display());
                ExportOutcome::Written { path }
            }
            Err(e) => {
                warn!("Export of {} failed: {}", dataset.label(), e);
                ExportOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_write(&self, dataset: &Dataset) -> Result<PathBuf, ExportError> {
        let document = VersionDocument::from_latest(dataset)?;
        let bytes = self.renderer.render(&document, &self.config.format)?;

        let path = self.cache_path(dataset)?;
        if let Some(directory) = path.parent() {
            self.cache
                .ensure_directory(directory)
                .await
                .map_err(|source| ExportError::Io {
                    path: directory.to_path_buf(),
                    source,
                })?;
        }
        self.cache
            .write_bytes(&path, &bytes)
            .await
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}
