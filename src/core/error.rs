//! Error handling for dataset publication
//!
//! `PublishError` separates pure rejections (nothing durable happened) from
//! partial states where the release is already persisted but a later step
//! failed. Port errors are structured so the workflow never has to inspect
//! message text.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::retry::Retryable;
use crate::core::state_machine::ReleaseState;
use crate::model::{Dataset, DatasetId};

// ============================================================================
// Port errors
// ============================================================================

/// Errors reported by an identifier registrar provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrarError {
    #[error("[{provider}] identifier {identifier} already exists")]
    AlreadyExists { provider: String, identifier: String },

    #[error("[{provider}] provider does not support protocol '{protocol}'")]
    UnsupportedProvider { provider: String, protocol: String },

    #[error("[{provider}] request rejected{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Rejected {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("[{provider}] service unavailable (HTTP {status})")]
    Unavailable { provider: String, status: u16 },

    #[error("[{provider}] network error: {message}")]
    Network { provider: String, message: String },

    #[error("[{provider}] no response within {after:?}")]
    Timeout { provider: String, after: Duration },
}

impl RegistrarError {
    pub fn provider(&self) -> &str {
        match self {
            Self::AlreadyExists { provider, .. }
            | Self::UnsupportedProvider { provider, .. }
            | Self::Rejected { provider, .. }
            | Self::Unavailable { provider, .. }
            | Self::Network { provider, .. }
            | Self::Timeout { provider, .. } => provider,
        }
    }
}

impl Retryable for RegistrarError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Network { .. } | Self::Timeout { .. }
        )
    }
}

/// Errors reported by the persistence and repository ports
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("concurrent modification of {entity}: {message}")]
    Conflict { entity: String, message: String },

    #[error("inconsistent stored data: {message}")]
    Corrupt { message: String },

    #[error("storage backend failure: {message}")]
    Backend { message: String },
}

/// Errors reported by the search indexer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("indexing {target} rejected: {message}")]
    Rejected { target: String, message: String },

    #[error("search index unavailable while indexing {target}: {message}")]
    Unavailable { target: String, message: String },

    #[error("indexing {target} timed out after {after:?}")]
    Timeout { target: String, after: Duration },
}

impl Retryable for IndexError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Errors raised while rendering or caching a metadata export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export format '{format}' is not supported")]
    UnsupportedFormat { format: String },

    #[error("failed to render {format} export: {message}")]
    Render { format: String, message: String },

    #[error("failed to serialize export document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write export cache at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset has no version to export")]
    MissingVersion,

    #[error("identifier of {dataset} does not map to a path below the cache root")]
    UnsafePath { dataset: String },
}

/// Error raised by a notification sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to notify {recipient}: {message}")]
pub struct NotificationError {
    pub recipient: String,
    pub message: String,
}

// ============================================================================
// Workflow error
// ============================================================================

/// Main error type of the publish command
#[derive(Error, Debug)]
pub enum PublishError {
    // Precondition errors
    #[error("dataset {dataset} may not be published because its host collection '{collection}' has not been published")]
    CollectionNotPublished { dataset: String, collection: String },

    #[error("latest version of dataset {dataset} is already released; only draft versions can be released")]
    AlreadyReleased { dataset: String },

    #[error("dataset {dataset} cannot be released as a minor version; retry as a major release")]
    InvalidMinorRelease { dataset: String },

    // Identifier registration errors
    #[error("identifier provider '{provider}' is not supported for protocol '{protocol}'")]
    UnsupportedProvider { provider: String, protocol: String },

    #[error("identifier {identifier} is already in use by another dataset")]
    IdentifierCollision { identifier: String },

    #[error("identifier registration failed: {source}")]
    RegistrarCreate {
        #[source]
        source: RegistrarError,
    },

    // Storage errors
    #[error("dataset {id} not found")]
    DatasetNotFound { id: DatasetId },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    // Partial states (release already persisted)
    #[error("dataset {} was published locally but its identifier is not yet publicly resolvable: {source}", .dataset.label())]
    RegistrarPublicize {
        dataset: Box<Dataset>,
        #[source]
        source: RegistrarError,
    },

    #[error("dataset {} was published but the version user record could not be saved: {source}", .dataset.label())]
    RecordVersionUser {
        dataset: Box<Dataset>,
        #[source]
        source: StorageError,
    },

    #[error("dataset {} was published but search index synchronization failed for {}: {source}", .dataset.label(), .failed_targets.join(", "))]
    IndexSync {
        dataset: Box<Dataset>,
        failed_targets: Vec<String>,
        #[source]
        source: IndexError,
    },

    // Internal errors
    #[error("invalid release state transition {from:?} -> {to:?}")]
    InvalidTransition { from: ReleaseState, to: ReleaseState },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PublishError {
    /// True when the release is durable but a later step failed
    pub fn is_partial_state(&self) -> bool {
        self.published_dataset().is_some()
    }

    /// The persisted dataset, for partial-state errors
    pub fn published_dataset(&self) -> Option<&Dataset> {
        match self {
            Self::RegistrarPublicize { dataset, .. }
            | Self::RecordVersionUser { dataset, .. }
            | Self::IndexSync { dataset, .. } => Some(dataset),
            _ => None,
        }
    }

    /// Check if the caller can fix the cause and retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::CollectionNotPublished { .. }
            | Self::AlreadyReleased { .. }
            | Self::InvalidMinorRelease { .. }
            | Self::UnsupportedProvider { .. }
            | Self::Config(_) => true,
            Self::RegistrarCreate { source } => source.is_retryable(),
            Self::IdentifierCollision { .. }
            | Self::DatasetNotFound { .. }
            | Self::Storage(_)
            | Self::RegistrarPublicize { .. }
            | Self::RecordVersionUser { .. }
            | Self::IndexSync { .. }
            | Self::InvalidTransition { .. } => false,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::CollectionNotPublished { .. } => {
                vec!["Publish the host collection (and its parents) first"]
            }
            Self::AlreadyReleased { .. } => {
                vec!["Create a new draft version before publishing again"]
            }
            Self::InvalidMinorRelease { .. } => vec![
                "Retry as a major release",
                "Minor releases require the same file set as the released version",
            ],
            Self::UnsupportedProvider { .. } => vec![
                "Set :DoiProvider to EZID, DataCite or none",
                "Check the dataset protocol",
            ],
            Self::IdentifierCollision { .. } => {
                vec!["Contact support: the identifier is already in use"]
            }
            Self::RegistrarCreate { .. } => vec![
                "Check the registrar credentials",
                "Check the registrar service status and retry",
            ],
            Self::DatasetNotFound { .. } => vec!["Check the dataset id"],
            Self::Storage(_) => vec!["Check the database and retry"],
            Self::RegistrarPublicize { .. } => vec![
                "The dataset is published locally",
                "Re-run identifier publicization once the registrar is reachable",
            ],
            Self::RecordVersionUser { .. } => {
                vec!["The dataset is published; the contributor record can be repaired later"]
            }
            Self::IndexSync { .. } => vec![
                "The dataset is published",
                "Re-index the listed targets",
            ],
            Self::InvalidTransition { .. } => vec!["Report this as a bug"],
            Self::Config(_) => vec!["Check .dataset-publisher.yaml"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::CollectionNotPublished { .. } => "COLLECTION_NOT_PUBLISHED",
            Self::AlreadyReleased { .. } => "ALREADY_RELEASED",
            Self::InvalidMinorRelease { .. } => "INVALID_MINOR_RELEASE",
            Self::UnsupportedProvider { .. } => "UNSUPPORTED_PROVIDER",
            Self::IdentifierCollision { .. } => "IDENTIFIER_COLLISION",
            Self::RegistrarCreate { .. } => "REGISTRAR_CREATE_FAILED",
            Self::DatasetNotFound { .. } => "DATASET_NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::RegistrarPublicize { .. } => "REGISTRAR_PUBLICIZE_FAILED",
            Self::RecordVersionUser { .. } => "VERSION_USER_RECORD_FAILED",
            Self::IndexSync { .. } => "INDEX_SYNC_FAILED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetVersion, GlobalId};

    fn dataset() -> Dataset {
        Dataset::new(
            1,
            GlobalId::new("doi", "10.5072", "/", "FK2AAA"),
            1,
            DatasetVersion::draft(1),
        )
    }

    #[test]
    fn test_precondition_errors_are_recoverable() {
        let error = PublishError::CollectionNotPublished {
            dataset: "doi:10.5072/FK2AAA".to_string(),
            collection: "econ".to_string(),
        };

        assert!(error.is_recoverable());
        assert!(!error.is_partial_state());
        assert_eq!(error.code(), "COLLECTION_NOT_PUBLISHED");
        assert!(error.to_string().contains("econ"));
    }

    #[test]
    fn test_collision_is_not_recoverable() {
        let error = PublishError::IdentifierCollision {
            identifier: "doi:10.5072/FK2AAA".to_string(),
        };

        assert!(!error.is_recoverable());
        assert_eq!(error.code(), "IDENTIFIER_COLLISION");
    }

    #[test]
    fn test_registrar_create_recoverable_only_when_transient() {
        let timeout = PublishError::RegistrarCreate {
            source: RegistrarError::Timeout {
                provider: "EZID".to_string(),
                after: Duration::from_secs(5),
            },
        };
        assert!(timeout.is_recoverable());

        let rejected = PublishError::RegistrarCreate {
            source: RegistrarError::Rejected {
                provider: "EZID".to_string(),
                status: Some(401),
                message: "unauthorized".to_string(),
            },
        };
        assert!(!rejected.is_recoverable());
        assert!(rejected.to_string().contains("HTTP 401"));
    }

    #[test]
    fn test_partial_state_errors_carry_dataset() {
        let error = PublishError::RegistrarPublicize {
            dataset: Box::new(dataset()),
            source: RegistrarError::Network {
                provider: "DataCite".to_string(),
                message: "connection reset".to_string(),
            },
        };

        assert!(error.is_partial_state());
        assert_eq!(error.published_dataset().map(|d| d.id), Some(1));
        assert!(error.to_string().contains("published locally"));
        assert!(error.suggested_actions().len() >= 2);
    }

    #[test]
    fn test_index_sync_lists_failed_targets() {
        let error = PublishError::IndexSync {
            dataset: Box::new(dataset()),
            failed_targets: vec!["dataset#1".to_string(), "collection#2".to_string()],
            source: IndexError::Unavailable {
                target: "dataset#1".to_string(),
                message: "503".to_string(),
            },
        };

        let message = error.to_string();
        assert!(message.contains("dataset#1, collection#2"));
        assert_eq!(error.code(), "INDEX_SYNC_FAILED");
    }

    #[test]
    fn test_storage_error_conversion() {
        let error: PublishError = StorageError::Backend {
            message: "disk full".to_string(),
        }
        .into();

        assert_eq!(error.code(), "STORAGE_ERROR");
        assert!(!error.is_partial_state());
    }

    #[test]
    fn test_retryable_port_errors() {
        assert!(
            RegistrarError::Unavailable {
                provider: "EZID".to_string(),
                status: 503
            }
            .is_retryable()
        );
        assert!(
            !RegistrarError::AlreadyExists {
                provider: "EZID".to_string(),
                identifier: "x".to_string()
            }
            .is_retryable()
        );
        assert!(
            IndexError::Timeout {
                target: "dataset#1".to_string(),
                after: Duration::from_secs(1)
            }
            .is_retryable()
        );
    }
}
