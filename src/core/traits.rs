//! Ports consumed by the publish workflow
//!
//! Every external collaborator (persistence, identifier registrars, search
//! index, notifications, export rendering, file cache) is reached through one
//! of these traits. Implementations are injected into the orchestrator once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{
    ExportError, IndexError, NotificationError, RegistrarError, StorageError,
};
use crate::export::VersionDocument;
use crate::model::{
    Assignee, AuthenticatedUser, Collection, CollectionId, Dataset, DatasetId, DvObjectRef,
    NotificationType, RoleAssignment, VersionId, VersionUserRecord,
};

// ============================================================================
// Persistence
// ============================================================================

/// Save/merge access to datasets and version-user records
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn find_dataset(&self, id: DatasetId) -> Result<Option<Dataset>, StorageError>;

    /// Merge the aggregate and return the stored state
    async fn merge_dataset(&self, dataset: Dataset) -> Result<Dataset, StorageError>;

    async fn find_version_user(
        &self,
        version_id: VersionId,
        user_identifier: &str,
    ) -> Result<Option<VersionUserRecord>, StorageError>;

    async fn merge_version_user(
        &self,
        record: VersionUserRecord,
    ) -> Result<VersionUserRecord, StorageError>;
}

/// Read-only lookups and subject merges over the collection tree
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    async fn find_collection(&self, id: CollectionId) -> Result<Option<Collection>, StorageError>;

    async fn merge_collection(&self, collection: Collection) -> Result<Collection, StorageError>;
}

// ============================================================================
// Settings
// ============================================================================

/// Key/value installation settings
pub trait SettingsLookup: Send + Sync {
    fn get_value(&self, key: &str, default: &str) -> String;
}

// ============================================================================
// Identifier registrars
// ============================================================================

/// Persistent-identifier provider (EZID, DataCite, ...)
#[async_trait]
pub trait IdentifierRegistrar: Send + Sync {
    /// Provider name (e.g. "EZID", "DataCite")
    fn name(&self) -> &str;

    /// False for a misconfigured provider; no call may be attempted then
    fn is_supported(&self) -> bool {
        true
    }

    fn supports_protocol(&self, protocol: &str) -> bool;

    /// Providers that cannot report a collision on create check first
    fn checks_existence_before_create(&self) -> bool {
        false
    }

    /// Whether identifiers must be made public after release
    fn requires_publicize(&self) -> bool {
        true
    }

    /// Reserve the dataset's identifier. A collision is reported as
    /// `RegistrarError::AlreadyExists`.
    async fn create_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError>;

    async fn identifier_exists(&self, dataset: &Dataset) -> Result<bool, RegistrarError>;

    /// Make the identifier publicly resolvable
    async fn publicize_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError>;
}

/// Generator of fresh local identifiers
#[async_trait]
pub trait IdentifierSequence: Send + Sync {
    async fn generate(
        &self,
        protocol: &str,
        authority: &str,
        separator: &str,
    ) -> Result<String, StorageError>;
}

/// Durable counters behind an identifier sequence
#[async_trait]
pub trait SequenceCounterStore: Send + Sync {
    /// Current value of the counter for `scope` (initialised to `start`),
    /// advancing the counter by one
    async fn next_sequence_value(&self, scope: &str, start: u64) -> Result<u64, StorageError>;
}

// ============================================================================
// Search index
// ============================================================================

/// Response of a permission indexing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResponse {
    pub message: String,
}

#[async_trait]
pub trait SearchIndexer: Send + Sync {
    async fn index_dataset(&self, dataset: &Dataset, cleanup: bool) -> Result<(), IndexError>;

    async fn index_collection(&self, collection: &Collection) -> Result<(), IndexError>;

    async fn index_permissions(&self, entity: DvObjectRef) -> Result<IndexResponse, IndexError>;
}

// ============================================================================
// Roles and notifications
// ============================================================================

#[async_trait]
pub trait RoleAssigneeResolver: Send + Sync {
    /// Role assignments defined directly on `entity`
    async fn direct_role_assignments(
        &self,
        entity: DvObjectRef,
    ) -> Result<Vec<RoleAssignment>, StorageError>;

    async fn resolve_assignee(&self, identifier: &str) -> Result<Option<Assignee>, StorageError>;

    /// Concrete account holders behind an assignee, without duplicates
    async fn expand_to_account_holders(
        &self,
        assignee: &Assignee,
    ) -> Result<Vec<AuthenticatedUser>, StorageError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        recipient: &AuthenticatedUser,
        timestamp: DateTime<Utc>,
        event: NotificationType,
        subject: DvObjectRef,
    ) -> Result<(), NotificationError>;
}

// ============================================================================
// Export
// ============================================================================

/// Renders a version document into a named export format
pub trait ExportRenderer: Send + Sync {
    fn render(&self, document: &VersionDocument, format: &str) -> Result<Vec<u8>, ExportError>;
}

/// Best-effort side cache on a filesystem
#[async_trait]
pub trait FileSystemCache: Send + Sync {
    async fn ensure_directory(&self, path: &Path) -> std::io::Result<()>;

    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;
}

