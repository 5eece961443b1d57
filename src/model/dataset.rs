//! Dataset aggregate: the dataset root, its versions and its files
//!
//! Versions are stored oldest first; the last entry is the latest version
//! and is the only one that may be in DRAFT state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use super::collection::CollectionId;

pub type DatasetId = u64;
pub type VersionId = u64;
pub type FileId = u64;

/// Field type name carrying the subject vocabulary terms
pub const SUBJECT_FIELD: &str = "subject";

/// Field type name carrying the dataset title
pub const TITLE_FIELD: &str = "title";

// ============================================================================
// Persistent identifier
// ============================================================================

/// Persistent identifier of a dataset (e.g. `doi:10.5072/FK2ABC123`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalId {
    pub protocol: String,
    pub authority: String,
    #[serde(default = "default_separator")]
    pub separator: String,
    pub identifier: String,
}

fn default_separator() -> String {
    "/".to_string()
}

impl GlobalId {
    pub fn new(
        protocol: impl Into<String>,
        authority: impl Into<String>,
        separator: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            authority: authority.into(),
            separator: separator.into(),
            identifier: identifier.into(),
        }
    }

    /// Identifier without the protocol prefix (`10.5072/FK2ABC123`)
    pub fn without_protocol(&self) -> String {
        format!("{}{}{}", self.authority, self.separator, self.identifier)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.without_protocol())
    }
}

/// Registration status of the persistent identifier with an external registrar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Registration {
    #[default]
    Unregistered,
    Registered { at: DateTime<Utc> },
}

impl Registration {
    pub fn is_registered(&self) -> bool {
        matches!(self, Registration::Registered { .. })
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Registration::Registered { at } => Some(*at),
            Registration::Unregistered => None,
        }
    }
}

// ============================================================================
// Versions
// ============================================================================

/// Lifecycle state of a dataset version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    Draft,
    Released,
    Deaccessioned,
}

/// One metadata field of a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetField {
    pub type_name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub controlled_vocabulary: Vec<String>,
}

impl DatasetField {
    pub fn text(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            values: vec![value.into()],
            controlled_vocabulary: Vec::new(),
        }
    }

    pub fn vocabulary<I, S>(type_name: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            values: Vec::new(),
            controlled_vocabulary: terms.into_iter().map(Into::into).collect(),
        }
    }
}

/// Terms of use and access attached to a version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsOfUse {
    #[serde(default)]
    pub file_access_request: bool,
}

/// A snapshot of dataset metadata. Immutable once released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersion {
    pub id: VersionId,
    #[serde(default)]
    pub major: u64,
    #[serde(default)]
    pub minor: u64,
    pub state: VersionState,
    #[serde(default)]
    pub release_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub in_review: bool,
    #[serde(default)]
    pub fields: Vec<DatasetField>,
    #[serde(default)]
    pub file_ids: BTreeSet<FileId>,
    #[serde(default)]
    pub terms: TermsOfUse,
}

impl DatasetVersion {
    /// New, empty draft version
    pub fn draft(id: VersionId) -> Self {
        Self {
            id,
            major: 0,
            minor: 0,
            state: VersionState::Draft,
            release_time: None,
            last_update_time: None,
            in_review: false,
            fields: Vec::new(),
            file_ids: BTreeSet::new(),
            terms: TermsOfUse::default(),
        }
    }

    pub fn is_draft(&self) -> bool {
        self.state == VersionState::Draft
    }

    pub fn is_released(&self) -> bool {
        self.state == VersionState::Released
    }

    pub fn is_deaccessioned(&self) -> bool {
        self.state == VersionState::Deaccessioned
    }

    /// Human-readable version number ("1.2", or "DRAFT")
    pub fn friendly_number(&self) -> String {
        if self.is_draft() {
            "DRAFT".to_string()
        } else {
            format!("{}.{}", self.major, self.minor)
        }
    }

    pub fn field(&self, type_name: &str) -> Option<&DatasetField> {
        self.fields.iter().find(|f| f.type_name == type_name)
    }

    pub fn title(&self) -> Option<&str> {
        self.field(TITLE_FIELD)
            .and_then(|f| f.values.first())
            .map(String::as_str)
    }

    /// Controlled-vocabulary terms of the subject field
    pub fn subject_terms(&self) -> Vec<String> {
        self.field(SUBJECT_FIELD)
            .map(|f| f.controlled_vocabulary.clone())
            .unwrap_or_default()
    }
}

// ============================================================================
// Files
// ============================================================================

/// Per-version metadata of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub version_id: VersionId,
    pub label: String,
    #[serde(default)]
    pub restricted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFile {
    pub id: FileId,
    /// Set once, on the first release that includes the file
    #[serde(default)]
    pub publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub metadata: Option<FileMetadata>,
}

impl DataFile {
    pub fn new(id: FileId, metadata: FileMetadata) -> Self {
        Self {
            id,
            publication_date: None,
            restricted: false,
            metadata: Some(metadata),
        }
    }

    pub fn is_published(&self) -> bool {
        self.publication_date.is_some()
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Aggregate root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: DatasetId,
    pub global_id: GlobalId,
    #[serde(default)]
    pub registration: Registration,
    #[serde(default)]
    pub publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub release_user: Option<String>,
    #[serde(default)]
    pub modification_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_export_time: Option<DateTime<Utc>>,
    pub owner: CollectionId,
    pub versions: Vec<DatasetVersion>,
    #[serde(default)]
    pub files: Vec<DataFile>,
    #[serde(default)]
    pub file_access_request: bool,
}

impl Dataset {
    /// New unpublished dataset holding a single draft version
    pub fn new(id: DatasetId, global_id: GlobalId, owner: CollectionId, draft: DatasetVersion) -> Self {
        Self {
            id,
            global_id,
            registration: Registration::Unregistered,
            publication_date: None,
            release_user: None,
            modification_time: None,
            last_export_time: None,
            owner,
            versions: vec![draft],
            files: Vec::new(),
            file_access_request: false,
        }
    }

    pub fn latest_version(&self) -> Option<&DatasetVersion> {
        self.versions.last()
    }

    /// The draft version being edited, if the latest version is a draft
    pub fn edit_version(&self) -> Option<&DatasetVersion> {
        self.latest_version().filter(|v| v.is_draft())
    }

    pub fn edit_version_mut(&mut self) -> Option<&mut DatasetVersion> {
        self.versions.last_mut().filter(|v| v.is_draft())
    }

    /// Most recent RELEASED version
    pub fn released_version(&self) -> Option<&DatasetVersion> {
        self.versions.iter().rev().find(|v| v.is_released())
    }

    /// Most recent version that received a number (RELEASED or DEACCESSIONED)
    pub fn last_numbered_version(&self) -> Option<&DatasetVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.is_released() || v.is_deaccessioned())
    }

    /// Version immediately preceding the latest one
    pub fn previous_version(&self) -> Option<&DatasetVersion> {
        let len = self.versions.len();
        if len < 2 {
            return None;
        }
        self.versions.get(len - 2)
    }

    pub fn has_prior_publication(&self) -> bool {
        self.publication_date.is_some()
    }

    /// Whether the draft may be released as a minor version.
    ///
    /// Not eligible when the preceding version was deaccessioned, or when
    /// the draft's file set differs from the released version's.
    pub fn is_minor_update_eligible(&self) -> bool {
        let Some(latest) = self.latest_version() else {
            return false;
        };

        if latest.is_draft()
            && let Some(previous) = self.previous_version()
            && previous.is_deaccessioned()
        {
            return false;
        }

        match self.released_version() {
            Some(released) => released.file_ids == latest.file_ids,
            None => true,
        }
    }

    /// Storage location relative to a cache root (`<authority>/<identifier>`)
    ///
    /// `None` when either part is empty, absolute or contains `..`, since
    /// the result would not stay below the root.
    pub fn storage_path(&self) -> Option<PathBuf> {
        let authority = Path::new(&self.global_id.authority);
        let identifier = Path::new(&self.global_id.identifier);
        if !is_plain_relative(authority) || !is_plain_relative(identifier) {
            return None;
        }
        Some(authority.join(identifier))
    }

    /// Short label used in log lines and error messages
    pub fn label(&self) -> String {
        self.global_id.to_string()
    }
}

fn is_plain_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(id: VersionId, state: VersionState, files: &[FileId]) -> DatasetVersion {
        DatasetVersion {
            state,
            file_ids: files.iter().copied().collect(),
            ..DatasetVersion::draft(id)
        }
    }

    fn dataset_with(versions: Vec<DatasetVersion>) -> Dataset {
        let mut dataset = Dataset::new(
            7,
            GlobalId::new("doi", "10.5072", "/", "FK2ABC"),
            1,
            DatasetVersion::draft(0),
        );
        dataset.versions = versions;
        dataset
    }

    #[test]
    fn test_global_id_display() {
        let id = GlobalId::new("doi", "10.5072", "/", "FK2ABC");
        assert_eq!(id.to_string(), "doi:10.5072/FK2ABC");
        assert_eq!(id.without_protocol(), "10.5072/FK2ABC");
    }

    #[test]
    fn test_registration_serialization() {
        let json = serde_json::to_string(&Registration::Unregistered).unwrap();
        assert_eq!(json, r#"{"status":"unregistered"}"#);

        let registered: Registration =
            serde_json::from_str(r#"{"status":"registered","at":"2024-01-02T03:04:05Z"}"#).unwrap();
        assert!(registered.is_registered());
        assert!(registered.registered_at().is_some());
    }

    #[test]
    fn test_edit_version_only_for_draft() {
        let dataset = dataset_with(vec![version(1, VersionState::Released, &[])]);
        assert!(dataset.edit_version().is_none());
        assert!(dataset.released_version().is_some());

        let dataset = dataset_with(vec![
            version(1, VersionState::Released, &[]),
            version(2, VersionState::Draft, &[]),
        ]);
        assert_eq!(dataset.edit_version().map(|v| v.id), Some(2));
        assert_eq!(dataset.released_version().map(|v| v.id), Some(1));
    }

    #[test]
    fn test_minor_eligible_without_release() {
        let dataset = dataset_with(vec![version(1, VersionState::Draft, &[10])]);
        assert!(dataset.is_minor_update_eligible());
    }

    #[test]
    fn test_minor_not_eligible_when_files_changed() {
        let dataset = dataset_with(vec![
            version(1, VersionState::Released, &[10]),
            version(2, VersionState::Draft, &[10, 11]),
        ]);
        assert!(!dataset.is_minor_update_eligible());
    }

    #[test]
    fn test_minor_eligible_with_same_files() {
        let dataset = dataset_with(vec![
            version(1, VersionState::Released, &[10, 11]),
            version(2, VersionState::Draft, &[10, 11]),
        ]);
        assert!(dataset.is_minor_update_eligible());
    }

    #[test]
    fn test_minor_not_eligible_after_deaccession() {
        let dataset = dataset_with(vec![
            version(1, VersionState::Released, &[10]),
            version(2, VersionState::Deaccessioned, &[10]),
            version(3, VersionState::Draft, &[10]),
        ]);
        assert!(!dataset.is_minor_update_eligible());
    }

    #[test]
    fn test_subject_terms() {
        let mut draft = DatasetVersion::draft(1);
        draft.fields.push(DatasetField::text(TITLE_FIELD, "Survey"));
        draft
            .fields
            .push(DatasetField::vocabulary(SUBJECT_FIELD, ["law", "cs"]));

        assert_eq!(draft.title(), Some("Survey"));
        assert_eq!(draft.subject_terms(), vec!["law", "cs"]);
    }

    #[test]
    fn test_storage_path() {
        let dataset = dataset_with(vec![version(1, VersionState::Draft, &[])]);
        assert_eq!(dataset.storage_path(), Some(PathBuf::from("10.5072").join("FK2ABC")));
    }

    #[test]
    fn test_storage_path_stays_below_root() {
        let mut dataset = dataset_with(vec![version(1, VersionState::Draft, &[])]);

        dataset.global_id.identifier = "FK2/ABC".to_string();
        assert_eq!(
            dataset.storage_path(),
            Some(PathBuf::from("10.5072").join("FK2").join("ABC"))
        );

        for identifier in ["../../etc", "FK2/../../x", "/tmp/x", ""] {
            dataset.global_id.identifier = identifier.to_string();
            assert_eq!(dataset.storage_path(), None, "identifier {:?}", identifier);
        }

        dataset.global_id.identifier = "FK2ABC".to_string();
        dataset.global_id.authority = "..".to_string();
        assert_eq!(dataset.storage_path(), None);
    }

    #[test]
    fn test_last_numbered_version_includes_deaccessioned() {
        let mut deaccessioned = version(1, VersionState::Deaccessioned, &[10]);
        deaccessioned.major = 1;
        let dataset = dataset_with(vec![deaccessioned, version(2, VersionState::Draft, &[10])]);

        assert!(dataset.released_version().is_none());
        let numbered = dataset.last_numbered_version().unwrap();
        assert_eq!((numbered.id, numbered.major), (1, 1));
    }
}
