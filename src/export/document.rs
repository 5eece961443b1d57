//! Structured export document of one dataset version

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::error::ExportError;
use crate::model::{Dataset, DatasetField, DatasetVersion, FileId, VersionState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDocument {
    pub persistent_id: String,
    pub protocol: String,
    pub authority: String,
    pub identifier: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub version: VersionSummary,
    pub title: Option<String>,
    pub subjects: Vec<String>,
    pub fields: Vec<DatasetField>,
    pub files: Vec<FileEntry>,
    pub file_access_request: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub major: u64,
    pub minor: u64,
    pub state: VersionState,
    pub release_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: FileId,
    pub label: String,
    pub restricted: bool,
}

impl VersionDocument {
    /// Document for the latest version of `dataset`
    pub fn from_latest(dataset: &Dataset) -> Result<Self, ExportError> {
        let version = dataset.latest_version().ok_or(ExportError::MissingVersion)?;
        Ok(Self::build(dataset, version))
    }

    pub fn build(dataset: &Dataset, version: &DatasetVersion) -> Self {
        let files = dataset
            .files
            .iter()
            .filter(|f| version.file_ids.contains(&f.id))
            .map(|f| FileEntry {
                id: f.id,
                label: f
                    .metadata
                    .as_ref()
                    .map(|m| m.label.clone())
                    .unwrap_or_else(|| format!("file-{}", f.id)),
                restricted: f.restricted,
            })
            .collect();

        Self {
            persistent_id: dataset.label(),
            protocol: dataset.global_id.protocol.clone(),
            authority: dataset.global_id.authority.clone(),
            identifier: dataset.global_id.identifier.clone(),
            publication_date: dataset.publication_date,
            version: VersionSummary {
                major: version.major,
                minor: version.minor,
                state: version.state,
                release_time: version.release_time,
            },
            title: version.title().map(str::to_string),
            subjects: version.subject_terms(),
            fields: version.fields.clone(),
            files,
            file_access_request: version.terms.file_access_request,
        }
    }
}
