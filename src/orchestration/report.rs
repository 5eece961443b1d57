//! Publish report returned alongside the released dataset

use serde::Serialize;
use uuid::Uuid;

use crate::core::state_machine::ReleaseStateData;
use crate::export::ExportOutcome;
use crate::model::{CollectionId, DatasetId};
use crate::notifications::FanOutReport;
use crate::registrars::RegistrationOutcome;
use crate::validation::VersionNumber;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub run_id: Uuid,
    pub dataset_id: DatasetId,
    pub persistent_id: String,
    pub version: VersionNumber,
    pub first_publication: bool,
    pub registration: RegistrationOutcome,
    pub notifications: FanOutReport,
    pub export: ExportOutcome,
    pub reindexed_collections: Vec<CollectionId>,
    pub identifier_publicized: bool,
    pub warnings: Vec<String>,
    pub state: ReleaseStateData,
    pub duration_ms: u64,
}

impl PublishReport {
    /// Human-readable summary for the terminal
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Published {} as version {}", self.persistent_id, self.version),
            format!("  run:           {}", self.run_id),
            format!(
                "  notifications: {} delivered, {} failed",
                self.notifications.delivered, self.notifications.failed
            ),
            format!("  export:        {}", match &self.export {
                ExportOutcome::Written { path } => path.display().to_string(),
                ExportOutcome::Skipped { reason } => format!("skipped ({})", reason),
                ExportOutcome::Failed { error } => format!("failed ({})", error),
            }),
            format!("  publicized:    {}", if self.identifier_publicized { "yes" } else { "no" }),
            format!("  duration:      {}ms", self.duration_ms),
        ];
        for warning in &self.warnings {
            lines.push(format!("  warning: {}", warning));
        }
        lines.join("\n")
    }
}
