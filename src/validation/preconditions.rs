//! Publication Preconditions - Gate checked before any mutation
//!
//! The checks only read the dataset and its ancestor chain; a rejection
//! guarantees that no registrar or persistence call has been made.

use log::debug;

use crate::core::error::PublishError;
use crate::model::{Collection, Dataset};

/// Precondition checks for a publish request
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicationPreconditions;

impl PublicationPreconditions {
    pub fn new() -> Self {
        Self
    }

    /// Check whether `dataset` may be released
    ///
    /// # Arguments
    ///
    /// * `dataset` - Dataset to release
    /// * `ancestors` - Owning collection chain, nearest first
    /// * `is_minor` - Whether a minor release was requested
    ///
    /// # Errors
    ///
    /// `CollectionNotPublished` for the first unreleased ancestor,
    /// `AlreadyReleased` when the latest version is not a draft and
    /// `InvalidMinorRelease` when the draft does not qualify for a minor bump.
    pub fn check(
        &self,
        dataset: &Dataset,
        ancestors: &[Collection],
        is_minor: bool,
    ) -> Result<(), PublishError> {
        if let Some(unreleased) = ancestors.iter().find(|c| !c.released) {
            return Err(PublishError::CollectionNotPublished {
                dataset: dataset.label(),
                collection: unreleased.alias.clone(),
            });
        }

        if dataset.edit_version().is_none() {
            return Err(PublishError::AlreadyReleased {
                dataset: dataset.label(),
            });
        }

        if is_minor && !dataset.is_minor_update_eligible() {
            return Err(PublishError::InvalidMinorRelease {
                dataset: dataset.label(),
            });
        }

        debug!(
            "Preconditions passed for {} ({} ancestors, minor: {})",
            dataset.label(),
            ancestors.len(),
            is_minor
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetVersion, GlobalId, VersionState};

    fn draft_dataset() -> Dataset {
        Dataset::new(
            1,
            GlobalId::new("doi", "10.5072", "/", "FK2AAA"),
            2,
            DatasetVersion::draft(1),
        )
    }

    fn released_chain() -> Vec<Collection> {
        vec![
            Collection::new(2, "econ", Some(1)).released(),
            Collection::new(1, "root", None).released(),
        ]
    }

    #[test]
    fn test_passes_for_draft_in_released_chain() {
        let checks = PublicationPreconditions::new();
        assert!(checks.check(&draft_dataset(), &released_chain(), false).is_ok());
    }

    #[test]
    fn test_unreleased_ancestor_is_rejected() {
        let checks = PublicationPreconditions::new();
        let chain = vec![
            Collection::new(2, "econ", Some(1)).released(),
            Collection::new(1, "root", None),
        ];

        let error = checks.check(&draft_dataset(), &chain, false).unwrap_err();
        match error {
            PublishError::CollectionNotPublished { collection, .. } => assert_eq!(collection, "root"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_released_latest_version_is_rejected() {
        let mut dataset = draft_dataset();
        dataset.versions[0].state = VersionState::Released;

        let error = PublicationPreconditions::new()
            .check(&dataset, &released_chain(), false)
            .unwrap_err();
        assert_eq!(error.code(), "ALREADY_RELEASED");
    }

    #[test]
    fn test_deaccessioned_latest_version_is_rejected() {
        let mut dataset = draft_dataset();
        dataset.versions[0].state = VersionState::Deaccessioned;

        let error = PublicationPreconditions::new()
            .check(&dataset, &released_chain(), false)
            .unwrap_err();
        assert_eq!(error.code(), "ALREADY_RELEASED");
    }

    #[test]
    fn test_minor_with_changed_files_is_rejected() {
        let mut released = DatasetVersion::draft(1);
        released.state = VersionState::Released;
        released.file_ids.insert(10);

        let mut draft = DatasetVersion::draft(2);
        draft.file_ids.extend([10, 11]);

        let mut dataset = draft_dataset();
        dataset.versions = vec![released, draft];

        let checks = PublicationPreconditions::new();
        let error = checks.check(&dataset, &released_chain(), true).unwrap_err();
        assert_eq!(error.code(), "INVALID_MINOR_RELEASE");

        // a major release of the same draft is fine
        assert!(checks.check(&dataset, &released_chain(), false).is_ok());
    }

    #[test]
    fn test_minor_first_release_passes_the_gate() {
        let checks = PublicationPreconditions::new();
        assert!(checks.check(&draft_dataset(), &released_chain(), true).is_ok());
    }
}
