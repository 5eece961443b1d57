//! Versioning Policy - Computes the next dataset version number
//!
//! Version numbers are `major.minor`. The computation is pure: it depends
//! only on the previous numbers, the publication history and the requested
//! release kind.
//!
//! # Example
//!
//! ```
//! use dataset_publisher::validation::versioning::VersioningPolicy;
//!
//! let policy = VersioningPolicy::new();
//!
//! assert_eq!(policy.next(1, 0, true, true), (1, 1));
//! assert_eq!(policy.next(1, 0, true, false), (2, 0));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Dataset;

/// Released version number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionNumber {
    pub major: u64,
    pub minor: u64,
}

impl VersionNumber {
    pub fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }
}

impl From<(u64, u64)> for VersionNumber {
    fn from((major, minor): (u64, u64)) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Policy for major/minor version increments
#[derive(Debug, Clone, Copy, Default)]
pub struct VersioningPolicy;

impl VersioningPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Compute the next `(major, minor)` pair
    ///
    /// A first publication is always `1.0`, even when a minor release was
    /// requested.
    ///
    /// # Examples
    ///
    /// ```
    /// use dataset_publisher::validation::versioning::VersioningPolicy;
    ///
    /// let policy = VersioningPolicy::new();
    /// assert_eq!(policy.next(0, 0, false, true), (1, 0));
    /// assert_eq!(policy.next(2, 3, true, true), (2, 4));
    /// ```
    pub fn next(
        &self,
        previous_major: u64,
        previous_minor: u64,
        has_prior_publication: bool,
        is_minor: bool,
    ) -> (u64, u64) {
        if !has_prior_publication {
            (1, 0)
        } else if is_minor {
            (previous_major, previous_minor + 1)
        } else {
            (previous_major + 1, 0)
        }
    }

    /// Next version of a dataset, based on the last version that received
    /// a number, deaccessioned ones included
    pub fn next_version(&self, dataset: &Dataset, is_minor: bool) -> VersionNumber {
        let (major, minor) = dataset
            .last_numbered_version()
            .map(|v| (v.major, v.minor))
            .unwrap_or((0, 0));

        self.next(major, minor, dataset.has_prior_publication(), is_minor)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetVersion, GlobalId, VersionState};
    use chrono::Utc;

    #[test]
    fn test_first_publication() {
        let policy = VersioningPolicy::new();
        assert_eq!(policy.next(0, 0, false, false), (1, 0));
    }

    #[test]
    fn test_minor_first_release_is_coerced_to_one_zero() {
        let policy = VersioningPolicy::new();
        assert_eq!(policy.next(0, 0, false, true), (1, 0));
        // history is ignored without a prior publication
        assert_eq!(policy.next(4, 2, false, true), (1, 0));
    }

    #[test]
    fn test_major_release() {
        let policy = VersioningPolicy::new();
        assert_eq!(policy.next(1, 0, true, false), (2, 0));
        assert_eq!(policy.next(2, 3, true, false), (3, 0));
    }

    #[test]
    fn test_minor_release() {
        let policy = VersioningPolicy::new();
        assert_eq!(policy.next(1, 0, true, true), (1, 1));
        assert_eq!(policy.next(2, 3, true, true), (2, 4));
    }

    #[test]
    fn test_next_version_from_dataset() {
        let mut released = DatasetVersion::draft(1);
        released.state = VersionState::Released;
        released.major = 3;
        released.minor = 1;

        let mut dataset = Dataset::new(
            9,
            GlobalId::new("doi", "10.5072", "/", "FK2XYZ"),
            1,
            released,
        );
        dataset.versions.push(DatasetVersion::draft(2));
        dataset.publication_date = Some(Utc::now());

        let policy = VersioningPolicy::new();
        assert_eq!(policy.next_version(&dataset, true), VersionNumber::new(3, 2));
        assert_eq!(policy.next_version(&dataset, false).to_string(), "4.0");
    }

    #[test]
    fn test_next_version_after_deaccession() {
        let mut deaccessioned = DatasetVersion::draft(1);
        deaccessioned.state = VersionState::Deaccessioned;
        deaccessioned.major = 1;

        let mut dataset = Dataset::new(
            9,
            GlobalId::new("doi", "10.5072", "/", "FK2XYZ"),
            1,
            deaccessioned,
        );
        dataset.versions.push(DatasetVersion::draft(2));
        dataset.publication_date = Some(Utc::now());

        let policy = VersioningPolicy::new();
        assert_eq!(policy.next_version(&dataset, false).to_string(), "2.0");
        assert_eq!(policy.next_version(&dataset, true).to_string(), "1.1");
    }
}
