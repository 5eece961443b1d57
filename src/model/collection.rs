//! Collections (the hierarchical owners of datasets)
//!
//! A collection refers to its parent by id only; walking the chain is a
//! lookup through a `CollectionRepository`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type CollectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: CollectionId,
    pub alias: String,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub parent: Option<CollectionId>,
    #[serde(default)]
    pub subjects: BTreeSet<String>,
}

impl Collection {
    pub fn new(id: CollectionId, alias: impl Into<String>, parent: Option<CollectionId>) -> Self {
        Self {
            id,
            alias: alias.into(),
            released: false,
            parent,
            subjects: BTreeSet::new(),
        }
    }

    pub fn released(mut self) -> Self {
        self.released = true;
        self
    }

    /// Add subject terms; returns true if the subject set changed
    pub fn merge_subjects<I>(&mut self, terms: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.subjects.len();
        self.subjects.extend(terms);
        self.subjects.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_subjects_reports_change() {
        let mut collection = Collection::new(1, "root", None);

        assert!(collection.merge_subjects(vec!["law".to_string()]));
        assert!(!collection.merge_subjects(vec!["law".to_string()]));
        assert!(collection.merge_subjects(vec!["law".to_string(), "cs".to_string()]));
        assert_eq!(collection.subjects.len(), 2);
    }

    #[test]
    fn test_deserialize_defaults() {
        let collection: Collection = serde_json::from_str(r#"{"id": 3, "alias": "econ"}"#).unwrap();
        assert!(!collection.released);
        assert!(collection.parent.is_none());
        assert!(collection.subjects.is_empty());
    }
}
