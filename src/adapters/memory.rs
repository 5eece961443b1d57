//! In-memory store backed by a JSON snapshot
//!
//! Implements the persistence, collection and role-assignee ports over a
//! single `RwLock`. The binary loads the snapshot from disk, runs the
//! command and writes it back atomically.

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::fs;
use tokio::sync::RwLock;

use crate::core::error::StorageError;
use crate::core::traits::{
    CollectionRepository, PersistenceStore, RoleAssigneeResolver, SequenceCounterStore,
};
use crate::model::{
    Assignee, AuthenticatedUser, Collection, CollectionId, Dataset, DatasetId, DvObjectRef,
    ExplicitGroup, GROUP_PREFIX, RoleAssignment, USER_PREFIX, VersionId, VersionUserRecord,
    normalize_user_identifier,
};

/// Serializable content of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub users: Vec<AuthenticatedUser>,
    #[serde(default)]
    pub groups: Vec<ExplicitGroup>,
    #[serde(default)]
    pub role_assignments: Vec<RoleAssignment>,
    #[serde(default)]
    pub version_users: Vec<VersionUserRecord>,
    /// Next value of each identifier sequence, keyed by scope
    #[serde(default)]
    pub identifier_sequences: BTreeMap<String, u64>,
}

pub struct InMemoryStore {
    state: RwLock<StoreSnapshot>,
}

impl InMemoryStore {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Load a snapshot from a JSON file
    pub async fn load_json(path: &Path) -> Result<Self, StorageError> {
        let content = fs::read_to_string(path).await.map_err(|e| StorageError::Backend {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let snapshot: StoreSnapshot =
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                message: format!("{}: {}", path.display(), e),
            })?;

        debug!(
            "Loaded {} datasets and {} collections from {}",
            snapshot.datasets.len(),
            snapshot.collections.len(),
            path.display()
        );
        Ok(Self::new(snapshot))
    }

    /// Write the snapshot as JSON, replacing `path` atomically
    pub async fn save_json(&self, path: &Path) -> Result<(), StorageError> {
        let json = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state).map_err(|e| StorageError::Backend {
                message: e.to_string(),
            })?
        };

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .await
            .map_err(|e| StorageError::Backend {
                message: format!("failed to write {}: {}", temp_path.display(), e),
            })?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StorageError::Backend {
                message: format!("failed to replace {}: {}", path.display(), e),
            })?;
        Ok(())
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    fn find_user<'a>(state: &'a StoreSnapshot, identifier: &str) -> Option<&'a AuthenticatedUser> {
        let identifier = normalize_user_identifier(identifier);
        state.users.iter().find(|u| u.identifier == identifier)
    }

    fn find_group<'a>(state: &'a StoreSnapshot, alias: &str) -> Option<&'a ExplicitGroup> {
        state.groups.iter().find(|g| g.alias == alias)
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn find_dataset(&self, id: DatasetId) -> Result<Option<Dataset>, StorageError> {
        let state = self.state.read().await;
        Ok(state.datasets.iter().find(|d| d.id == id).cloned())
    }

    async fn merge_dataset(&self, dataset: Dataset) -> Result<Dataset, StorageError> {
        let mut state = self.state.write().await;
        match state.datasets.iter_mut().find(|d| d.id == dataset.id) {
            Some(existing) => *existing = dataset.clone(),
            None => state.datasets.push(dataset.clone()),
        }
        Ok(dataset)
    }

    async fn find_version_user(
        &self,
        version_id: VersionId,
        user_identifier: &str,
    ) -> Result<Option<VersionUserRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .version_users
            .iter()
            .find(|r| r.version_id == version_id && r.user_identifier == user_identifier)
            .cloned())
    }

    async fn merge_version_user(
        &self,
        record: VersionUserRecord,
    ) -> Result<VersionUserRecord, StorageError> {
        let mut state = self.state.write().await;
        match state
            .version_users
            .iter_mut()
            .find(|r| r.version_id == record.version_id && r.user_identifier == record.user_identifier)
        {
            Some(existing) => *existing = record.clone(),
            None => state.version_users.push(record.clone()),
        }
        Ok(record)
    }
}

#[async_trait]
impl CollectionRepository for InMemoryStore {
    async fn find_collection(&self, id: CollectionId) -> Result<Option<Collection>, StorageError> {
        let state = self.state.read().await;
        Ok(state.collections.iter().find(|c| c.id == id).cloned())
    }

    async fn merge_collection(&self, collection: Collection) -> Result<Collection, StorageError> {
        let mut state = self.state.write().await;
        match state.collections.iter_mut().find(|c| c.id == collection.id) {
            Some(existing) => *existing = collection.clone(),
            None => {
                return Err(StorageError::NotFound {
                    entity: format!("collection#{}", collection.id),
                });
            }
        }
        Ok(collection)
    }
}

#[async_trait]
impl SequenceCounterStore for InMemoryStore {
    async fn next_sequence_value(&self, scope: &str, start: u64) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let counter = state
            .identifier_sequences
            .entry(scope.to_string())
            .or_insert(start);
        let value = *counter;
        *counter += 1;
        Ok(value)
    }
}

#[async_trait]
impl RoleAssigneeResolver for InMemoryStore {
    async fn direct_role_assignments(
        &self,
        entity: DvObjectRef,
    ) -> Result<Vec<RoleAssignment>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .role_assignments
            .iter()
            .filter(|a| a.definition_point == entity)
            .cloned()
            .collect())
    }

    async fn resolve_assignee(&self, identifier: &str) -> Result<Option<Assignee>, StorageError> {
        let state = self.state.read().await;
        if let Some(alias) = identifier.strip_prefix(GROUP_PREFIX) {
            return Ok(Self::find_group(&state, alias).cloned().map(Assignee::Group));
        }
        if identifier.starts_with(USER_PREFIX) {
            return Ok(Self::find_user(&state, identifier).cloned().map(Assignee::User));
        }
        Ok(None)
    }

    async fn expand_to_account_holders(
        &self,
        assignee: &Assignee,
    ) -> Result<Vec<AuthenticatedUser>, StorageError> {
        let group = match assignee {
            Assignee::User(user) => return Ok(vec![user.clone()]),
            Assignee::Group(group) => group,
        };

        let state = self.state.read().await;
        let mut holders = Vec::new();
        let mut seen_users = HashSet::new();
        let mut seen_groups = HashSet::from([group.alias.clone()]);
        let mut pending: Vec<String> = group.members.iter().rev().cloned().collect();

        while let Some(member) = pending.pop() {
            if let Some(alias) = member.strip_prefix(GROUP_PREFIX) {
                if !seen_groups.insert(alias.to_string()) {
                    continue;
                }
                match Self::find_group(&state, alias) {
                    Some(nested) => pending.extend(nested.members.iter().rev().cloned()),
                    None => warn!("Unknown group {} in {}", member, group.alias),
                }
            } else {
                match Self::find_user(&state, &member) {
                    Some(user) if seen_users.insert(user.identifier.clone()) => {
                        holders.push(user.clone())
                    }
                    Some(_) => {}
                    None => warn!("Unknown user {} in {}", member, group.alias),
                }
            }
        }

        Ok(holders)
    }
}
