//! Roles, assignees, notifications and per-user version records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::collection::CollectionId;
use super::dataset::{DatasetId, FileId, VersionId};

/// Prefix of user assignee identifiers (`@alice`)
pub const USER_PREFIX: char = '@';

/// Prefix of group assignee identifiers (`&curators`)
pub const GROUP_PREFIX: char = '&';

/// Reference to a publishable or permission-bearing object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum DvObjectRef {
    Collection(CollectionId),
    Dataset(DatasetId),
    File(FileId),
}

impl fmt::Display for DvObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DvObjectRef::Collection(id) => write!(f, "collection#{}", id),
            DvObjectRef::Dataset(id) => write!(f, "dataset#{}", id),
            DvObjectRef::File(id) => write!(f, "file#{}", id),
        }
    }
}

/// Capability granted by a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    ViewUnpublishedDataset,
    EditDataset,
    PublishDataset,
    ManageDatasetPermissions,
    DownloadFile,
}

/// Named bundle of permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub alias: String,
    pub permissions: BTreeSet<Permission>,
}

impl Role {
    pub fn new<I>(alias: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        Self {
            alias: alias.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Binds a role to an assignee on a dataset, file or collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub role: Role,
    /// `@user` or `&group`
    pub assignee: String,
    pub definition_point: DvObjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// Identifier without the `@` prefix
    pub identifier: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(identifier: impl AsRef<str>) -> Self {
        Self {
            identifier: normalize_user_identifier(identifier.as_ref()).to_string(),
            email: None,
        }
    }

    /// Identifier as used in role assignments (`@alice`)
    pub fn assignee_identifier(&self) -> String {
        format!("{}{}", USER_PREFIX, self.identifier)
    }
}

/// Explicit group; members are assignee identifiers and may be nested groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitGroup {
    pub alias: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl ExplicitGroup {
    pub fn assignee_identifier(&self) -> String {
        format!("{}{}", GROUP_PREFIX, self.alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignee {
    User(AuthenticatedUser),
    Group(ExplicitGroup),
}

/// Strip the leading `@` from a user identifier
pub fn normalize_user_identifier(identifier: &str) -> &str {
    identifier.strip_prefix(USER_PREFIX).unwrap_or(identifier)
}

/// Kind of user notification emitted during publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Dataset released to holders of a download role
    AssignRole,
    /// File became accessible to holders of a download role
    GrantFileAccess,
}

/// Last time a user updated a given version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionUserRecord {
    pub version_id: VersionId,
    pub user_identifier: String,
    pub last_update: DateTime<Utc>,
}
