//! Protected branches and their access-level grants.

use crate::error::{ClientError, Result};
use crate::permission::Permission;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three access-level lists attached to a protected branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessLevelKey {
    /// Who may push.
    #[serde(rename = "push_access_level")]
    Push,
    /// Who may merge.
    #[serde(rename = "merge_access_level")]
    Merge,
    /// Who may unprotect the branch.
    #[serde(rename = "unprotect_access_level")]
    Unprotect,
}

impl AccessLevelKey {
    /// All keys in the order they are sent to the API.
    pub const ALL: [AccessLevelKey; 3] = [
        AccessLevelKey::Push,
        AccessLevelKey::Merge,
        AccessLevelKey::Unprotect,
    ];

    /// Parameter name used by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevelKey::Push => "push_access_level",
            AccessLevelKey::Merge => "merge_access_level",
            AccessLevelKey::Unprotect => "unprotect_access_level",
        }
    }
}

impl FromStr for AccessLevelKey {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ClientError::Decode(format!("unknown access level key '{s}'")))
    }
}

impl fmt::Display for AccessLevelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single grant on a protected branch: a permission, optionally bound to a
/// user or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLevel {
    /// Minimum permission granted.
    #[serde(rename = "access_level")]
    pub permission: Permission,
    /// User the grant is restricted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// Group the grant is restricted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u64>,
    /// Human readable description supplied by the server.
    #[serde(
        rename = "access_level_description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl AccessLevel {
    /// A role-based grant with no subject.
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            user_id: None,
            group_id: None,
            description: None,
        }
    }
}

/// A desired `(key, permission)` pair for a protected branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchAccessSetting {
    /// Which list the permission applies to.
    pub key: AccessLevelKey,
    /// Required permission.
    pub permission: Permission,
}

impl BranchAccessSetting {
    /// Create a new setting.
    pub fn new(key: AccessLevelKey, permission: Permission) -> Self {
        Self { key, permission }
    }

    /// Query parameter form, e.g. `("push_access_level", "40")`.
    pub fn to_param(&self) -> (&'static str, String) {
        (self.key.as_str(), self.permission.access_level())
    }
}

impl fmt::Display for BranchAccessSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.permission.rank())
    }
}

/// A protected branch as returned by the API.
///
/// Two protected branches are equal when their names are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtectedBranch {
    /// Branch name or wildcard.
    pub name: String,
    /// Push grants.
    #[serde(default)]
    pub push_access_levels: Vec<AccessLevel>,
    /// Merge grants.
    #[serde(default)]
    pub merge_access_levels: Vec<AccessLevel>,
    /// Unprotect grants.
    #[serde(default)]
    pub unprotect_access_levels: Vec<AccessLevel>,
}

impl ProtectedBranch {
    /// Create a protected branch without grants.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a protected branch with one role-based grant per setting.
    pub fn with_settings(name: impl Into<String>, settings: &[BranchAccessSetting]) -> Self {
        let mut branch = Self::new(name);
        for setting in settings {
            branch
                .access_levels_mut(setting.key)
                .push(AccessLevel::new(setting.permission));
        }
        branch
    }

    /// Grants stored under `key`.
    pub fn access_levels(&self, key: AccessLevelKey) -> &[AccessLevel] {
        match key {
            AccessLevelKey::Push => &self.push_access_levels,
            AccessLevelKey::Merge => &self.merge_access_levels,
            AccessLevelKey::Unprotect => &self.unprotect_access_levels,
        }
    }

    fn access_levels_mut(&mut self, key: AccessLevelKey) -> &mut Vec<AccessLevel> {
        match key {
            AccessLevelKey::Push => &mut self.push_access_levels,
            AccessLevelKey::Merge => &mut self.merge_access_levels,
            AccessLevelKey::Unprotect => &mut self.unprotect_access_levels,
        }
    }

    /// Returns true if some grant under `key` has exactly `permission`.
    pub fn has_access_level(&self, key: AccessLevelKey, permission: Permission) -> bool {
        self.access_levels(key)
            .iter()
            .any(|level| level.permission == permission)
    }
}

impl PartialEq for ProtectedBranch {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ProtectedBranch {}
