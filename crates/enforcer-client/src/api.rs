//! The remote API surface used by rules.

use crate::branch::{BranchAccessSetting, ProtectedBranch};
use crate::error::Result;
use crate::models::{Group, Project, PushRules};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Attribute name to request-parameter value.
pub type Settings = BTreeMap<String, String>;

/// Operations against a GitLab instance.
///
/// List calls fetch every page before returning and fail as a whole if any
/// page fails. Everything else is a single request with no retry.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    /// All groups visible to the token.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// A single group.
    async fn get_group(&self, group_id: u64) -> Result<Group>;

    /// Update group attributes.
    async fn update_group(&self, group_id: u64, settings: &Settings) -> Result<Group>;

    /// All projects visible to the token.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// A single project.
    async fn get_project(&self, project_id: u64) -> Result<Project>;

    /// Protected branches of a project.
    async fn list_protected_branches(&self, project_id: u64) -> Result<Vec<ProtectedBranch>>;

    /// Protect `branch`. Fails if the branch is already protected.
    async fn protect_branch(
        &self,
        project_id: u64,
        branch: &str,
        settings: &[BranchAccessSetting],
    ) -> Result<ProtectedBranch>;

    /// Remove protection from `branch`.
    async fn unprotect_branch(&self, project_id: u64, branch: &str) -> Result<()>;

    /// Push rules of a project, `None` if none are configured.
    async fn get_push_rules(&self, project_id: u64) -> Result<Option<PushRules>>;

    /// Add push rules to a project that has none.
    async fn create_push_rules(&self, project_id: u64, settings: &Settings) -> Result<PushRules>;

    /// Modify existing push rules.
    async fn update_push_rules(&self, project_id: u64, settings: &Settings) -> Result<PushRules>;

    /// Stop sharing a project with a group.
    async fn unshare_project_with_group(&self, project_id: u64, group_id: u64) -> Result<()>;
}
