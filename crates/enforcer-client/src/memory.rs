//! In-memory GitLab backend.
//!
//! Behaves like the REST API for the operations rules use and records every
//! mutating call, so tests can assert on exactly what was sent.

use crate::api::{GitLabApi, Settings};
use crate::branch::{BranchAccessSetting, ProtectedBranch};
use crate::error::{ClientError, Result};
use crate::models::{Group, Project, PushRules};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// A mutating call received by [`MemoryGitLab`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `PUT /groups/:id`.
    UpdateGroup {
        /// Target group.
        group_id: u64,
        /// Attributes sent.
        settings: Settings,
    },
    /// `POST /projects/:id/protected_branches`.
    ProtectBranch {
        /// Target project.
        project_id: u64,
        /// Branch name or wildcard.
        branch: String,
        /// Access levels sent.
        settings: Vec<BranchAccessSetting>,
    },
    /// `DELETE /projects/:id/protected_branches/:name`.
    UnprotectBranch {
        /// Target project.
        project_id: u64,
        /// Branch name or wildcard.
        branch: String,
    },
    /// `POST /projects/:id/push_rule`.
    CreatePushRules {
        /// Target project.
        project_id: u64,
        /// Push rules sent.
        settings: Settings,
    },
    /// `PUT /projects/:id/push_rule`.
    UpdatePushRules {
        /// Target project.
        project_id: u64,
        /// Push rules sent.
        settings: Settings,
    },
    /// `DELETE /projects/:id/share/:group_id`.
    UnshareProject {
        /// Target project.
        project_id: u64,
        /// Group the share is removed for.
        group_id: u64,
    },
}

#[derive(Default)]
struct State {
    groups: BTreeMap<u64, Group>,
    projects: BTreeMap<u64, Project>,
    branches: BTreeMap<u64, Vec<ProtectedBranch>>,
    push_rules: BTreeMap<u64, PushRules>,
    failing: HashSet<String>,
    calls: Vec<Call>,
}

/// In-memory implementation of [`GitLabApi`].
pub struct MemoryGitLab {
    state: RwLock<State>,
    next_id: AtomicU64,
}

impl Default for MemoryGitLab {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGitLab {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add or replace a group.
    pub fn add_group(&self, group: Group) {
        self.state.write().groups.insert(group.id, group);
    }

    /// Add or replace a project.
    pub fn add_project(&self, project: Project) {
        self.state.write().projects.insert(project.id, project);
    }

    /// Protect a branch directly, without recording a call.
    pub fn add_protected_branch(&self, project_id: u64, branch: ProtectedBranch) {
        let mut state = self.state.write();
        let branches = state.branches.entry(project_id).or_default();
        branches.retain(|b| b != &branch);
        branches.push(branch);
    }

    /// Set push rules directly, without recording a call.
    pub fn set_push_rules(&self, project_id: u64, rules: PushRules) {
        self.state.write().push_rules.insert(project_id, rules);
    }

    /// Make every subsequent call to `operation` (e.g. `"unprotect_branch"`)
    /// fail with a server error.
    pub fn fail(&self, operation: &str) {
        self.state.write().failing.insert(operation.to_string());
    }

    /// Stop failing `operation`.
    pub fn recover(&self, operation: &str) {
        self.state.write().failing.remove(operation);
    }

    /// Current state of a group.
    pub fn group(&self, group_id: u64) -> Option<Group> {
        self.state.read().groups.get(&group_id).cloned()
    }

    /// Current state of a project.
    pub fn project(&self, project_id: u64) -> Option<Project> {
        self.state.read().projects.get(&project_id).cloned()
    }

    /// Current protected branches of a project.
    pub fn protected_branches(&self, project_id: u64) -> Vec<ProtectedBranch> {
        self.state
            .read()
            .branches
            .get(&project_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Current push rules of a project.
    pub fn push_rules(&self, project_id: u64) -> Option<PushRules> {
        self.state.read().push_rules.get(&project_id).cloned()
    }

    /// Mutating calls received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.read().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.write().calls.clear();
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.state.read().failing.contains(operation) {
            return Err(ClientError::Api {
                status: 500,
                body: format!("{operation} failed"),
            });
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        self.state.write().calls.push(call);
    }
}

/// Store a request parameter the way the server reports it back.
fn to_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn not_found(what: String) -> ClientError {
    ClientError::Api {
        status: 404,
        body: format!("404 {what} Not Found"),
    }
}

#[async_trait]
impl GitLabApi for MemoryGitLab {
    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.check("list_groups")?;
        Ok(self.state.read().groups.values().cloned().collect())
    }

    async fn get_group(&self, group_id: u64) -> Result<Group> {
        self.check("get_group")?;
        self.group(group_id)
            .ok_or_else(|| not_found(format!("Group {group_id}")))
    }

    async fn update_group(&self, group_id: u64, settings: &Settings) -> Result<Group> {
        self.check("update_group")?;
        self.record(Call::UpdateGroup {
            group_id,
            settings: settings.clone(),
        });
        let mut state = self.state.write();
        let group = state
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| not_found(format!("Group {group_id}")))?;
        for (key, value) in settings {
            group.settings.insert(key.clone(), to_value(value));
        }
        Ok(group.clone())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.check("list_projects")?;
        Ok(self.state.read().projects.values().cloned().collect())
    }

    async fn get_project(&self, project_id: u64) -> Result<Project> {
        self.check("get_project")?;
        self.project(project_id)
            .ok_or_else(|| not_found(format!("Project {project_id}")))
    }

    async fn list_protected_branches(&self, project_id: u64) -> Result<Vec<ProtectedBranch>> {
        self.check("list_protected_branches")?;
        Ok(self.protected_branches(project_id))
    }

    async fn protect_branch(
        &self,
        project_id: u64,
        branch: &str,
        settings: &[BranchAccessSetting],
    ) -> Result<ProtectedBranch> {
        self.check("protect_branch")?;
        self.record(Call::ProtectBranch {
            project_id,
            branch: branch.to_string(),
            settings: settings.to_vec(),
        });
        let mut state = self.state.write();
        let branches = state.branches.entry(project_id).or_default();
        if branches.iter().any(|b| b.name == branch) {
            return Err(ClientError::Api {
                status: 409,
                body: format!("Protected branch '{branch}' already exists"),
            });
        }
        let protected = ProtectedBranch::with_settings(branch, settings);
        branches.push(protected.clone());
        Ok(protected)
    }

    async fn unprotect_branch(&self, project_id: u64, branch: &str) -> Result<()> {
        self.check("unprotect_branch")?;
        self.record(Call::UnprotectBranch {
            project_id,
            branch: branch.to_string(),
        });
        let mut state = self.state.write();
        let branches = state.branches.entry(project_id).or_default();
        let before = branches.len();
        branches.retain(|b| b.name != branch);
        if branches.len() == before {
            return Err(not_found(format!("Protected branch {branch}")));
        }
        Ok(())
    }

    async fn get_push_rules(&self, project_id: u64) -> Result<Option<PushRules>> {
        self.check("get_push_rules")?;
        Ok(self.push_rules(project_id))
    }

    async fn create_push_rules(&self, project_id: u64, settings: &Settings) -> Result<PushRules> {
        self.check("create_push_rules")?;
        self.record(Call::CreatePushRules {
            project_id,
            settings: settings.clone(),
        });
        let mut state = self.state.write();
        if state.push_rules.contains_key(&project_id) {
            return Err(ClientError::Api {
                status: 422,
                body: "Project push rule exists".to_string(),
            });
        }
        let mut rules = PushRules {
            id: Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
            ..Default::default()
        };
        for (key, value) in settings {
            rules.apply(key, value);
        }
        state.push_rules.insert(project_id, rules.clone());
        Ok(rules)
    }

    async fn update_push_rules(&self, project_id: u64, settings: &Settings) -> Result<PushRules> {
        self.check("update_push_rules")?;
        self.record(Call::UpdatePushRules {
            project_id,
            settings: settings.clone(),
        });
        let mut state = self.state.write();
        let rules = state
            .push_rules
            .get_mut(&project_id)
            .ok_or_else(|| not_found("Push Rule".to_string()))?;
        for (key, value) in settings {
            rules.apply(key, value);
        }
        Ok(rules.clone())
    }

    async fn unshare_project_with_group(&self, project_id: u64, group_id: u64) -> Result<()> {
        self.check("unshare_project_with_group")?;
        self.record(Call::UnshareProject {
            project_id,
            group_id,
        });
        let mut state = self.state.write();
        let project = state
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| not_found(format!("Project {project_id}")))?;
        let before = project.shared_with_groups.len();
        project.shared_with_groups.retain(|g| g.group_id != group_id);
        if project.shared_with_groups.len() == before {
            return Err(not_found(format!("Group Link {group_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::AccessLevelKey;
    use crate::models::{Namespace, NamespaceKind, SharedGroup};
    use crate::permission::Permission;

    #[tokio::test]
    async fn test_protect_twice_conflicts() {
        let gitlab = MemoryGitLab::new();
        let settings = [BranchAccessSetting::new(AccessLevelKey::Push, Permission::Maintainer)];

        gitlab.protect_branch(1, "main", &settings).await.unwrap();
        let err = gitlab.protect_branch(1, "main", &settings).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 409, .. }));

        gitlab.unprotect_branch(1, "main").await.unwrap();
        assert!(gitlab.protected_branches(1).is_empty());
        assert!(gitlab.unprotect_branch(1, "main").await.unwrap_err().is_not_found());
        assert_eq!(gitlab.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_update_group_round_trips_values() {
        let gitlab = MemoryGitLab::new();
        gitlab.add_group(Group::new(5, "Platform", "platform"));

        let mut settings = Settings::new();
        settings.insert("membership_lock".into(), "true".into());
        settings.insert("visibility".into(), "private".into());
        gitlab.update_group(5, &settings).await.unwrap();

        let group = gitlab.group(5).unwrap();
        assert_eq!(group.settings.get("membership_lock"), Some(&Value::Bool(true)));
        assert_eq!(group.setting("visibility").as_deref(), Some("private"));
    }

    #[tokio::test]
    async fn test_failing_operation() {
        let gitlab = MemoryGitLab::new();
        gitlab.fail("list_groups");
        assert!(gitlab.list_groups().await.is_err());
        gitlab.recover("list_groups");
        assert!(gitlab.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_rules_lifecycle() {
        let gitlab = MemoryGitLab::new();
        assert_eq!(gitlab.get_push_rules(1).await.unwrap(), None);

        let mut settings = Settings::new();
        settings.insert("member_check".into(), "true".into());
        gitlab.create_push_rules(1, &settings).await.unwrap();
        assert!(gitlab.create_push_rules(1, &settings).await.is_err());

        settings.insert("member_check".into(), "false".into());
        let rules = gitlab.update_push_rules(1, &settings).await.unwrap();
        assert!(!rules.member_check);
    }

    #[tokio::test]
    async fn test_unshare() {
        let gitlab = MemoryGitLab::new();
        gitlab.add_project(
            Project::new(2, "api", Namespace::new(3, "jdoe", NamespaceKind::User))
                .with_shared_group(SharedGroup::new(9, "devs")),
        );

        gitlab.unshare_project_with_group(2, 9).await.unwrap();
        assert!(gitlab.project(2).unwrap().shared_with_groups.is_empty());
        assert!(gitlab.unshare_project_with_group(2, 9).await.is_err());
    }
}
