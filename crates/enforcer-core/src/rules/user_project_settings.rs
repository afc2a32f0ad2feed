//! User project settings rule.

use super::{describe, resolve_project};
use crate::config::RuleConfig;
use crate::context::Use;
use crate::error::{ConfigError, Result};
use crate::event::{EventKind, SystemEvent};
use crate::rule::{Outcome, Rule, RuleContext};
use async_trait::async_trait;
use enforcer_audit::{AuditEvent, AuditEventType};
use enforcer_client::GitLabApi;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NAME: &str = "Enforce User Project Settings";

const REMOVE_SHARED_GROUPS: &str = "remove_shared_groups";

/// Restricts projects in personal namespaces.
pub struct UserProjectSettingsRule {
    gitlab: Arc<dyn GitLabApi>,
    use_policy: Use,
    remove_shared_groups: bool,
}

impl UserProjectSettingsRule {
    /// Registry identifier.
    pub const ID: &'static str = "user_project_settings";

    /// Build the rule from its configuration.
    pub fn from_config(
        config: &RuleConfig,
        gitlab: Arc<dyn GitLabApi>,
    ) -> std::result::Result<Self, ConfigError> {
        config.reject_unknown(&[REMOVE_SHARED_GROUPS])?;
        Ok(Self {
            gitlab,
            use_policy: config.use_policy,
            remove_shared_groups: config.flag(REMOVE_SHARED_GROUPS, false)?,
        })
    }
}

#[async_trait]
impl Rule for UserProjectSettingsRule {
    fn name(&self) -> &str {
        NAME
    }

    fn info(&self) -> String {
        describe(
            NAME,
            [(REMOVE_SHARED_GROUPS, self.remove_shared_groups.to_string())],
        )
    }

    fn use_policy(&self) -> Use {
        self.use_policy
    }

    fn supports(&self, event: &SystemEvent) -> bool {
        event.event_name == EventKind::ProjectCreate
    }

    async fn enforce(&self, ctx: &RuleContext<'_>, event: &SystemEvent) -> Result<Outcome> {
        let project = resolve_project(self.gitlab.as_ref(), event).await?;

        if !project.is_user_project() {
            return Ok(Outcome::Skipped);
        }
        if !self.remove_shared_groups || project.shared_with_groups.is_empty() {
            debug!(project = %project.path_with_namespace, "User project compliant");
            return Ok(Outcome::Compliant);
        }

        let mut removed = Vec::new();
        let mut first_error = None;
        for share in &project.shared_with_groups {
            match self
                .gitlab
                .unshare_project_with_group(project.id, share.group_id)
                .await
            {
                Ok(()) => removed.push(share.group_id),
                Err(e) => {
                    warn!(
                        project = %project.path_with_namespace,
                        group = %share.group_full_path,
                        error = %e,
                        "Failed to remove group share"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if removed.is_empty() {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }

        info!(
            project = %project.path_with_namespace,
            groups = ?removed,
            "Removed group shares from user project"
        );
        ctx.audit(
            NAME,
            AuditEvent::new(AuditEventType::ProjectUpdated)
                .with("projectId", project.id)
                .with("projectPath", project.path_with_namespace.clone())
                .with("removedSharedGroups", removed),
        );

        Ok(Outcome::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use enforcer_audit::AuditLog;
    use enforcer_client::{Call, MemoryGitLab, Namespace, NamespaceKind, Project, SharedGroup};
    use serde_json::json;

    fn shared_project(kind: NamespaceKind) -> Project {
        Project::new(1, "notes", Namespace::new(2, "jdoe", kind))
            .with_shared_group(SharedGroup::new(10, "devs"))
            .with_shared_group(SharedGroup::new(11, "ops"))
    }

    fn rule(gitlab: &Arc<MemoryGitLab>) -> UserProjectSettingsRule {
        let config = RuleConfig::new(UserProjectSettingsRule::ID).with("remove_shared_groups", "true");
        UserProjectSettingsRule::from_config(&config, gitlab.clone()).unwrap()
    }

    #[test]
    fn test_info_and_config() {
        let gitlab = Arc::new(MemoryGitLab::new());
        assert_eq!(
            rule(&gitlab).info(),
            "Enforce User Project Settings (remove_shared_groups=true)"
        );
        let typo = RuleConfig::new("user_project_settings").with("remove_shares", "true");
        assert!(UserProjectSettingsRule::from_config(&typo, gitlab).is_err());
    }

    #[tokio::test]
    async fn test_removes_all_shares_with_one_audit_entry() {
        let gitlab = Arc::new(MemoryGitLab::new());
        gitlab.add_project(shared_project(NamespaceKind::User));
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);
        let event = SystemEvent::new(EventKind::ProjectCreate, 1);

        let outcome = rule(&gitlab).handle(&ctx, &event).await.unwrap();
        assert_eq!(outcome, Outcome::Changed);
        assert_eq!(audit.len(), 1);
        assert_eq!(
            audit.recent(1)[0].event.get("removedSharedGroups"),
            Some(&json!([10, 11]))
        );
        assert!(gitlab.project(1).unwrap().shared_with_groups.is_empty());

        let outcome = rule(&gitlab).handle(&ctx, &event).await.unwrap();
        assert_eq!(outcome, Outcome::Compliant);
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_group_projects_are_untouched() {
        let gitlab = Arc::new(MemoryGitLab::new());
        let project = shared_project(NamespaceKind::Group);
        gitlab.add_project(project.clone());
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);

        let outcome = rule(&gitlab)
            .handle(&ctx, &SystemEvent::project_created(project))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(gitlab.calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_unshares_failing_is_an_error() {
        let gitlab = Arc::new(MemoryGitLab::new());
        gitlab.add_project(shared_project(NamespaceKind::User));
        gitlab.fail("unshare_project_with_group");
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);
        let event = SystemEvent::new(EventKind::ProjectCreate, 1);

        assert!(rule(&gitlab).handle(&ctx, &event).await.is_err());
        assert!(audit.is_empty());
        assert!(!gitlab
            .calls()
            .iter()
            .any(|c| matches!(c, Call::UnshareProject { .. })));
    }
}
