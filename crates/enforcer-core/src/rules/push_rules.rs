//! Push rules rule.

use super::{describe, pairs, resolve_project};
use crate::config::{parse_bool, RuleConfig};
use crate::context::Use;
use crate::error::{ConfigError, Result};
use crate::event::{EventKind, SystemEvent};
use crate::rule::{Outcome, Rule, RuleContext};
use async_trait::async_trait;
use enforcer_audit::{AuditEvent, AuditEventType};
use enforcer_client::{GitLabApi, Settings, PUSH_RULE_KEYS};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

const NAME: &str = "Enforce Push Rules";

const SKIP_USER_PROJECTS: &str = "skip_user_projects";

const FLAG_KEYS: &[&str] = &[
    "deny_delete_tag",
    "member_check",
    "prevent_secrets",
    "commit_committer_check",
    "reject_unsigned_commits",
];

/// Normalize a push rule value to the form the server reports back.
fn normalize(config: &RuleConfig, key: &str, raw: &str) -> std::result::Result<String, ConfigError> {
    let raw = raw.trim();
    if FLAG_KEYS.contains(&key) {
        return parse_bool(raw)
            .map(|b| b.to_string())
            .ok_or_else(|| config.invalid(key, raw, "expected true or false"));
    }
    if key == "max_file_size" {
        return raw
            .parse::<u64>()
            .map(|n| n.to_string())
            .map_err(|e| config.invalid(key, raw, &e.to_string()));
    }
    if !raw.is_empty() {
        Regex::new(raw).map_err(|e| config.invalid(key, raw, &e.to_string()))?;
    }
    Ok(raw.to_string())
}

/// Keeps project push rules at configured values.
pub struct PushRulesRule {
    gitlab: Arc<dyn GitLabApi>,
    use_policy: Use,
    skip_user_projects: bool,
    settings: Settings,
}

impl PushRulesRule {
    /// Registry identifier.
    pub const ID: &'static str = "push_rules";

    /// Build the rule from its configuration.
    pub fn from_config(
        config: &RuleConfig,
        gitlab: Arc<dyn GitLabApi>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut allowed = PUSH_RULE_KEYS.to_vec();
        allowed.push(SKIP_USER_PROJECTS);
        config.reject_unknown(&allowed)?;

        let mut settings = Settings::new();
        for (key, value) in &config.config {
            if key != SKIP_USER_PROJECTS {
                settings.insert(key.clone(), normalize(config, key, value)?);
            }
        }
        if settings.is_empty() {
            return Err(ConfigError::NoSettings(config.rule.clone()));
        }

        Ok(Self {
            gitlab,
            use_policy: config.use_policy,
            skip_user_projects: config.flag(SKIP_USER_PROJECTS, false)?,
            settings,
        })
    }
}

#[async_trait]
impl Rule for PushRulesRule {
    fn name(&self) -> &str {
        NAME
    }

    fn info(&self) -> String {
        let skip = [(SKIP_USER_PROJECTS, self.skip_user_projects.to_string())];
        describe(NAME, skip.into_iter().chain(pairs(&self.settings)))
    }

    fn use_policy(&self) -> Use {
        self.use_policy
    }

    fn supports(&self, event: &SystemEvent) -> bool {
        event.event_name == EventKind::ProjectCreate
    }

    async fn enforce(&self, ctx: &RuleContext<'_>, event: &SystemEvent) -> Result<Outcome> {
        let project = resolve_project(self.gitlab.as_ref(), event).await?;

        if self.skip_user_projects && project.is_user_project() {
            debug!(project = %project.path_with_namespace, "Skipping user project");
            return Ok(Outcome::Skipped);
        }
        if !project.has_repository() {
            debug!(project = %project.path_with_namespace, "Skipping project without repository");
            return Ok(Outcome::Skipped);
        }

        let action = match self.gitlab.get_push_rules(project.id).await? {
            None => {
                self.gitlab
                    .create_push_rules(project.id, &self.settings)
                    .await?;
                "created"
            }
            Some(current) => {
                let compliant = self
                    .settings
                    .iter()
                    .all(|(key, value)| current.is_rule_active(key, value));
                if compliant {
                    debug!(project = %project.path_with_namespace, "Push rules compliant");
                    return Ok(Outcome::Compliant);
                }
                self.gitlab
                    .update_push_rules(project.id, &self.settings)
                    .await?;
                "updated"
            }
        };

        info!(project = %project.path_with_namespace, action, "Push rules enforced");
        ctx.audit(
            NAME,
            AuditEvent::new(AuditEventType::ProjectUpdated)
                .with("projectId", project.id)
                .with("projectPath", project.path_with_namespace.clone())
                .with("pushRules", action),
        );

        Ok(Outcome::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use enforcer_audit::AuditLog;
    use enforcer_client::{Call, MemoryGitLab, Namespace, NamespaceKind, Project, PushRules};

    fn config() -> RuleConfig {
        RuleConfig::new(PushRulesRule::ID)
            .with("skip_user_projects", "true")
            .with("member_check", "TRUE")
            .with("commit_message_regex", "^(feat|fix):")
    }

    fn project(kind: NamespaceKind) -> Project {
        Project::new(1, "api", Namespace::new(2, "acme", kind))
    }

    #[test]
    fn test_config_validation() {
        let gitlab: Arc<dyn GitLabApi> = Arc::new(MemoryGitLab::new());
        let unknown = config().with("deny_force_push", "true");
        assert!(matches!(
            PushRulesRule::from_config(&unknown, gitlab.clone()),
            Err(ConfigError::UnknownSetting { .. })
        ));
        let bad_flag = config().with("prevent_secrets", "sometimes");
        assert!(PushRulesRule::from_config(&bad_flag, gitlab.clone()).is_err());
        let bad_regex = config().with("branch_name_regex", "(unclosed");
        assert!(PushRulesRule::from_config(&bad_regex, gitlab.clone()).is_err());
        let only_skip = RuleConfig::new("push_rules").with("skip_user_projects", "true");
        assert!(matches!(
            PushRulesRule::from_config(&only_skip, gitlab),
            Err(ConfigError::NoSettings(_))
        ));
    }

    #[test]
    fn test_info() {
        let rule = PushRulesRule::from_config(&config(), Arc::new(MemoryGitLab::new())).unwrap();
        assert_eq!(
            rule.info(),
            "Enforce Push Rules (skip_user_projects=true, commit_message_regex=^(feat|fix):, member_check=true)"
        );
    }

    #[tokio::test]
    async fn test_create_then_compliant() {
        let gitlab = Arc::new(MemoryGitLab::new());
        let rule = PushRulesRule::from_config(&config(), gitlab.clone()).unwrap();
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);
        let event = SystemEvent::project_created(project(NamespaceKind::Group));

        assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Changed);
        assert!(matches!(gitlab.calls()[0], Call::CreatePushRules { project_id: 1, .. }));
        assert_eq!(audit.recent(1)[0].event.get("pushRules").unwrap(), "created");

        assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Compliant);
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_updates_divergent_rules() {
        let gitlab = Arc::new(MemoryGitLab::new());
        gitlab.set_push_rules(
            1,
            PushRules {
                member_check: true,
                ..Default::default()
            },
        );
        let rule = PushRulesRule::from_config(&config(), gitlab.clone()).unwrap();
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);
        let event = SystemEvent::project_created(project(NamespaceKind::Group));

        assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Changed);
        assert!(matches!(gitlab.calls()[0], Call::UpdatePushRules { project_id: 1, .. }));
        assert_eq!(
            gitlab.push_rules(1).unwrap().commit_message_regex.as_deref(),
            Some("^(feat|fix):")
        );
    }

    #[tokio::test]
    async fn test_skips_user_and_repositoryless_projects() {
        let gitlab = Arc::new(MemoryGitLab::new());
        let rule = PushRulesRule::from_config(&config(), gitlab.clone()).unwrap();
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);

        let user = SystemEvent::project_created(project(NamespaceKind::User));
        assert_eq!(rule.handle(&ctx, &user).await.unwrap(), Outcome::Skipped);

        let mut no_repo = project(NamespaceKind::Group);
        no_repo.repository_access_level = Some("disabled".into());
        let event = SystemEvent::project_created(no_repo);
        assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Skipped);

        assert!(gitlab.calls().is_empty());
    }
}
