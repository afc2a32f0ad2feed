//! Protected branch rule.

use super::{describe, resolve_project};
use crate::config::RuleConfig;
use crate::context::Use;
use crate::error::{ConfigError, Result};
use crate::event::{EventKind, SystemEvent};
use crate::reconcile::{plan, BranchPlan};
use crate::rule::{Outcome, Rule, RuleContext};
use async_trait::async_trait;
use enforcer_audit::{AuditEvent, AuditEventType};
use enforcer_client::{AccessLevelKey, BranchAccessSetting, GitLabApi};
use std::sync::Arc;
use tracing::{debug, info, warn};

const NAME: &str = "Enforce Protected Branch";

const SKIP_USER_PROJECTS: &str = "skip_user_projects";
const KEEP_STRICTER: &str = "keep_stricter_access_level";
const BRANCH: &str = "name";

/// Keeps a named branch protected with the configured access levels.
pub struct ProtectedBranchRule {
    gitlab: Arc<dyn GitLabApi>,
    use_policy: Use,
    branch: String,
    skip_user_projects: bool,
    keep_stricter: bool,
    settings: Vec<BranchAccessSetting>,
}

impl ProtectedBranchRule {
    /// Registry identifier.
    pub const ID: &'static str = "protected_branch";

    /// Build the rule from its configuration.
    pub fn from_config(config: &RuleConfig, gitlab: Arc<dyn GitLabApi>) -> std::result::Result<Self, ConfigError> {
        let mut allowed = vec![SKIP_USER_PROJECTS, KEEP_STRICTER, BRANCH];
        allowed.extend(AccessLevelKey::ALL.iter().map(AccessLevelKey::as_str));
        config.reject_unknown(&allowed)?;

        let settings = config.access_levels()?;
        if settings.is_empty() {
            return Err(ConfigError::NoSettings(config.rule.clone()));
        }

        Ok(Self {
            gitlab,
            use_policy: config.use_policy,
            branch: config.required(BRANCH)?.to_string(),
            skip_user_projects: config.flag(SKIP_USER_PROJECTS, false)?,
            keep_stricter: config.flag(KEEP_STRICTER, false)?,
            settings,
        })
    }

    /// Name of the enforced branch.
    pub fn branch(&self) -> &str {
        &self.branch
    }
}

#[async_trait]
impl Rule for ProtectedBranchRule {
    fn name(&self) -> &str {
        NAME
    }

    fn info(&self) -> String {
        let mut fields = vec![
            (SKIP_USER_PROJECTS, self.skip_user_projects.to_string()),
            (KEEP_STRICTER, self.keep_stricter.to_string()),
            (BRANCH, self.branch.clone()),
        ];
        fields.extend(
            self.settings
                .iter()
                .map(|s| (s.key.as_str(), s.permission.access_level())),
        );
        describe(NAME, fields)
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

        let branches = self.gitlab.list_protected_branches(project.id).await?;
        let existing = branches.iter().find(|b| b.name == self.branch);

        let settings = match plan(existing, &self.settings, self.keep_stricter) {
            BranchPlan::Compliant => {
                debug!(
                    project = %project.path_with_namespace,
                    branch = %self.branch,
                    "Protected branch compliant"
                );
                return Ok(Outcome::Compliant);
            }
            BranchPlan::Create(settings) => settings,
            BranchPlan::Replace(settings) => {
                self.gitlab
                    .unprotect_branch(project.id, &self.branch)
                    .await?;
                settings
            }
        };

        if let Err(e) = self
            .gitlab
            .protect_branch(project.id, &self.branch, &settings)
            .await
        {
            if existing.is_some() {
                warn!(
                    project = %project.path_with_namespace,
                    branch = %self.branch,
                    "Branch left unprotected after failed re-protection"
                );
            }
            return Err(e.into());
        }

        let applied: Vec<String> = settings.iter().map(ToString::to_string).collect();
        info!(
            project = %project.path_with_namespace,
            branch = %self.branch,
            settings = ?applied,
            "Protected branch enforced"
        );
        ctx.audit(
            NAME,
            AuditEvent::new(AuditEventType::ProjectUpdated)
                .with("projectId", project.id)
                .with("projectPath", project.path_with_namespace.clone())
                .with("branch", self.branch.clone())
                .with("accessLevels", applied),
        );

        Ok(Outcome::Changed)
    }
}
