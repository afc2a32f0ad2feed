//! Group settings rule.

use super::{describe, pairs, resolve_group};
use crate::config::{parse_bool, RuleConfig};
use crate::context::Use;
use crate::error::{ConfigError, Result};
use crate::event::{EventKind, SystemEvent};
use crate::rule::{Outcome, Rule, RuleContext};
use async_trait::async_trait;
use enforcer_audit::{AuditEvent, AuditEventType};
use enforcer_client::{GitLabApi, Settings};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

const NAME: &str = "Enforce Group Settings";

static ATTRIBUTE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid attribute regex"));

/// Attributes whose values are lower-case keywords on the server.
const KEYWORD_ATTRIBUTES: &[&str] = &[
    "visibility",
    "project_creation_level",
    "subgroup_creation_level",
    "shared_runners_setting",
];

/// Normalize a configured value to the form the server reports back.
fn normalize(key: &str, raw: &str) -> String {
    let raw = raw.trim();
    if let Some(flag) = parse_bool(raw) {
        return flag.to_string();
    }
    if KEYWORD_ATTRIBUTES.contains(&key) {
        return raw.to_ascii_lowercase();
    }
    raw.to_string()
}

/// Keeps group attributes (visibility, locks, ...) at configured values.
pub struct GroupSettingsRule {
    gitlab: Arc<dyn GitLabApi>,
    use_policy: Use,
    settings: Settings,
}

impl GroupSettingsRule {
    /// Registry identifier.
    pub const ID: &'static str = "group_settings";

    /// Build the rule from its configuration. Every setting is a group
    /// attribute.
    pub fn from_config(
        config: &RuleConfig,
        gitlab: Arc<dyn GitLabApi>,
    ) -> std::result::Result<Self, ConfigError> {
        if config.config.is_empty() {
            return Err(ConfigError::NoSettings(config.rule.clone()));
        }
        if let Some(key) = config.config.keys().find(|k| !ATTRIBUTE_NAME.is_match(k)) {
            return Err(config.invalid(key, key, "not a group attribute name"));
        }

        Ok(Self {
            gitlab,
            use_policy: config.use_policy,
            settings: config
                .config
                .iter()
                .map(|(k, v)| (k.clone(), normalize(k, v)))
                .collect(),
        })
    }
}

#[async_trait]
impl Rule for GroupSettingsRule {
    fn name(&self) -> &str {
        NAME
    }

    fn info(&self) -> String {
        describe(NAME, pairs(&self.settings))
    }

    fn use_policy(&self) -> Use {
        self.use_policy
    }

    fn supports(&self, event: &SystemEvent) -> bool {
        event.event_name == EventKind::GroupCreate
    }

    async fn enforce(&self, ctx: &RuleContext<'_>, event: &SystemEvent) -> Result<Outcome> {
        let group = resolve_group(self.gitlab.as_ref(), event).await?;

        let divergent: Settings = self
            .settings
            .iter()
            .filter(|(key, value)| group.setting(key).as_deref() != Some(value.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if divergent.is_empty() {
            debug!(group = %group.full_path, "Group settings compliant");
            return Ok(Outcome::Compliant);
        }

        self.gitlab.update_group(group.id, &divergent).await?;

        let changed: Vec<String> = divergent.keys().cloned().collect();
        info!(group = %group.full_path, settings = ?changed, "Group settings enforced");
        ctx.audit(
            NAME,
            AuditEvent::new(AuditEventType::GroupUpdated)
                .with("groupId", group.id)
                .with("groupPath", group.full_path.clone())
                .with("settings", changed),
        );

        Ok(Outcome::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use enforcer_audit::AuditLog;
    use enforcer_client::{Call, Group, MemoryGitLab};

    fn config() -> RuleConfig {
        RuleConfig::new(GroupSettingsRule::ID)
            .with("membership_lock", "true")
            .with("visibility", "private")
    }

    #[test]
    fn test_config_validation() {
        let gitlab: Arc<dyn GitLabApi> = Arc::new(MemoryGitLab::new());
        assert!(matches!(
            GroupSettingsRule::from_config(&RuleConfig::new("group_settings"), gitlab.clone()),
            Err(ConfigError::NoSettings(_))
        ));
        let bad = RuleConfig::new("group_settings").with("Visibility Level", "private");
        assert!(matches!(
            GroupSettingsRule::from_config(&bad, gitlab),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_normalizes_flags_and_keywords() {
        assert_eq!(normalize("membership_lock", " TRUE "), "true");
        assert_eq!(normalize("visibility", "Private"), "private");
        assert_eq!(normalize("description", "Platform Team"), "Platform Team");
    }

    #[test]
    fn test_info() {
        let rule = GroupSettingsRule::from_config(&config(), Arc::new(MemoryGitLab::new())).unwrap();
        assert_eq!(
            rule.info(),
            "Enforce Group Settings (membership_lock=true, visibility=private)"
        );
    }

    #[tokio::test]
    async fn test_updates_only_divergent_settings() {
        let gitlab = Arc::new(MemoryGitLab::new());
        let group = Group::new(5, "Platform", "platform")
            .with_setting("visibility", "private")
            .with_setting("membership_lock", false);
        gitlab.add_group(group.clone());

        let rule = GroupSettingsRule::from_config(&config(), gitlab.clone()).unwrap();
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);

        let outcome = rule
            .handle(&ctx, &SystemEvent::group_created(group))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Changed);

        let mut expected = Settings::new();
        expected.insert("membership_lock".into(), "true".into());
        assert_eq!(
            gitlab.calls(),
            vec![Call::UpdateGroup {
                group_id: 5,
                settings: expected,
            }]
        );

        let entry = &audit.recent(1)[0];
        assert_eq!(entry.event.event_type, AuditEventType::GroupUpdated);
        assert_eq!(entry.event.get("groupPath").unwrap(), "platform");

        // A hook for the same group now finds it compliant.
        let outcome = rule
            .handle(&ctx, &SystemEvent::new(EventKind::GroupCreate, 5))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Compliant);
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_mixed_case_config_converges() {
        let gitlab = Arc::new(MemoryGitLab::new());
        let group = Group::new(5, "Platform", "platform")
            .with_setting("visibility", "private")
            .with_setting("membership_lock", true);
        gitlab.add_group(group.clone());

        let config = RuleConfig::new(GroupSettingsRule::ID)
            .with("membership_lock", "TRUE")
            .with("visibility", "Private");
        let rule = GroupSettingsRule::from_config(&config, gitlab.clone()).unwrap();
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);

        let outcome = rule
            .handle(&ctx, &SystemEvent::group_created(group))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Compliant);
        assert!(audit.is_empty());
        assert!(gitlab.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ignores_project_events() {
        let gitlab = Arc::new(MemoryGitLab::new());
        let rule = GroupSettingsRule::from_config(&config(), gitlab.clone()).unwrap();
        let audit = AuditLog::new();
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);

        let outcome = rule
            .handle(&ctx, &SystemEvent::new(EventKind::ProjectCreate, 5))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Unsupported);
    }
}
