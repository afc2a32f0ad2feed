//! Built-in rules.

mod group_settings;
mod protected_branch;
mod push_rules;
mod user_project_settings;

pub use group_settings::GroupSettingsRule;
pub use protected_branch::ProtectedBranchRule;
pub use push_rules::PushRulesRule;
pub use user_project_settings::UserProjectSettingsRule;

use crate::error::{Result, RuleError};
use crate::event::SystemEvent;
use enforcer_client::{GitLabApi, Group, Project};
use std::collections::BTreeMap;

/// The project an event refers to: the embedded one, or fetched by ID.
///
/// A payload without an ID is rejected before any remote call.
pub(crate) async fn resolve_project(gitlab: &dyn GitLabApi, event: &SystemEvent) -> Result<Project> {
    match event.project() {
        Some(project) => Ok(project.clone()),
        None if event.id == 0 => Err(missing_id(event)),
        None => Ok(gitlab.get_project(event.id).await?),
    }
}

/// The group an event refers to: the embedded one, or fetched by ID.
pub(crate) async fn resolve_group(gitlab: &dyn GitLabApi, event: &SystemEvent) -> Result<Group> {
    match event.group() {
        Some(group) => Ok(group.clone()),
        None if event.id == 0 => Err(missing_id(event)),
        None => Ok(gitlab.get_group(event.id).await?),
    }
}

fn missing_id(event: &SystemEvent) -> RuleError {
    RuleError::InvalidEvent(format!(
        "{:?} for '{}' carries no resource id",
        event.event_name, event.path_with_namespace
    ))
}

/// Renders `name (k=v, ...)`.
pub(crate) fn describe<'a>(
    name: &str,
    settings: impl IntoIterator<Item = (&'a str, String)>,
) -> String {
    let parts: Vec<String> = settings
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!("{name} ({})", parts.join(", "))
}

/// Settings map as `(key, value)` pairs for [`describe`].
pub(crate) fn pairs(settings: &BTreeMap<String, String>) -> impl Iterator<Item = (&str, String)> {
    settings.iter().map(|(k, v)| (k.as_str(), v.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use enforcer_client::MemoryGitLab;

    // Lookups fail loudly, so reaching the API would surface as `Remote`.
    fn unreachable_gitlab() -> MemoryGitLab {
        let gitlab = MemoryGitLab::new();
        gitlab.fail("get_project");
        gitlab.fail("get_group");
        gitlab
    }

    #[tokio::test]
    async fn test_event_without_id_is_rejected_locally() {
        let gitlab = unreachable_gitlab();
        let event = SystemEvent::new(EventKind::ProjectCreate, 0).with_path_with_namespace("acme/web");

        let err = resolve_project(&gitlab, &event).await.unwrap_err();
        assert!(matches!(err, RuleError::InvalidEvent(ref msg) if msg.contains("acme/web")));

        let event = SystemEvent::new(EventKind::GroupCreate, 0);
        assert!(matches!(
            resolve_group(&gitlab, &event).await,
            Err(RuleError::InvalidEvent(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_by_id() {
        let gitlab = unreachable_gitlab();
        let event = SystemEvent::new(EventKind::GroupCreate, 7);
        assert!(matches!(
            resolve_group(&gitlab, &event).await,
            Err(RuleError::Remote(_))
        ));

        gitlab.recover("get_group");
        gitlab.add_group(Group::new(7, "acme", "acme"));
        assert_eq!(resolve_group(&gitlab, &event).await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_embedded_resource_needs_no_lookup() {
        let gitlab = unreachable_gitlab();
        let group = Group::new(0, "acme", "acme");

        let resolved = resolve_group(&gitlab, &SystemEvent::group_created(group))
            .await
            .unwrap();
        assert_eq!(resolved.full_path, "acme");
    }
}
