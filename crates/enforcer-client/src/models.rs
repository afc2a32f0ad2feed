//! Groups, projects and push rules as returned by the API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A group (top-level or subgroup).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group ID.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// URL path segment.
    #[serde(default)]
    pub path: String,
    /// Full path including parent groups.
    #[serde(default)]
    pub full_path: String,
    /// Every other attribute the server returned (visibility, locks, ...).
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl Group {
    /// Create a group with no extra attributes.
    pub fn new(id: u64, name: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id,
            name: name.into(),
            full_path: path.clone(),
            path,
            settings: Map::new(),
        }
    }

    /// Set an attribute.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// The attribute `key` rendered the way it is sent as a request
    /// parameter. Missing and `null` attributes yield `None`.
    pub fn setting(&self, key: &str) -> Option<String> {
        match self.settings.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Kind of namespace a project lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Personal namespace of a user.
    User,
    /// Group namespace.
    Group,
}

/// Namespace a project belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace ID.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Path.
    #[serde(default)]
    pub path: String,
    /// User or group namespace.
    pub kind: NamespaceKind,
}

impl Namespace {
    /// Create a namespace.
    pub fn new(id: u64, path: impl Into<String>, kind: NamespaceKind) -> Self {
        let path = path.into();
        Self {
            id,
            name: path.clone(),
            path,
            kind,
        }
    }
}

/// A group a project has been shared with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedGroup {
    /// ID of the group.
    pub group_id: u64,
    /// Name of the group.
    #[serde(default)]
    pub group_name: String,
    /// Full path of the group.
    #[serde(default)]
    pub group_full_path: String,
}

impl SharedGroup {
    /// Create a share entry.
    pub fn new(group_id: u64, group_name: impl Into<String>) -> Self {
        let group_name = group_name.into();
        Self {
            group_id,
            group_full_path: group_name.clone(),
            group_name,
        }
    }
}

/// A project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project ID.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// URL path segment.
    #[serde(default)]
    pub path: String,
    /// `namespace/path`.
    #[serde(default)]
    pub path_with_namespace: String,
    /// Owning namespace.
    #[serde(default)]
    pub namespace: Option<Namespace>,
    /// Groups the project is shared with.
    #[serde(default)]
    pub shared_with_groups: Vec<SharedGroup>,
    /// `enabled`, `private` or `disabled`.
    #[serde(default)]
    pub repository_access_level: Option<String>,
}

impl Project {
    /// Create a project in `namespace`.
    pub fn new(id: u64, path: impl Into<String>, namespace: Namespace) -> Self {
        let path = path.into();
        Self {
            id,
            name: path.clone(),
            path_with_namespace: format!("{}/{}", namespace.path, path),
            path,
            namespace: Some(namespace),
            shared_with_groups: Vec::new(),
            repository_access_level: None,
        }
    }

    /// Share the project with a group.
    pub fn with_shared_group(mut self, group: SharedGroup) -> Self {
        self.shared_with_groups.push(group);
        self
    }

    /// Kind of the owning namespace, if known.
    pub fn kind(&self) -> Option<NamespaceKind> {
        self.namespace.as_ref().map(|ns| ns.kind)
    }

    /// Returns true if the project lives in a personal namespace.
    pub fn is_user_project(&self) -> bool {
        self.kind() == Some(NamespaceKind::User)
    }

    /// Returns false if the repository feature is disabled.
    pub fn has_repository(&self) -> bool {
        self.repository_access_level.as_deref() != Some("disabled")
    }
}

/// Push rule attribute names accepted by the API.
pub const PUSH_RULE_KEYS: &[&str] = &[
    "commit_message_regex",
    "commit_message_negative_regex",
    "branch_name_regex",
    "deny_delete_tag",
    "member_check",
    "prevent_secrets",
    "author_email_regex",
    "file_name_regex",
    "max_file_size",
    "commit_committer_check",
    "reject_unsigned_commits",
];

/// Push rules of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushRules {
    /// Push rule ID.
    #[serde(default)]
    pub id: Option<u64>,
    /// Creation timestamp as sent by the server.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Commit messages must match.
    #[serde(default)]
    pub commit_message_regex: Option<String>,
    /// Commit messages must not match.
    #[serde(default)]
    pub commit_message_negative_regex: Option<String>,
    /// New branch names must match.
    #[serde(default)]
    pub branch_name_regex: Option<String>,
    /// Tags cannot be deleted.
    #[serde(default)]
    pub deny_delete_tag: bool,
    /// Commit authors must be project members.
    #[serde(default)]
    pub member_check: bool,
    /// Reject files that look like secrets.
    #[serde(default)]
    pub prevent_secrets: bool,
    /// Commit author emails must match.
    #[serde(default)]
    pub author_email_regex: Option<String>,
    /// Pushed file names must not match.
    #[serde(default)]
    pub file_name_regex: Option<String>,
    /// Largest file accepted, in MiB.
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Committer email must be verified for the pusher.
    #[serde(default)]
    pub commit_committer_check: bool,
    /// Reject commits without a signature.
    #[serde(default)]
    pub reject_unsigned_commits: bool,
}

impl PushRules {
    /// Current value of the attribute `key` in request-parameter form.
    ///
    /// Unknown keys and unset attributes yield `None`.
    pub fn value_of(&self, key: &str) -> Option<String> {
        match key {
            "commit_message_regex" => self.commit_message_regex.clone(),
            "commit_message_negative_regex" => self.commit_message_negative_regex.clone(),
            "branch_name_regex" => self.branch_name_regex.clone(),
            "deny_delete_tag" => Some(self.deny_delete_tag.to_string()),
            "member_check" => Some(self.member_check.to_string()),
            "prevent_secrets" => Some(self.prevent_secrets.to_string()),
            "author_email_regex" => self.author_email_regex.clone(),
            "file_name_regex" => self.file_name_regex.clone(),
            "max_file_size" => self.max_file_size.map(|v| v.to_string()),
            "commit_committer_check" => Some(self.commit_committer_check.to_string()),
            "reject_unsigned_commits" => Some(self.reject_unsigned_commits.to_string()),
            _ => None,
        }
    }

    /// Returns true if `key` is already set to `value`.
    pub fn is_rule_active(&self, key: &str, value: &str) -> bool {
        self.value_of(key).as_deref() == Some(value)
    }

    /// Apply `key=value` the way the server would. Unknown keys are ignored.
    pub fn apply(&mut self, key: &str, value: &str) {
        let flag = value.eq_ignore_ascii_case("true");
        let text = Some(value.to_string());
        match key {
            "commit_message_regex" => self.commit_message_regex = text,
            "commit_message_negative_regex" => self.commit_message_negative_regex = text,
            "branch_name_regex" => self.branch_name_regex = text,
            "deny_delete_tag" => self.deny_delete_tag = flag,
            "member_check" => self.member_check = flag,
            "prevent_secrets" => self.prevent_secrets = flag,
            "author_email_regex" => self.author_email_regex = text,
            "file_name_regex" => self.file_name_regex = text,
            "max_file_size" => self.max_file_size = value.parse().ok(),
            "commit_committer_check" => self.commit_committer_check = flag,
            "reject_unsigned_commits" => self.reject_unsigned_commits = flag,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_captures_extra_settings() {
        let json = r#"{
            "id": 5,
            "name": "Platform",
            "path": "platform",
            "full_path": "acme/platform",
            "membership_lock": true,
            "visibility": "private",
            "project_creation_level": null,
            "shared_runners_minutes_limit": 400
        }"#;

        let group: Group = serde_json::from_str(json).unwrap();
        assert_eq!(group.full_path, "acme/platform");
        assert_eq!(group.setting("membership_lock").as_deref(), Some("true"));
        assert_eq!(group.setting("visibility").as_deref(), Some("private"));
        assert_eq!(
            group.setting("shared_runners_minutes_limit").as_deref(),
            Some("400")
        );
        assert_eq!(group.setting("project_creation_level"), None);
        assert_eq!(group.setting("missing"), None);
    }

    #[test]
    fn test_project_kind() {
        let json = r#"{
            "id": 42,
            "name": "api",
            "path": "api",
            "path_with_namespace": "jdoe/api",
            "namespace": {"id": 3, "name": "jdoe", "path": "jdoe", "kind": "user"},
            "shared_with_groups": [{"group_id": 9, "group_name": "devs", "group_full_path": "acme/devs", "group_access_level": 30}],
            "repository_access_level": "enabled"
        }"#;

        let project: Project = serde_json::from_str(json).unwrap();
        assert!(project.is_user_project());
        assert!(project.has_repository());
        assert_eq!(project.shared_with_groups[0].group_id, 9);

        let group_project = Project::new(1, "web", Namespace::new(2, "acme", NamespaceKind::Group));
        assert!(!group_project.is_user_project());
        assert_eq!(group_project.path_with_namespace, "acme/web");
    }

    #[test]
    fn test_project_without_repository() {
        let mut project = Project::new(1, "wiki", Namespace::new(2, "acme", NamespaceKind::Group));
        project.repository_access_level = Some("disabled".into());
        assert!(!project.has_repository());
    }

    #[test]
    fn test_push_rules_active() {
        let rules = PushRules {
            member_check: true,
            commit_message_regex: Some("^JIRA-".into()),
            max_file_size: Some(10),
            ..Default::default()
        };

        assert!(rules.is_rule_active("member_check", "true"));
        assert!(!rules.is_rule_active("prevent_secrets", "true"));
        assert!(rules.is_rule_active("prevent_secrets", "false"));
        assert!(rules.is_rule_active("commit_message_regex", "^JIRA-"));
        assert!(rules.is_rule_active("max_file_size", "10"));
        assert!(!rules.is_rule_active("branch_name_regex", ""));
        assert!(!rules.is_rule_active("unknown", "true"));
    }

    #[test]
    fn test_push_rules_apply() {
        let mut rules = PushRules::default();
        rules.apply("prevent_secrets", "true");
        rules.apply("file_name_regex", "\\.pem$");
        rules.apply("max_file_size", "20");

        assert!(rules.prevent_secrets);
        assert_eq!(rules.file_name_regex.as_deref(), Some("\\.pem$"));
        assert_eq!(rules.max_file_size, Some(20));
        for key in PUSH_RULE_KEYS {
            assert!(rules.value_of(key).is_some() || !rules.is_rule_active(key, "x"));
        }
    }
}
