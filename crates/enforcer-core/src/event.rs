//! System events: delivered by GitLab system hooks or synthesized by scans.

use chrono::{DateTime, NaiveDateTime, Utc};
use enforcer_client::{Group, Project};
use serde::{Deserialize, Serialize};

/// Event kinds the enforcer reacts to. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A group was created.
    GroupCreate,
    /// A project was created.
    ProjectCreate,
    /// Any other system hook event.
    #[serde(other)]
    Other,
}

/// The resource a scan already fetched for an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventObject {
    /// An embedded group.
    Group(Group),
    /// An embedded project.
    Project(Project),
}

/// A system event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSystemEvent")]
pub struct SystemEvent {
    /// Event kind.
    pub event_name: EventKind,
    /// ID of the group or project.
    pub id: u64,
    /// Resource name.
    pub name: String,
    /// Resource path.
    pub path: String,
    /// Full path of the resource.
    pub path_with_namespace: String,
    /// When the resource was created, if known.
    pub created_at: Option<DateTime<Utc>>,
    /// Resource already fetched by a scan.
    #[serde(skip)]
    pub object: Option<EventObject>,
}

/// Wire shape of a system hook payload.
///
/// Group events carry `group_id` and `full_path`, project events carry
/// `project_id` and `path_with_namespace`.
#[derive(Debug, Deserialize)]
struct RawSystemEvent {
    event_name: EventKind,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    project_id: Option<u64>,
    #[serde(default)]
    group_id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    path_with_namespace: Option<String>,
    #[serde(default)]
    full_path: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl TryFrom<RawSystemEvent> for SystemEvent {
    type Error = String;

    fn try_from(raw: RawSystemEvent) -> Result<Self, Self::Error> {
        let id = match raw.event_name {
            EventKind::GroupCreate => raw.group_id.or(raw.id),
            EventKind::ProjectCreate => raw.project_id.or(raw.id),
            EventKind::Other => raw.id.or(raw.project_id).or(raw.group_id),
        };
        let id = match (raw.event_name, id) {
            (_, Some(id)) => id,
            (EventKind::Other, None) => 0,
            (kind, None) => return Err(format!("{kind:?} event without a resource id")),
        };

        Ok(Self {
            event_name: raw.event_name,
            id,
            name: raw.name.unwrap_or_default(),
            path: raw.path.unwrap_or_default(),
            path_with_namespace: raw
                .path_with_namespace
                .or(raw.full_path)
                .unwrap_or_default(),
            created_at: raw.created_at.as_deref().and_then(parse_timestamp),
            object: None,
        })
    }
}

/// Accepts RFC 3339 and the `2012-07-21 07:30:54 UTC` form older GitLab
/// versions send.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S UTC")
        .ok()
        .map(|naive| naive.and_utc())
}

impl SystemEvent {
    /// A bare event of `kind` for resource `id`.
    pub fn new(event_name: EventKind, id: u64) -> Self {
        Self {
            event_name,
            id,
            name: String::new(),
            path: String::new(),
            path_with_namespace: String::new(),
            created_at: None,
            object: None,
        }
    }

    /// A `group_create` event carrying the group itself.
    pub fn group_created(group: Group) -> Self {
        Self {
            event_name: EventKind::GroupCreate,
            id: group.id,
            name: group.name.clone(),
            path: group.path.clone(),
            path_with_namespace: group.full_path.clone(),
            created_at: None,
            object: Some(EventObject::Group(group)),
        }
    }

    /// A `project_create` event carrying the project itself.
    pub fn project_created(project: Project) -> Self {
        Self {
            event_name: EventKind::ProjectCreate,
            id: project.id,
            name: project.name.clone(),
            path: project.path.clone(),
            path_with_namespace: project.path_with_namespace.clone(),
            created_at: None,
            object: Some(EventObject::Project(project)),
        }
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the full path.
    pub fn with_path_with_namespace(mut self, path: impl Into<String>) -> Self {
        self.path_with_namespace = path.into();
        self
    }

    /// Returns true for events no rule handles.
    pub fn is_other(&self) -> bool {
        self.event_name == EventKind::Other
    }

    /// The embedded group, if a scan supplied one.
    pub fn group(&self) -> Option<&Group> {
        match &self.object {
            Some(EventObject::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// The embedded project, if a scan supplied one.
    pub fn project(&self) -> Option<&Project> {
        match &self.object {
            Some(EventObject::Project(project)) => Some(project),
            _ => None,
        }
    }
}
