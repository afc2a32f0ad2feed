//! Audit events, the sink rules publish to, and the in-memory log.

use crate::error::{AuditError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of entries kept in memory.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// Principal recorded on every event.
pub const PRINCIPAL: &str = "gitlab-enforcer";

/// Tracing target audit entries are written to.
pub const AUDIT_TARGET: &str = "audit";

/// Kind of change that was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    /// Group attributes were changed.
    GroupUpdated,
    /// Project protection, push rules or sharing were changed.
    ProjectUpdated,
}

/// A change made by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Who made the change.
    pub principal: String,
    /// Kind of change.
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    /// Free-form details: execution context, rule, affected resource.
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl AuditEvent {
    /// Creates an event attributed to [`PRINCIPAL`].
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            principal: PRINCIPAL.to_string(),
            event_type,
            data: BTreeMap::new(),
        }
    }

    /// Adds a data field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Returns a data field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Sequence number, starting at 1.
    pub id: u64,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// The recorded event.
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Destination for audit events.
///
/// Publishing is synchronous: the entry is stored before `publish` returns.
pub trait AuditSink: Send + Sync {
    /// Records `event` and returns the stored entry.
    fn publish(&self, event: AuditEvent) -> AuditEntry;
}

/// Filter for [`AuditLog::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Only these event types.
    pub event_types: Option<Vec<AuditEventType>>,
    /// Only entries whose data holds every one of these key/value pairs.
    pub data: Vec<(String, Value)>,
    /// Only entries recorded at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent matches.
    pub limit: Option<usize>,
}

impl AuditQuery {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.contains(&entry.event.event_type) {
                return false;
            }
        }
        if self
            .data
            .iter()
            .any(|(key, value)| entry.event.get(key) != Some(value))
        {
            return false;
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Builder for [`AuditQuery`].
#[derive(Debug, Clone, Default)]
pub struct AuditQueryBuilder {
    query: AuditQuery,
}

impl AuditQueryBuilder {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by event types.
    pub fn event_types(mut self, types: Vec<AuditEventType>) -> Self {
        self.query.event_types = Some(types);
        self
    }

    /// Adds a data field filter.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.data.push((key.into(), value.into()));
        self
    }

    /// Filters by recording time.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.query.since = Some(since);
        self
    }

    /// Keeps only the `limit` most recent matches.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds the query.
    pub fn build(self) -> AuditQuery {
        self.query
    }
}

/// Bounded in-memory audit log. The oldest entries are dropped first.
#[derive(Debug)]
pub struct AuditLog {
    entries: RwLock<VecDeque<AuditEntry>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    /// Creates a log holding [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a log holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            next_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records an event.
    pub fn record(&self, event: AuditEvent) -> AuditEntry {
        let entry = AuditEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            event,
        };

        {
            let mut entries = self.entries.write();
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        match serde_json::to_string(&entry) {
            Ok(json) => tracing::info!(target: AUDIT_TARGET, "{}", json),
            Err(e) => tracing::warn!(
                target: AUDIT_TARGET,
                id = entry.id,
                error = %e,
                "audit entry could not be serialized"
            ),
        }

        entry
    }

    /// Returns a retained entry by ID.
    pub fn get(&self, id: u64) -> Result<AuditEntry> {
        self.entries
            .read()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(AuditError::NotFound(id))
    }

    /// Returns entries matching `query`, oldest first. With a limit, only
    /// the most recent matches are kept.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        let mut matches: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        matches.reverse();
        matches
    }

    /// Returns up to `limit` of the most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.query(&AuditQueryBuilder::new().limit(limit).build())
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Total number of entries ever recorded, including dropped ones.
    pub fn total_recorded(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }
}

impl AuditSink for AuditLog {
    fn publish(&self, event: AuditEvent) -> AuditEntry {
        self.record(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn project_event(id: u64) -> AuditEvent {
        AuditEvent::new(AuditEventType::ProjectUpdated)
            .with("execution", "HOOK")
            .with("rule", "Protected Branch")
            .with("projectId", id)
    }

    #[test]
    fn test_event_builder() {
        let event = project_event(7).with("branch", "main");
        assert_eq!(event.principal, PRINCIPAL);
        assert_eq!(event.get("projectId"), Some(&Value::from(7)));
        assert_eq!(event.get("branch"), Some(&Value::from("main")));
        assert_eq!(event.get("groupId"), None);
    }

    #[test]
    fn test_entry_serialization() {
        let log = AuditLog::new();
        let entry = log.record(project_event(7));
        let json: Value = serde_json::from_str(&serde_json::to_string(&entry).unwrap()).unwrap();

        assert_eq!(json["type"], "PROJECT_UPDATED");
        assert_eq!(json["principal"], "gitlab-enforcer");
        assert_eq!(json["data"]["execution"], "HOOK");
        assert_eq!(json["id"], 1);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_record_and_get() {
        let log = AuditLog::new();
        let entry = log.publish(project_event(1));
        assert_eq!(entry.id, 1);
        assert_eq!(log.get(1).unwrap(), entry);
        assert!(matches!(log.get(2), Err(AuditError::NotFound(2))));
    }

    #[test]
    fn test_query() {
        let log = AuditLog::new();
        log.record(project_event(1));
        log.record(AuditEvent::new(AuditEventType::GroupUpdated).with("groupId", 5));
        log.record(project_event(2));

        let projects = log.query(
            &AuditQueryBuilder::new()
                .event_types(vec![AuditEventType::ProjectUpdated])
                .build(),
        );
        assert_eq!(projects.len(), 2);

        let by_data = log.query(&AuditQueryBuilder::new().data("projectId", 2).build());
        assert_eq!(by_data.len(), 1);
        assert_eq!(by_data[0].id, 3);

        let latest = log.query(&AuditQueryBuilder::new().limit(2).build());
        let ids: Vec<u64> = latest.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let latest_project = log.query(
            &AuditQueryBuilder::new()
                .event_types(vec![AuditEventType::ProjectUpdated])
                .data("execution", "HOOK")
                .limit(1)
                .build(),
        );
        assert_eq!(latest_project.len(), 1);
        assert_eq!(latest_project[0].id, 3);

        let none = log.query(
            &AuditQueryBuilder::new()
                .data("projectId", 1)
                .data("projectId", 2)
                .build(),
        );
        assert!(none.is_empty());

        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(log.query(&AuditQueryBuilder::new().since(future).build()).is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let log = AuditLog::with_capacity(3);
        for i in 0..5 {
            log.record(project_event(i));
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.total_recorded(), 5);
        let ids: Vec<u64> = log.recent(10).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        let ids: Vec<u64> = log.recent(2).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    proptest! {
        #[test]
        fn prop_log_never_exceeds_capacity(capacity in 1usize..20, records in 0usize..60) {
            let log = AuditLog::with_capacity(capacity);
            for i in 0..records {
                log.record(project_event(i as u64));
            }
            prop_assert_eq!(log.len(), records.min(capacity));

            let ids: Vec<u64> = log.recent(capacity).iter().map(|e| e.id).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] + 1 == w[1]));
        }
    }
}
