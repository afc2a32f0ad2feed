//! The enforcement dispatcher.

use crate::context::ExecutionContext;
use crate::event::SystemEvent;
use crate::rule::{Outcome, Rule, RuleContext};
use chrono::{DateTime, Utc};
use enforcer_audit::AuditSink;
use enforcer_client::GitLabApi;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Status exposed by the info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnforcerStatus {
    /// `info()` of every rule, in order.
    pub rules: Vec<String>,
    /// End of the last scan that enumerated both groups and projects.
    pub last_enforce: Option<DateTime<Utc>>,
}

/// Result of dispatching one event to every rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    /// Rules that support the event and were allowed to run.
    pub evaluated: usize,
    /// Rules that changed remote state.
    pub changed: usize,
    /// Rules that found the resource compliant.
    pub compliant: usize,
    /// Rules that declared the resource out of scope.
    pub skipped: usize,
    /// Rules held back by their `Use` policy.
    pub gated: usize,
    /// Rules that failed.
    pub failed: usize,
}

impl EventOutcome {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Unsupported => return,
            Outcome::Gated => {
                self.gated += 1;
                return;
            }
            Outcome::Skipped => self.skipped += 1,
            Outcome::Compliant => self.compliant += 1,
            Outcome::Changed => self.changed += 1,
        }
        self.evaluated += 1;
    }
}

/// Result of a full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Groups dispatched.
    pub groups: usize,
    /// Projects dispatched.
    pub projects: usize,
    /// Rule runs that changed remote state.
    pub changed: usize,
    /// Rule runs that failed.
    pub failed: usize,
    /// Rule runs held back by their `Use` policy.
    pub gated: usize,
    /// Whether both enumerations succeeded.
    pub complete: bool,
}

impl ScanReport {
    fn absorb(&mut self, outcome: EventOutcome) {
        self.changed += outcome.changed;
        self.failed += outcome.failed;
        self.gated += outcome.gated;
    }
}

/// Runs rules against events.
///
/// Rules run one at a time in registration order. A failing rule is logged
/// and does not stop the others.
pub struct Enforcer {
    gitlab: Arc<dyn GitLabApi>,
    rules: Vec<Box<dyn Rule>>,
    audit: Arc<dyn AuditSink>,
    last_enforce: RwLock<Option<DateTime<Utc>>>,
}

impl Enforcer {
    /// Create a dispatcher.
    pub fn new(
        gitlab: Arc<dyn GitLabApi>,
        rules: Vec<Box<dyn Rule>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            gitlab,
            rules,
            audit,
            last_enforce: RwLock::new(None),
        }
    }

    /// Registered rules.
    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Rule summaries and the time of the last complete scan.
    pub fn status(&self) -> EnforcerStatus {
        EnforcerStatus {
            rules: self.rules.iter().map(|r| r.info()).collect(),
            last_enforce: *self.last_enforce.read(),
        }
    }

    /// Dispatch one event to every rule.
    pub async fn enforce_event(
        &self,
        execution: ExecutionContext,
        event: &SystemEvent,
    ) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        if event.is_other() {
            return outcome;
        }

        let ctx = RuleContext::new(execution, self.audit.as_ref());
        for rule in &self.rules {
            match rule.handle(&ctx, event).await {
                Ok(result) => {
                    debug!(
                        rule = rule.name(),
                        event = ?event.event_name,
                        id = event.id,
                        outcome = ?result,
                        "Rule handled event"
                    );
                    outcome.record(result);
                }
                Err(e) => {
                    warn!(
                        rule = rule.name(),
                        event = ?event.event_name,
                        id = event.id,
                        path = %event.path_with_namespace,
                        error = %e,
                        "Rule failed"
                    );
                    outcome.evaluated += 1;
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// Enumerate every group, then every project, and dispatch a synthesized
    /// create event for each.
    ///
    /// A failed enumeration skips that half of the scan. The last-enforce
    /// time is only updated when both enumerations succeeded.
    pub async fn enforce_all(&self, execution: ExecutionContext) -> ScanReport {
        let started = Instant::now();
        let mut report = ScanReport::default();
        info!(execution = %execution, "Starting full enforcement");

        let groups_listed = match self.gitlab.list_groups().await {
            Ok(groups) => {
                for group in groups {
                    let outcome = self
                        .enforce_event(execution, &SystemEvent::group_created(group))
                        .await;
                    report.groups += 1;
                    report.absorb(outcome);
                }
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to list groups");
                false
            }
        };

        let projects_listed = match self.gitlab.list_projects().await {
            Ok(projects) => {
                for project in projects {
                    let outcome = self
                        .enforce_event(execution, &SystemEvent::project_created(project))
                        .await;
                    report.projects += 1;
                    report.absorb(outcome);
                }
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to list projects");
                false
            }
        };

        report.complete = groups_listed && projects_listed;
        if report.complete {
            *self.last_enforce.write() = Some(Utc::now());
        }

        info!(
            execution = %execution,
            groups = report.groups,
            projects = report.projects,
            changed = report.changed,
            failed = report.failed,
            complete = report.complete,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Full enforcement finished"
        );
        report
    }
}
