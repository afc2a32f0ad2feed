//! The rule contract and its execution-context gating.

use crate::context::{ExecutionContext, Use};
use crate::error::Result;
use crate::event::SystemEvent;
use async_trait::async_trait;
use enforcer_audit::{AuditEntry, AuditEvent, AuditSink};
use serde::Serialize;
use tracing::debug;

/// What a rule did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The rule does not handle this event kind.
    Unsupported,
    /// The rule's `Use` policy forbids running in this context.
    Gated,
    /// The resource is out of the rule's scope (e.g. a user project).
    Skipped,
    /// Remote state already matched; nothing was written.
    Compliant,
    /// Remote state was changed and an audit entry was published.
    Changed,
}

/// Everything a rule needs besides its own settings.
pub struct RuleContext<'a> {
    /// What triggered the pass.
    pub execution: ExecutionContext,
    audit: &'a dyn AuditSink,
}

impl<'a> RuleContext<'a> {
    /// Create a context.
    pub fn new(execution: ExecutionContext, audit: &'a dyn AuditSink) -> Self {
        Self { execution, audit }
    }

    /// Publish an audit event tagged with the execution context and rule.
    pub fn audit(&self, rule: &str, event: AuditEvent) -> AuditEntry {
        self.audit.publish(
            event
                .with("execution", self.execution.to_string())
                .with("rule", rule),
        )
    }
}

/// A policy rule.
///
/// Implementations perform at most one audited change per event and publish
/// nothing when the resource is already compliant.
#[async_trait]
pub trait Rule: Send + Sync {
    /// Human readable rule name, used in logs and audit entries.
    fn name(&self) -> &str;

    /// One-line summary of the rule and its settings.
    fn info(&self) -> String;

    /// When the rule applies.
    fn use_policy(&self) -> Use;

    /// Returns true if the rule handles this kind of event. No side effects.
    fn supports(&self, event: &SystemEvent) -> bool;

    /// Enforce the rule for an event it supports.
    async fn enforce(&self, ctx: &RuleContext<'_>, event: &SystemEvent) -> Result<Outcome>;

    /// Gate on `supports` and the `Use` policy, then enforce.
    async fn handle(&self, ctx: &RuleContext<'_>, event: &SystemEvent) -> Result<Outcome> {
        if !self.supports(event) {
            return Ok(Outcome::Unsupported);
        }
        if !ctx.execution.permits(self.use_policy()) {
            debug!(
                rule = self.name(),
                execution = %ctx.execution,
                use_policy = %self.use_policy(),
                "Rule gated"
            );
            return Ok(Outcome::Gated);
        }
        self.enforce(ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use enforcer_audit::{AuditEventType, AuditLog};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRule {
        use_policy: Use,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Rule for CountingRule {
        fn name(&self) -> &str {
            "Counting"
        }

        fn info(&self) -> String {
            "Counting ()".to_string()
        }

        fn use_policy(&self) -> Use {
            self.use_policy
        }

        fn supports(&self, event: &SystemEvent) -> bool {
            event.event_name == EventKind::ProjectCreate
        }

        async fn enforce(&self, ctx: &RuleContext<'_>, _event: &SystemEvent) -> Result<Outcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.audit(self.name(), AuditEvent::new(AuditEventType::ProjectUpdated));
            Ok(Outcome::Changed)
        }
    }

    fn rule(use_policy: Use) -> CountingRule {
        CountingRule {
            use_policy,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_once_rule_never_runs_scheduled() {
        let audit = AuditLog::new();
        let rule = rule(Use::Once);
        let event = SystemEvent::new(EventKind::ProjectCreate, 1);

        let ctx = RuleContext::new(ExecutionContext::Scheduled, &audit);
        assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Gated);
        assert_eq!(rule.calls.load(Ordering::SeqCst), 0);

        for execution in [ExecutionContext::Hook, ExecutionContext::Command] {
            let ctx = RuleContext::new(execution, &audit);
            assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Changed);
        }
        assert_eq!(rule.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_always_rule_runs_scheduled() {
        let audit = AuditLog::new();
        let rule = rule(Use::Always);
        let ctx = RuleContext::new(ExecutionContext::Scheduled, &audit);
        let event = SystemEvent::new(EventKind::ProjectCreate, 1);

        assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Changed);
        let entry = &audit.recent(1)[0];
        assert_eq!(entry.event.get("execution").unwrap(), "SCHEDULED");
        assert_eq!(entry.event.get("rule").unwrap(), "Counting");
    }

    #[tokio::test]
    async fn test_unsupported_event() {
        let audit = AuditLog::new();
        let rule = rule(Use::Always);
        let ctx = RuleContext::new(ExecutionContext::Hook, &audit);
        let event = SystemEvent::new(EventKind::GroupCreate, 1);

        assert_eq!(rule.handle(&ctx, &event).await.unwrap(), Outcome::Unsupported);
        assert_eq!(rule.calls.load(Ordering::SeqCst), 0);
        assert!(audit.is_empty());
    }
}
