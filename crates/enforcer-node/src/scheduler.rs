//! Periodic full scans.

use crate::config::SchedulerSettings;
use enforcer_core::{Enforcer, ExecutionContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Runs `enforce_all(SCHEDULED)` on a fixed interval.
///
/// Ticks that come due while a scan is still running are delayed rather
/// than queued, so scans never overlap.
pub struct Scheduler {
    enforcer: Arc<Enforcer>,
    initial_delay: Duration,
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler from its settings.
    pub fn new(enforcer: Arc<Enforcer>, settings: &SchedulerSettings) -> Self {
        Self {
            enforcer,
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            interval: Duration::from_secs(settings.interval_secs.max(1)),
        }
    }

    /// Run forever.
    pub async fn run(self) {
        tracing::info!(
            initial_delay_secs = self.initial_delay.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        let start = time::Instant::now() + self.initial_delay;
        let mut ticker = time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let report = self.enforcer.enforce_all(ExecutionContext::Scheduled).await;
            if !report.complete {
                tracing::warn!(
                    groups = report.groups,
                    projects = report.projects,
                    "Scheduled scan incomplete"
                );
            }
        }
    }

    /// Run on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enforcer_audit::AuditLog;
    use enforcer_client::{Group, MemoryGitLab};
    use enforcer_core::{RuleConfig, RuleRegistry, Use};

    fn public_group() -> Group {
        Group::new(1, "acme", "acme").with_setting("visibility", "public")
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_initial_delay_then_on_interval() {
        let gitlab = Arc::new(MemoryGitLab::new());
        gitlab.add_group(public_group());
        let audit = Arc::new(AuditLog::new());
        let rules = RuleRegistry::with_builtin()
            .build(
                &[RuleConfig::new("group_settings")
                    .with_use(Use::Always)
                    .with("visibility", "private")],
                gitlab.clone(),
            )
            .unwrap();
        let enforcer = Arc::new(Enforcer::new(gitlab.clone(), rules, audit.clone()));
        let settings = SchedulerSettings {
            enabled: true,
            interval_secs: 60,
            initial_delay_secs: 10,
        };

        let handle = Scheduler::new(enforcer.clone(), &settings).spawn();

        time::sleep(Duration::from_secs(5)).await;
        assert!(enforcer.status().last_enforce.is_none());
        assert!(audit.is_empty());

        time::sleep(Duration::from_secs(10)).await;
        assert!(enforcer.status().last_enforce.is_some());
        assert_eq!(audit.len(), 1);

        // Drift introduced between scans is corrected on the next tick.
        gitlab.add_group(public_group());
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(audit.len(), 1);
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(audit.len(), 2);

        handle.abort();
    }
}
