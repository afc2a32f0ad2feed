//! Wiring from settings to a running dispatcher.

use crate::api::AppState;
use crate::config::Settings;
use enforcer_audit::AuditLog;
use enforcer_client::GitLabApi;
use enforcer_core::{ConfigError, Enforcer, RuleRegistry};
use std::sync::Arc;

/// The dispatcher and its audit trail.
#[derive(Clone)]
pub struct Service {
    /// Rule dispatcher.
    pub enforcer: Arc<Enforcer>,
    /// Audit trail shared by every rule.
    pub audit: Arc<AuditLog>,
}

impl Service {
    /// Build every configured rule against `gitlab`.
    ///
    /// Fails if any rule is unknown or misconfigured; no partial rule set is
    /// ever started.
    pub fn build(settings: &Settings, gitlab: Arc<dyn GitLabApi>) -> Result<Self, ConfigError> {
        let rules = RuleRegistry::with_builtin().build(&settings.rules, gitlab.clone())?;
        let audit = Arc::new(AuditLog::with_capacity(settings.enforcer.audit_capacity));
        let enforcer = Enforcer::new(gitlab, rules, audit.clone());

        for rule in enforcer.rules() {
            tracing::info!(rule = %rule.info(), use_policy = ?rule.use_policy(), "Rule configured");
        }

        Ok(Self {
            enforcer: Arc::new(enforcer),
            audit,
        })
    }

    /// Handler state for the HTTP API.
    pub fn app_state(&self, hook_token: &str) -> AppState {
        AppState {
            enforcer: self.enforcer.clone(),
            audit: self.audit.clone(),
            hook_token: Arc::from(hook_token),
        }
    }
}
