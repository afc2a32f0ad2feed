//! Maps rule type identifiers to constructors.

use crate::config::RuleConfig;
use crate::error::ConfigError;
use crate::rule::Rule;
use crate::rules::{GroupSettingsRule, ProtectedBranchRule, PushRulesRule, UserProjectSettingsRule};
use enforcer_client::GitLabApi;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a rule from its configuration.
pub type RuleFactory =
    fn(&RuleConfig, Arc<dyn GitLabApi>) -> Result<Box<dyn Rule>, ConfigError>;

/// Registry of rule factories.
#[derive(Default)]
pub struct RuleRegistry {
    factories: BTreeMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in rule.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(GroupSettingsRule::ID, |config, gitlab| {
            Ok(Box::new(GroupSettingsRule::from_config(config, gitlab)?))
        });
        registry.register(ProtectedBranchRule::ID, |config, gitlab| {
            Ok(Box::new(ProtectedBranchRule::from_config(config, gitlab)?))
        });
        registry.register(PushRulesRule::ID, |config, gitlab| {
            Ok(Box::new(PushRulesRule::from_config(config, gitlab)?))
        });
        registry.register(UserProjectSettingsRule::ID, |config, gitlab| {
            Ok(Box::new(UserProjectSettingsRule::from_config(config, gitlab)?))
        });
        registry
    }

    /// Register a factory, replacing any previous one for `id`.
    pub fn register(&mut self, id: impl Into<String>, factory: RuleFactory) {
        self.factories.insert(id.into(), factory);
    }

    /// Registered identifiers.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build one rule.
    pub fn create(
        &self,
        config: &RuleConfig,
        gitlab: Arc<dyn GitLabApi>,
    ) -> Result<Box<dyn Rule>, ConfigError> {
        let factory = self
            .factories
            .get(config.rule.as_str())
            .ok_or_else(|| ConfigError::UnknownRule(config.rule.clone()))?;
        factory(config, gitlab)
    }

    /// Build every configured rule, in order. Any invalid rule fails the
    /// whole set.
    pub fn build(
        &self,
        configs: &[RuleConfig],
        gitlab: Arc<dyn GitLabApi>,
    ) -> Result<Vec<Box<dyn Rule>>, ConfigError> {
        configs
            .iter()
            .map(|config| self.create(config, gitlab.clone()))
            .collect()
    }
}
