//! Rule configuration as loaded from the settings file.

use crate::context::Use;
use crate::error::ConfigError;
use enforcer_client::{AccessLevelKey, BranchAccessSetting, Permission};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One configured rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule type identifier, e.g. `protected_branch`.
    pub rule: String,
    /// When the rule applies.
    #[serde(default, rename = "use")]
    pub use_policy: Use,
    /// Rule-specific settings.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl RuleConfig {
    /// A rule of type `rule` with no settings.
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            ..Default::default()
        }
    }

    /// Sets the `Use` policy.
    pub fn with_use(mut self, use_policy: Use) -> Self {
        self.use_policy = use_policy;
        self
    }

    /// Adds a setting.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// A setting that must be present and non-blank.
    pub fn required(&self, key: &str) -> Result<&str, ConfigError> {
        match self.config.get(key).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::MissingSetting {
                rule: self.rule.clone(),
                key: key.to_string(),
            }),
        }
    }

    /// A boolean setting, `default` when absent.
    pub fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.config.get(key) {
            None => Ok(default),
            Some(raw) => parse_bool(raw).ok_or_else(|| self.invalid(key, raw, "expected true or false")),
        }
    }

    /// Fails on the first key outside `allowed`.
    pub fn reject_unknown(&self, allowed: &[&str]) -> Result<(), ConfigError> {
        match self.config.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(ConfigError::UnknownSetting {
                rule: self.rule.clone(),
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Desired protected-branch pairs, ordered push, merge, unprotect.
    ///
    /// Values are ranks (`"40"`) or names (`"maintainer"`); a comma-separated
    /// value yields one pair per entry.
    pub fn access_levels(&self) -> Result<Vec<BranchAccessSetting>, ConfigError> {
        let mut settings = Vec::new();
        for key in AccessLevelKey::ALL {
            let Some(raw) = self.config.get(key.as_str()) else {
                continue;
            };
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let permission: Permission = part
                    .parse()
                    .map_err(|e| self.invalid(key.as_str(), raw, &format!("{e}")))?;
                settings.push(BranchAccessSetting::new(key, permission));
            }
        }
        Ok(settings)
    }

    /// Builds an [`ConfigError::InvalidValue`] for this rule.
    pub fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            rule: self.rule.clone(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parses `true`/`false` in any case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
