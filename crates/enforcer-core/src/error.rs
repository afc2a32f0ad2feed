//! Error types for rules and their configuration.

use enforcer_client::ClientError;
use thiserror::Error;

/// Invalid rule configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No factory is registered under this rule type.
    #[error("Unknown rule type '{0}'")]
    UnknownRule(String),

    /// A required setting is absent.
    #[error("Rule '{rule}': missing required setting '{key}'")]
    MissingSetting {
        /// Rule type.
        rule: String,
        /// Setting name.
        key: String,
    },

    /// A setting the rule does not understand.
    #[error("Rule '{rule}': unknown setting '{key}'")]
    UnknownSetting {
        /// Rule type.
        rule: String,
        /// Setting name.
        key: String,
    },

    /// A setting whose value cannot be used.
    #[error("Rule '{rule}': invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        /// Rule type.
        rule: String,
        /// Setting name.
        key: String,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The rule has nothing to enforce.
    #[error("Rule '{0}': no settings to enforce")]
    NoSettings(String),
}

/// Failure while a rule runs. Logged and skipped by the dispatcher.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A remote call or paginated fetch failed.
    #[error("Remote call failed: {0}")]
    Remote(#[from] ClientError),

    /// The event does not identify a usable resource.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

/// Result type for rule execution.
pub type Result<T> = std::result::Result<T, RuleError>;
