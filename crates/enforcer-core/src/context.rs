//! Execution contexts and the `Use` gating policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What triggered an enforcement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionContext {
    /// A system hook delivered by GitLab.
    Hook,
    /// The periodic scheduler.
    Scheduled,
    /// A one-shot command run by an operator.
    Command,
}

impl ExecutionContext {
    /// Returns true if a rule with `policy` may run in this context.
    ///
    /// Hooks and commands run every rule. Scheduled scans only run rules
    /// marked [`Use::Always`].
    pub fn permits(&self, policy: Use) -> bool {
        match self {
            ExecutionContext::Hook | ExecutionContext::Command => true,
            ExecutionContext::Scheduled => policy == Use::Always,
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionContext::Hook => "HOOK",
            ExecutionContext::Scheduled => "SCHEDULED",
            ExecutionContext::Command => "COMMAND",
        };
        f.write_str(s)
    }
}

/// When a rule applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Use {
    /// Only when a resource is created (hooks and commands).
    #[default]
    #[serde(alias = "ONCE")]
    Once,
    /// Also re-asserted on every scheduled scan.
    #[serde(alias = "ALWAYS")]
    Always,
}

impl fmt::Display for Use {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Use::Once => "once",
            Use::Always => "always",
        })
    }
}
