//! # Enforcer Core
//!
//! Policy rules and the engine that applies them to a GitLab instance.
//!
//! ## Overview
//!
//! - [`Rule`]: a policy with a `supports` predicate, a `Use` policy and an
//!   idempotent `enforce` step
//! - [`reconcile`]: the protected-branch decision procedure, including the
//!   keep-stricter merge
//! - [`RuleRegistry`]: builds rules from configuration by type identifier
//! - [`Enforcer`]: dispatches single events and full scans to every rule
//!
//! ## Gating
//!
//! Hooks and commands run every rule. Scheduled scans only run rules
//! configured with `use: always`, so `once` rules apply at creation time
//! and leave later manual changes alone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod enforcer;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod registry;
pub mod rule;
pub mod rules;

pub use config::RuleConfig;
pub use context::{ExecutionContext, Use};
pub use enforcer::{Enforcer, EnforcerStatus, EventOutcome, ScanReport};
pub use error::{ConfigError, Result, RuleError};
pub use event::{EventKind, EventObject, SystemEvent};
pub use reconcile::BranchPlan;
pub use registry::{RuleFactory, RuleRegistry};
pub use rule::{Outcome, Rule, RuleContext};
