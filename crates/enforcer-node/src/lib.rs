//! # Enforcer Node
//!
//! The policy enforcement service.
//!
//! A node receives GitLab system hooks, dispatches each create event to the
//! configured rules, and periodically re-scans every group and project so
//! `use: always` rules correct drift. Every change a rule makes is recorded
//! in the audit trail and logged on the `audit` target.
//!
//! ## Modules
//!
//! - [`api`] - system-hook receiver, health, status and audit endpoints
//! - [`config`] - layered settings with validation
//! - [`observability`] - structured logging
//! - [`scheduler`] - periodic full scans
//! - [`service`] - builds the dispatcher from settings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod observability;
pub mod scheduler;
pub mod service;

pub use api::{create_router, AppState};
pub use config::{Settings, SettingsError};
pub use scheduler::Scheduler;
pub use service::Service;
