//! # Enforcer Audit
//!
//! Append-only audit trail of the changes the enforcer makes.
//!
//! Rules publish an [`AuditEvent`] through an [`AuditSink`] once per
//! effective change. [`AuditLog`] keeps the most recent entries in memory
//! and writes each one as a JSON line on the `audit` tracing target.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod error;

pub use audit::{
    AuditEntry, AuditEvent, AuditEventType, AuditLog, AuditQuery, AuditQueryBuilder, AuditSink,
    AUDIT_TARGET, DEFAULT_CAPACITY, PRINCIPAL,
};
pub use error::{AuditError, Result};
