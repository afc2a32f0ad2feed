//! Logging setup for the service.
//!
//! Audit entries are written on the `audit` target by
//! [`enforcer_audit::AuditLog`], so enabling that target in `RUST_LOG` or
//! the JSON formatter is enough to ship the audit trail.

mod logging;

pub use logging::{init_logging, LogFormat};
