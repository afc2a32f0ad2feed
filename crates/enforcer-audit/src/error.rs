//! Error types for the audit trail.

use thiserror::Error;

/// Audit trail errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// No entry with this ID is retained.
    #[error("Audit entry not found: {0}")]
    NotFound(u64),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
