//! # Enforcer Client
//!
//! GitLab REST access for the policy enforcer.
//!
//! This crate provides:
//!
//! - **Permissions**: the ordered access-level model and its strictness rules
//! - **Models**: groups, projects, protected branches and push rules
//! - **Pagination**: `Link` header parsing and all-or-nothing list fetches
//! - **Clients**: the [`GitLabApi`] trait, a reqwest implementation and an
//!   in-memory backend
//!
//! ## Example
//!
//! ```rust,no_run
//! use enforcer_client::{ClientConfig, GitLabApi, GitLabClient};
//!
//! # async fn example() -> enforcer_client::Result<()> {
//! let client = GitLabClient::new(ClientConfig::new("https://gitlab.example.com", "glpat-xxx"))?;
//! for group in client.list_groups().await? {
//!     println!("{}", group.full_path);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod branch;
pub mod client;
pub mod error;
pub mod memory;
pub mod models;
pub mod pagination;
pub mod permission;

pub use api::{GitLabApi, Settings};
pub use branch::{AccessLevel, AccessLevelKey, BranchAccessSetting, ProtectedBranch};
pub use client::{ClientConfig, GitLabClient};
pub use error::{ClientError, Result};
pub use memory::{Call, MemoryGitLab};
pub use models::{Group, Namespace, NamespaceKind, Project, PushRules, SharedGroup, PUSH_RULE_KEYS};
pub use pagination::{next_link, parse_next};
pub use permission::Permission;
