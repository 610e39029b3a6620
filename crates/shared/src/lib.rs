//! Shared primitives for the résumé landing-page generator's backend
//! service spine: configuration, identifiers, database bootstrap, and
//! tracing setup. Every other crate in the workspace depends on this
//! one; this one depends on nothing in the workspace.

pub mod config;
pub mod db;
pub mod ids;
pub mod logging;

pub use config::{Config, LlmBackendKind};
pub use db::{create_migration_pool, create_pool, run_migrations};
pub use ids::{CredentialId, JobId, PayloadRef, PrincipalId, SessionId};
pub use logging::init_tracing;
