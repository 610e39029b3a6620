//! Credential Store: opaque session issuance, cap enforcement with
//! oldest-session eviction, and a revocation list that outlives the
//! evicted credential's natural expiry.

pub mod error;
pub mod model;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use error::{CredentialError, CredentialResult};
pub use model::{RevocationEntry, SessionRecord, TouchOutcome};
pub use store::{CredentialStore, PgCredentialStore};

#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryCredentialStore;
