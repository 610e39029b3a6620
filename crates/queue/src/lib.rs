pub mod cache;
pub mod document_store;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use cache::{DocumentStore, PayloadCache};
pub use document_store::PgDocumentStore;
pub use engine::QueueEngine;
pub use error::{QueueError, QueueResult};
pub use model::{CancelOutcome, EnqueueResult, Job, JobStatus};
pub use store::{JobStore, PgJobStore};

#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryJobStore;
