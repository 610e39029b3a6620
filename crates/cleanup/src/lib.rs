pub mod artifacts;
pub mod error;
pub mod orchestrator;

pub use error::{CleanupError, CleanupResult};
pub use orchestrator::CleanupOrchestrator;
