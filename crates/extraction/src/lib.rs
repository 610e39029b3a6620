pub mod backend;
pub mod client;
pub mod error;
pub mod prompt;
pub mod record;

pub use backend::{BackendError, GenerationConfig, HttpLlmBackend, LlmBackend};
pub use client::ExtractionClient;
pub use error::{ExtractionError, ExtractionResult};
pub use record::{Certification, Education, Experience, ExtractionRecord, PersonalInfo, Project, Skills};

#[cfg(any(test, feature = "test-util"))]
pub use backend::FixtureLlmBackend;
