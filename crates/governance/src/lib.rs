//! Quota, Rate, and Pressure Governance (spec components B, C, D):
//! the Quota Ledger, the Pressure Sensor, and the Admission Controller
//! that composes them with per-endpoint rolling windows.

pub mod admission;
pub mod error;
pub mod model;
pub mod pressure;
pub mod quota;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use admission::{
    AdmissionConfig, AdmissionController, AdmissionDecision, DenyCode, EndpointCategory,
    EndpointSpec,
};
pub use error::{GovernanceError, GovernanceResult};
pub use model::{ApiKind, DailyDecision, ExceededReason, QuotaCounter, WindowDecision};
pub use pressure::PressureSensor;
pub use quota::{DailyPolicy, PgQuotaLedger, QuotaLedger};

#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryQuotaLedger;
