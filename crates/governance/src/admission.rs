//! Admission Controller: composes the Pressure Sensor, the rolling
//! window, and the daily quota into a single accept/deny decision.
//! First denial wins.

use std::sync::Arc;
use std::time::Duration;

use resume_spine_shared::PrincipalId;

use crate::error::GovernanceResult;
use crate::model::{ApiKind, DailyDecision, WindowDecision};
use crate::pressure::PressureSensor;
use crate::quota::{DailyPolicy, QuotaLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointCategory {
    Default,
    Llm,
    Identity,
}

#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub name: String,
    pub category: EndpointCategory,
    /// Whether this endpoint should be denied while under memory
    /// pressure.
    pub pressure_sensitive: bool,
}

impl EndpointSpec {
    pub fn new(name: impl Into<String>, category: EndpointCategory, pressure_sensitive: bool) -> Self {
        Self {
            name: name.into(),
            category,
            pressure_sensitive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyCode {
    MemoryPressure,
    RateLimited,
    QuotaExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accept,
    Deny {
        code: DenyCode,
        reason: String,
        retry_after_secs: Option<u64>,
    },
}

pub struct AdmissionConfig {
    pub window_size: Duration,
    pub window_max_default: i64,
    pub window_max_llm: i64,
    pub window_max_identity: i64,
    pub daily_policy: DailyPolicy,
}

pub struct AdmissionController {
    quota: Arc<dyn QuotaLedger>,
    pressure: Arc<PressureSensor>,
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(
        quota: Arc<dyn QuotaLedger>,
        pressure: Arc<PressureSensor>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            quota,
            pressure,
            config,
        }
    }

    fn window_max(&self, category: EndpointCategory) -> i64 {
        match category {
            EndpointCategory::Default => self.config.window_max_default,
            EndpointCategory::Llm => self.config.window_max_llm,
            EndpointCategory::Identity => self.config.window_max_identity,
        }
    }

    pub async fn admit(
        &self,
        principal_id: PrincipalId,
        endpoint: &EndpointSpec,
        api_kind: Option<&ApiKind>,
    ) -> GovernanceResult<AdmissionDecision> {
        if endpoint.pressure_sensitive && self.pressure.is_under_pressure() {
            return Ok(AdmissionDecision::Deny {
                code: DenyCode::MemoryPressure,
                reason: "The service is under memory pressure; please retry shortly.".to_string(),
                retry_after_secs: Some(120),
            });
        }

        let window_decision = self
            .quota
            .check_window(
                principal_id,
                &endpoint.name,
                self.config.window_size,
                self.window_max(endpoint.category),
            )
            .await?;
        if let WindowDecision::Deny { retry_after_secs } = window_decision {
            return Ok(AdmissionDecision::Deny {
                code: DenyCode::RateLimited,
                reason: "Rate limit exceeded for this endpoint.".to_string(),
                retry_after_secs: Some(retry_after_secs),
            });
        }

        if let Some(api_kind) = api_kind {
            let daily_decision = self
                .quota
                .check_daily(principal_id, api_kind, self.config.daily_policy)
                .await?;
            if let DailyDecision::Exceeded { .. } = daily_decision {
                return Ok(AdmissionDecision::Deny {
                    code: DenyCode::QuotaExhausted,
                    reason: "Daily usage limit reached. Please try again tomorrow.".to_string(),
                    retry_after_secs: None,
                });
            }
        }

        Ok(AdmissionDecision::Accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryQuotaLedger;

    fn controller(quota: Arc<InMemoryQuotaLedger>, pressure: Arc<PressureSensor>) -> AdmissionController {
        AdmissionController::new(
            quota,
            pressure,
            AdmissionConfig {
                window_size: Duration::from_secs(900),
                window_max_default: 100,
                window_max_llm: 2,
                window_max_identity: 20,
                daily_policy: DailyPolicy {
                    daily_requests: 2,
                    monthly_tokens: 1_000_000,
                },
            },
        )
    }

    #[tokio::test]
    async fn pressure_denial_wins_first() {
        let quota = Arc::new(InMemoryQuotaLedger::new());
        let pressure = Arc::new(PressureSensor::new(1.0, 0.8));
        pressure.pressure.store(true, std::sync::atomic::Ordering::SeqCst);
        let controller = controller(quota, pressure);

        let endpoint = EndpointSpec::new("submit", EndpointCategory::Llm, true);
        let decision = controller
            .admit(PrincipalId::new(), &endpoint, Some(&ApiKind::llm()))
            .await
            .unwrap();

        assert_eq!(
            decision,
            AdmissionDecision::Deny {
                code: DenyCode::MemoryPressure,
                reason: "The service is under memory pressure; please retry shortly.".to_string(),
                retry_after_secs: Some(120),
            }
        );
    }

    #[tokio::test]
    async fn daily_quota_denies_after_limit() {
        let quota = Arc::new(InMemoryQuotaLedger::new());
        let pressure = Arc::new(PressureSensor::new(100_000.0, 0.8));
        let controller = controller(quota.clone(), pressure);
        let principal = PrincipalId::new();
        let endpoint = EndpointSpec::new("submit", EndpointCategory::Llm, true);
        let kind = ApiKind::llm();

        for _ in 0..2 {
            let decision = controller.admit(principal, &endpoint, Some(&kind)).await.unwrap();
            assert_eq!(decision, AdmissionDecision::Accept);
            quota.record(principal, &kind, 1, 10).await.unwrap();
        }

        let decision = controller.admit(principal, &endpoint, Some(&kind)).await.unwrap();
        assert!(matches!(
            decision,
            AdmissionDecision::Deny {
                code: DenyCode::QuotaExhausted,
                ..
            }
        ));
    }
}
