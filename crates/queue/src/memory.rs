//! In-memory `JobStore` fake for unit tests and property simulations
//! (no Postgres dependency).

use std::sync::Mutex;

use async_trait::async_trait;
use resume_spine_shared::{JobId, PayloadRef, PrincipalId};
use time::OffsetDateTime;

use crate::error::QueueResult;
use crate::model::{estimate_wait_seconds, CancelOutcome, EnqueueResult, Job, JobStatus};
use crate::store::JobStore;

pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
        }
    }

    fn recompute_locked(jobs: &mut [Job]) {
        let mut queued: Vec<usize> = jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Queued)
            .map(|(i, _)| i)
            .collect();
        queued.sort_by_key(|&i| jobs[i].created_at);
        for (pos, idx) in queued.into_iter().enumerate() {
            jobs[idx].position = (pos + 1) as i32;
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(
        &self,
        principal_id: PrincipalId,
        payload_ref: PayloadRef,
    ) -> QueueResult<EnqueueResult> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        let queued_count = jobs.iter().filter(|j| j.status == JobStatus::Queued).count();
        let position = (queued_count + 1) as i32;
        let wait = estimate_wait_seconds(position);
        let job_id = JobId::new();

        jobs.push(Job {
            job_id,
            principal_id,
            payload_ref,
            status: JobStatus::Queued,
            position,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            completed_at: None,
            result: None,
            error_kind: None,
            error_message: None,
            processing_seconds: None,
            estimated_wait_seconds: wait,
        });

        Ok(EnqueueResult {
            job_id,
            position,
            estimated_wait_seconds: wait,
        })
    }

    async fn peek_next(&self) -> QueueResult<Option<Job>> {
        let jobs = self.jobs.lock().expect("lock poisoned");
        Ok(jobs
            .iter()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| j.created_at)
            .cloned())
    }

    async fn claim_next(&self) -> QueueResult<Option<Job>> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");

        if jobs.iter().any(|j| j.status == JobStatus::Processing) {
            return Ok(None);
        }

        let idx = jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Queued)
            .min_by_key(|(_, j)| j.created_at)
            .map(|(i, _)| i);

        let Some(idx) = idx else {
            return Ok(None);
        };

        jobs[idx].status = JobStatus::Processing;
        jobs[idx].position = 0;
        jobs[idx].started_at = Some(OffsetDateTime::now_utc());

        Ok(Some(jobs[idx].clone()))
    }

    async fn complete_success(
        &self,
        job_id: JobId,
        result: serde_json::Value,
        processing_seconds: f64,
    ) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        if let Some(job) = jobs
            .iter_mut()
            .find(|j| j.job_id == job_id && j.status == JobStatus::Processing)
        {
            job.status = JobStatus::Completed;
            job.result = Some(result);
            job.completed_at = Some(OffsetDateTime::now_utc());
            job.processing_seconds = Some(processing_seconds);
        }
        Ok(())
    }

    async fn complete_failure(
        &self,
        job_id: JobId,
        error_kind: &str,
        user_facing_message: &str,
        processing_seconds: f64,
    ) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        if let Some(job) = jobs
            .iter_mut()
            .find(|j| j.job_id == job_id && j.status == JobStatus::Processing)
        {
            job.status = JobStatus::Failed;
            job.error_kind = Some(error_kind.to_string());
            job.error_message = Some(user_facing_message.to_string());
            job.completed_at = Some(OffsetDateTime::now_utc());
            job.processing_seconds = Some(processing_seconds);
        }
        Ok(())
    }

    async fn cancel(&self, job_id: JobId, principal_id: PrincipalId) -> QueueResult<CancelOutcome> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        let Some(job) = jobs.iter_mut().find(|j| j.job_id == job_id) else {
            return Ok(CancelOutcome::NotFound);
        };
        if job.principal_id != principal_id || job.status != JobStatus::Queued {
            return Ok(CancelOutcome::NoLongerCancellable);
        }
        job.status = JobStatus::Cancelled;
        Ok(CancelOutcome::Ok)
    }

    async fn recompute_positions(&self) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        Self::recompute_locked(&mut jobs);
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> QueueResult<Option<Job>> {
        let jobs = self.jobs.lock().expect("lock poisoned");
        let Some(job) = jobs.iter().find(|j| j.job_id == job_id) else {
            return Ok(None);
        };
        let mut job = job.clone();
        if job.status == JobStatus::Queued {
            let earlier = jobs
                .iter()
                .filter(|j| j.status == JobStatus::Queued && j.created_at < job.created_at)
                .count();
            job.position = (earlier + 1) as i32;
        }
        Ok(Some(job))
    }

    async fn sweep_terminal(&self, age: std::time::Duration) -> QueueResult<u64> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        let cutoff = OffsetDateTime::now_utc() - age;
        let before = jobs.len();
        jobs.retain(|j| {
            let terminal = matches!(
                j.status,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
            );
            !(terminal && j.completed_at.unwrap_or(j.created_at) < cutoff)
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn recover_interrupted(&self, error_kind: &str, message: &str) -> QueueResult<Vec<JobId>> {
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        let mut recovered = Vec::new();
        for job in jobs.iter_mut().filter(|j| j.status == JobStatus::Processing) {
            job.status = JobStatus::Failed;
            job.error_kind = Some(error_kind.to_string());
            job.error_message = Some(message.to_string());
            job.completed_at = Some(OffsetDateTime::now_utc());
            recovered.push(job.job_id);
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_flight_refuses_second_claim_while_processing() {
        let store = InMemoryJobStore::new();
        let p = PrincipalId::new();
        store.enqueue(p, PayloadRef("a".to_string())).await.unwrap();
        store.enqueue(p, PayloadRef("b".to_string())).await.unwrap();

        let first = store.claim_next().await.unwrap();
        assert!(first.is_some());
        let second = store.claim_next().await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn fifo_claims_in_created_order() {
        let store = InMemoryJobStore::new();
        let p = PrincipalId::new();
        let first = store.enqueue(p, PayloadRef("a".to_string())).await.unwrap();
        store.enqueue(p, PayloadRef("b".to_string())).await.unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.job_id, first.job_id);
    }

    #[tokio::test]
    async fn positions_are_contiguous_after_recompute() {
        let store = InMemoryJobStore::new();
        let p = PrincipalId::new();
        for i in 0..3 {
            store.enqueue(p, PayloadRef(format!("p{i}"))).await.unwrap();
        }
        store.recompute_positions().await.unwrap();

        let mut jobs = Vec::new();
        for _ in 0..3 {
            if let Some(job) = store.claim_next().await.unwrap() {
                jobs.push(job);
                store
                    .complete_success(jobs.last().unwrap().job_id, serde_json::json!({}), 1.0)
                    .await
                    .unwrap();
                store.recompute_positions().await.unwrap();
            }
        }
        assert_eq!(jobs.len(), 3);
    }

    #[tokio::test]
    async fn cancel_only_succeeds_while_queued() {
        let store = InMemoryJobStore::new();
        let p = PrincipalId::new();
        let enqueued = store.enqueue(p, PayloadRef("a".to_string())).await.unwrap();

        store.claim_next().await.unwrap();
        let outcome = store.cancel(enqueued.job_id, p).await.unwrap();
        assert_eq!(outcome, CancelOutcome::NoLongerCancellable);
    }

    #[tokio::test]
    async fn get_recomputes_position_for_queued_jobs() {
        let store = InMemoryJobStore::new();
        let p = PrincipalId::new();
        store.enqueue(p, PayloadRef("a".to_string())).await.unwrap();
        let second = store.enqueue(p, PayloadRef("b".to_string())).await.unwrap();

        store.claim_next().await.unwrap();
        let job = store.get(second.job_id).await.unwrap().unwrap();
        assert_eq!(job.position, 1);
    }
}
