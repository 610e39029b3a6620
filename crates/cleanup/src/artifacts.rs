//! Orphan artifact directory purge: directories in the output root
//! whose corresponding Job row is absent or older than `max_age`.

use std::path::Path;
use std::time::Duration;

use resume_spine_queue::JobStore;
use resume_spine_shared::JobId;
use time::OffsetDateTime;
use tracing::warn;

use crate::error::CleanupResult;

pub async fn purge_orphan_artifacts(
    store: &dyn JobStore,
    output_root: &Path,
    max_age: Duration,
) -> CleanupResult<u64> {
    let mut entries = match tokio::fs::read_dir(output_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let max_age_secs = max_age.as_secs() as i64;
    let mut removed = 0u64;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Ok(uuid) = uuid::Uuid::parse_str(&name) else {
            continue;
        };

        let should_remove = match store.get(JobId(uuid)).await {
            Ok(Some(job)) => {
                let anchor = job.completed_at.unwrap_or(job.created_at);
                (OffsetDateTime::now_utc() - anchor).whole_seconds() > max_age_secs
            }
            Ok(None) => true,
            Err(e) => {
                warn!(job_id = %uuid, error = %e, "Skipping artifact purge check after store error");
                false
            }
        };

        if should_remove {
            if let Err(e) = tokio::fs::remove_dir_all(entry.path()).await {
                warn!(path = ?entry.path(), error = %e, "Failed to remove orphan artifact directory");
            } else {
                removed += 1;
            }
        }
    }

    Ok(removed)
}
