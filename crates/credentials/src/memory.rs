//! In-memory `CredentialStore` fake for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use resume_spine_shared::{CredentialId, PrincipalId, SessionId};
use time::OffsetDateTime;

use crate::error::CredentialResult;
use crate::model::{RevocationEntry, SessionRecord, TouchOutcome};
use crate::store::CredentialStore;

#[derive(Default)]
pub struct InMemoryCredentialStore {
    sessions: Mutex<Vec<SessionRecord>>,
    revocations: Mutex<HashMap<String, RevocationEntry>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_session(
        &self,
        principal_id: PrincipalId,
        credential_id: CredentialId,
        ttl: Duration,
        max_sessions: i64,
        revocation_ttl: Duration,
    ) -> CredentialResult<SessionId> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().expect("lock poisoned");

        sessions.retain(|s| !s.is_expired(now) || s.principal_id != principal_id);
        let mut active: Vec<usize> = sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.principal_id == principal_id && !s.is_expired(now))
            .map(|(i, _)| i)
            .collect();
        active.sort_by_key(|&i| sessions[i].created_at);

        if active.len() as i64 >= max_sessions {
            let oldest_idx = active[0];
            let evicted = sessions.remove(oldest_idx);
            let mut revocations = self.revocations.lock().expect("lock poisoned");
            revocations.insert(
                evicted.credential_id.0.clone(),
                RevocationEntry {
                    credential_id: evicted.credential_id,
                    revoked_at: now,
                    expires_at: now + revocation_ttl,
                },
            );
        }

        let session_id = SessionId::new();
        sessions.push(SessionRecord {
            session_id,
            principal_id,
            credential_id,
            created_at: now,
            last_active_at: now,
            expires_at: now + ttl,
        });

        Ok(session_id)
    }

    async fn touch_session(&self, session_id: SessionId) -> CredentialResult<TouchOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().expect("lock poisoned");
        if let Some(s) = sessions
            .iter_mut()
            .find(|s| s.session_id == session_id && !s.is_expired(now))
        {
            s.last_active_at = now;
            Ok(TouchOutcome::Ok)
        } else {
            Ok(TouchOutcome::Gone)
        }
    }

    async fn is_revoked(&self, credential_id: &CredentialId) -> CredentialResult<bool> {
        let now = OffsetDateTime::now_utc();
        let revocations = self.revocations.lock().expect("lock poisoned");
        Ok(revocations
            .get(&credential_id.0)
            .is_some_and(|r| r.is_active(now)))
    }

    async fn revoke(
        &self,
        session_id: SessionId,
        credential_id: CredentialId,
        revocation_ttl: Duration,
    ) -> CredentialResult<()> {
        let now = OffsetDateTime::now_utc();
        self.sessions
            .lock()
            .expect("lock poisoned")
            .retain(|s| s.session_id != session_id);
        self.revocations.lock().expect("lock poisoned").insert(
            credential_id.0.clone(),
            RevocationEntry {
                credential_id,
                revoked_at: now,
                expires_at: now + revocation_ttl,
            },
        );
        Ok(())
    }

    async fn revoke_all_for(
        &self,
        principal_id: PrincipalId,
        revocation_ttl: Duration,
    ) -> CredentialResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().expect("lock poisoned");
        let mut revocations = self.revocations.lock().expect("lock poisoned");

        let (to_revoke, rest): (Vec<_>, Vec<_>) = sessions
            .drain(..)
            .partition(|s| s.principal_id == principal_id);

        let count = to_revoke.len() as u64;
        for s in to_revoke {
            revocations.insert(
                s.credential_id.0.clone(),
                RevocationEntry {
                    credential_id: s.credential_id,
                    revoked_at: now,
                    expires_at: now + revocation_ttl,
                },
            );
        }
        *sessions = rest;
        Ok(count)
    }

    async fn sweep_expired(&self) -> CredentialResult<(u64, u64)> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().expect("lock poisoned");
        let before = sessions.len();
        sessions.retain(|s| !s.is_expired(now));
        let sessions_removed = (before - sessions.len()) as u64;

        let mut revocations = self.revocations.lock().expect("lock poisoned");
        let before = revocations.len();
        revocations.retain(|_, r| r.is_active(now));
        let revocations_removed = (before - revocations.len()) as u64;

        Ok((sessions_removed, revocations_removed))
    }

    async fn list_active(&self, principal_id: PrincipalId) -> CredentialResult<Vec<SessionRecord>> {
        let now = OffsetDateTime::now_utc();
        let mut out: Vec<SessionRecord> = self
            .sessions
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|s| s.principal_id == principal_id && !s.is_expired(now))
            .cloned()
            .collect();
        out.sort_by_key(|s| s.created_at);
        Ok(out)
    }

    async fn find_by_credential(
        &self,
        credential_id: &CredentialId,
    ) -> CredentialResult<Option<SessionRecord>> {
        Ok(self
            .sessions
            .lock()
            .expect("lock poisoned")
            .iter()
            .find(|s| &s.credential_id == credential_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(n: usize) -> CredentialId {
        CredentialId(format!("cred-{n}"))
    }

    #[tokio::test]
    async fn session_cap_evicts_oldest_and_revokes_it() {
        let store = InMemoryCredentialStore::new();
        let principal = PrincipalId::new();
        let ttl = Duration::from_secs(3600);
        let revocation_ttl = Duration::from_secs(7 * 24 * 3600);

        for i in 0..5 {
            store
                .create_session(principal, cred(i), ttl, 5, revocation_ttl)
                .await
                .unwrap();
        }
        assert_eq!(store.list_active(principal).await.unwrap().len(), 5);

        // 6th creation evicts session 0.
        store
            .create_session(principal, cred(5), ttl, 5, revocation_ttl)
            .await
            .unwrap();
        assert_eq!(store.list_active(principal).await.unwrap().len(), 5);
        assert!(store.is_revoked(&cred(0)).await.unwrap());

        // 7th creation evicts session 1, not session 0 again.
        store
            .create_session(principal, cred(6), ttl, 5, revocation_ttl)
            .await
            .unwrap();
        assert!(store.is_revoked(&cred(1)).await.unwrap());
        assert!(!store.is_revoked(&cred(2)).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_is_effective_until_ttl() {
        let store = InMemoryCredentialStore::new();
        let principal = PrincipalId::new();
        let session_id = store
            .create_session(
                principal,
                cred(0),
                Duration::from_secs(3600),
                5,
                Duration::from_secs(7 * 24 * 3600),
            )
            .await
            .unwrap();

        assert!(!store.is_revoked(&cred(0)).await.unwrap());
        store
            .revoke(session_id, cred(0), Duration::from_secs(7 * 24 * 3600))
            .await
            .unwrap();
        assert!(store.is_revoked(&cred(0)).await.unwrap());
        assert_eq!(store.list_active(principal).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn revoke_all_for_revokes_every_session() {
        let store = InMemoryCredentialStore::new();
        let principal = PrincipalId::new();
        for i in 0..3 {
            store
                .create_session(
                    principal,
                    cred(i),
                    Duration::from_secs(3600),
                    5,
                    Duration::from_secs(3600),
                )
                .await
                .unwrap();
        }

        let revoked = store
            .revoke_all_for(principal, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(revoked, 3);
        assert_eq!(store.list_active(principal).await.unwrap().len(), 0);
        for i in 0..3 {
            assert!(store.is_revoked(&cred(i)).await.unwrap());
        }
    }
}
