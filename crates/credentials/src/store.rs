//! Credential Store: issue, validate, and revoke opaque session
//! handles. A single `SessionRecord` plus a standalone `RevocationEntry`
//! list, keyed by an opaque credential-id rather than a JWT pair.

use std::time::Duration;

use async_trait::async_trait;
use resume_spine_shared::{CredentialId, PrincipalId, SessionId};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;

use crate::error::CredentialResult;
use crate::model::{SessionRecord, TouchOutcome};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Atomically counts existing non-expired sessions for the
    /// principal; if at cap, evicts the oldest and revokes its
    /// credential, then inserts the new record.
    async fn create_session(
        &self,
        principal_id: PrincipalId,
        credential_id: CredentialId,
        ttl: Duration,
        max_sessions: i64,
        revocation_ttl: Duration,
    ) -> CredentialResult<SessionId>;

    async fn touch_session(&self, session_id: SessionId) -> CredentialResult<TouchOutcome>;

    async fn is_revoked(&self, credential_id: &CredentialId) -> CredentialResult<bool>;

    async fn revoke(
        &self,
        session_id: SessionId,
        credential_id: CredentialId,
        revocation_ttl: Duration,
    ) -> CredentialResult<()>;

    async fn revoke_all_for(
        &self,
        principal_id: PrincipalId,
        revocation_ttl: Duration,
    ) -> CredentialResult<u64>;

    /// Returns (sessions_removed, revocations_removed). Idempotent.
    async fn sweep_expired(&self) -> CredentialResult<(u64, u64)>;

    /// Non-expired sessions for a principal, oldest first. Exposed for
    /// tests and admin introspection; not part of the narrow spec
    /// surface but required to assert the session-cap invariant.
    async fn list_active(&self, principal_id: PrincipalId) -> CredentialResult<Vec<SessionRecord>>;

    /// Looks up the session a credential was issued for, expired or not.
    /// Required to resolve a credential back to its principal-id before
    /// checking revocation and expiry.
    async fn find_by_credential(
        &self,
        credential_id: &CredentialId,
    ) -> CredentialResult<Option<SessionRecord>>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_session(
        &self,
        principal_id: PrincipalId,
        credential_id: CredentialId,
        ttl: Duration,
        max_sessions: i64,
        revocation_ttl: Duration,
    ) -> CredentialResult<SessionId> {
        let mut tx = self.pool.begin().await?;

        // Transactional count + evict + insert keeps the session cap
        // serializable per-principal.
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM sessions
            WHERE principal_id = $1 AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(principal_id)
        .fetch_one(&mut *tx)
        .await?;

        if count.0 >= max_sessions {
            let now = OffsetDateTime::now_utc();
            let revoked: Option<(uuid::Uuid, String)> = sqlx::query_as(
                r#"
                DELETE FROM sessions
                WHERE session_id = (
                    SELECT session_id FROM sessions
                    WHERE principal_id = $1 AND expires_at > NOW()
                    ORDER BY created_at ASC
                    LIMIT 1
                )
                RETURNING session_id, credential_id
                "#,
            )
            .bind(principal_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((evicted_session_id, evicted_credential_id)) = revoked {
                let expires_at = now + revocation_ttl;
                sqlx::query(
                    r#"
                    INSERT INTO revocations (credential_id, revoked_at, expires_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (credential_id)
                    DO UPDATE SET revoked_at = EXCLUDED.revoked_at, expires_at = EXCLUDED.expires_at
                    "#,
                )
                .bind(&evicted_credential_id)
                .bind(now)
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;

                info!(
                    principal_id = %principal_id,
                    evicted_session_id = %evicted_session_id,
                    "Evicted oldest session for cap"
                );
            }
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = now + ttl;
        let session_id: (uuid::Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO sessions (principal_id, credential_id, created_at, last_active_at, expires_at)
            VALUES ($1, $2, $3, $3, $4)
            RETURNING session_id
            "#,
        )
        .bind(principal_id)
        .bind(&credential_id.0)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SessionId(session_id.0))
    }

    async fn touch_session(&self, session_id: SessionId) -> CredentialResult<TouchOutcome> {
        let rows = sqlx::query(
            r#"
            UPDATE sessions SET last_active_at = NOW()
            WHERE session_id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(if rows > 0 {
            TouchOutcome::Ok
        } else {
            TouchOutcome::Gone
        })
    }

    async fn is_revoked(&self, credential_id: &CredentialId) -> CredentialResult<bool> {
        let row: Option<(bool,)> = sqlx::query_as(
            r#"SELECT TRUE FROM revocations WHERE credential_id = $1 AND expires_at > NOW()"#,
        )
        .bind(&credential_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn revoke(
        &self,
        session_id: SessionId,
        credential_id: CredentialId,
        revocation_ttl: Duration,
    ) -> CredentialResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = OffsetDateTime::now_utc();
        let expires_at = now + revocation_ttl;

        sqlx::query(
            r#"
            INSERT INTO revocations (credential_id, revoked_at, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (credential_id)
            DO UPDATE SET revoked_at = EXCLUDED.revoked_at, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&credential_id.0)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn revoke_all_for(
        &self,
        principal_id: PrincipalId,
        revocation_ttl: Duration,
    ) -> CredentialResult<u64> {
        let mut tx = self.pool.begin().await?;
        let now = OffsetDateTime::now_utc();
        let expires_at = now + revocation_ttl;

        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT credential_id FROM sessions WHERE principal_id = $1",
        )
        .bind(principal_id)
        .fetch_all(&mut *tx)
        .await?;

        for (credential_id,) in &rows {
            sqlx::query(
                r#"
                INSERT INTO revocations (credential_id, revoked_at, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (credential_id)
                DO UPDATE SET revoked_at = EXCLUDED.revoked_at, expires_at = EXCLUDED.expires_at
                "#,
            )
            .bind(credential_id)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        }

        let deleted = sqlx::query("DELETE FROM sessions WHERE principal_id = $1")
            .bind(principal_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    async fn sweep_expired(&self) -> CredentialResult<(u64, u64)> {
        let sessions_removed = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();

        let revocations_removed =
            sqlx::query("DELETE FROM revocations WHERE expires_at <= NOW()")
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok((sessions_removed, revocations_removed))
    }

    async fn list_active(&self, principal_id: PrincipalId) -> CredentialResult<Vec<SessionRecord>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            session_id: uuid::Uuid,
            principal_id: uuid::Uuid,
            credential_id: String,
            created_at: OffsetDateTime,
            last_active_at: OffsetDateTime,
            expires_at: OffsetDateTime,
        }

        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT session_id, principal_id, credential_id, created_at, last_active_at, expires_at
            FROM sessions
            WHERE principal_id = $1 AND expires_at > NOW()
            ORDER BY created_at ASC
            "#,
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SessionRecord {
                session_id: SessionId(r.session_id),
                principal_id: PrincipalId(r.principal_id),
                credential_id: CredentialId(r.credential_id),
                created_at: r.created_at,
                last_active_at: r.last_active_at,
                expires_at: r.expires_at,
            })
            .collect())
    }

    async fn find_by_credential(
        &self,
        credential_id: &CredentialId,
    ) -> CredentialResult<Option<SessionRecord>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            session_id: uuid::Uuid,
            principal_id: uuid::Uuid,
            credential_id: String,
            created_at: OffsetDateTime,
            last_active_at: OffsetDateTime,
            expires_at: OffsetDateTime,
        }

        let row: Option<Row> = sqlx::query_as(
            r#"
            SELECT session_id, principal_id, credential_id, created_at, last_active_at, expires_at
            FROM sessions
            WHERE credential_id = $1
            "#,
        )
        .bind(&credential_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SessionRecord {
            session_id: SessionId(r.session_id),
            principal_id: PrincipalId(r.principal_id),
            credential_id: CredentialId(r.credential_id),
            created_at: r.created_at,
            last_active_at: r.last_active_at,
            expires_at: r.expires_at,
        }))
    }
}
