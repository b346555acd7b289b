//! Postgres-backed principal store.
//!
//! Lock updates run in a transaction that holds a row lock
//! (`SELECT ... FOR UPDATE`) between reading and writing the counters.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument, Span};

use super::{
    error::StoreError,
    lockout::LockState,
    principal::{Principal, PrincipalStore},
};

const SELECT_PRINCIPAL: &str = r"
    SELECT subject, credential_hash, roles, enabled, account_non_locked,
           failed_attempts, lock_time, credentials_non_expired, credentials_changed_at
    FROM principals
    WHERE subject = $1";

const UPSERT_PRINCIPAL: &str = r"
    INSERT INTO principals
        (subject, credential_hash, roles, enabled, account_non_locked,
         failed_attempts, lock_time, credentials_non_expired, credentials_changed_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (subject) DO UPDATE SET
        credential_hash = EXCLUDED.credential_hash,
        roles = EXCLUDED.roles,
        enabled = EXCLUDED.enabled,
        account_non_locked = EXCLUDED.account_non_locked,
        failed_attempts = EXCLUDED.failed_attempts,
        lock_time = EXCLUDED.lock_time,
        credentials_non_expired = EXCLUDED.credentials_non_expired,
        credentials_changed_at = EXCLUDED.credentials_changed_at";

const SELECT_LOCK_FOR_UPDATE: &str = r"
    SELECT account_non_locked, failed_attempts, lock_time
    FROM principals
    WHERE subject = $1
    FOR UPDATE";

const UPDATE_LOCK: &str = r"
    UPDATE principals
    SET account_non_locked = $2, failed_attempts = $3, lock_time = $4
    WHERE subject = $1";

#[derive(Clone, Debug)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn lock_state_from_row(row: &PgRow) -> Result<LockState, sqlx::Error> {
    let failed_attempts: i32 = row.try_get("failed_attempts")?;
    Ok(LockState {
        account_non_locked: row.try_get("account_non_locked")?,
        failed_attempts: u32::try_from(failed_attempts).unwrap_or(0),
        lock_time: row.try_get("lock_time")?,
    })
}

fn principal_from_row(row: &PgRow) -> Result<Principal, sqlx::Error> {
    Ok(Principal {
        subject: row.try_get("subject")?,
        credential_hash: row.try_get("credential_hash")?,
        roles: row.try_get("roles")?,
        enabled: row.try_get("enabled")?,
        lock: lock_state_from_row(row)?,
        credentials_non_expired: row.try_get("credentials_non_expired")?,
        credentials_changed_at: row.try_get("credentials_changed_at")?,
    })
}

fn attempts_column(failed_attempts: u32) -> i32 {
    i32::try_from(failed_attempts).unwrap_or(i32::MAX)
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn load_by_subject(&self, subject: &str) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query(SELECT_PRINCIPAL)
            .bind(subject)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", SELECT_PRINCIPAL))
            .await?;
        Ok(row.as_ref().map(principal_from_row).transpose()?)
    }

    async fn save(&self, principal: &Principal) -> Result<(), StoreError> {
        sqlx::query(UPSERT_PRINCIPAL)
            .bind(&principal.subject)
            .bind(&principal.credential_hash)
            .bind(&principal.roles)
            .bind(principal.enabled)
            .bind(principal.lock.account_non_locked)
            .bind(attempts_column(principal.lock.failed_attempts))
            .bind(principal.lock.lock_time)
            .bind(principal.credentials_non_expired)
            .bind(principal.credentials_changed_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", UPSERT_PRINCIPAL))
            .await?;
        Ok(())
    }

    async fn update_lock_state(
        &self,
        subject: &str,
        update: &mut (dyn for<'s> FnMut(&'s mut LockState) + Send),
    ) -> Result<Option<LockState>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(SELECT_LOCK_FOR_UPDATE)
            .bind(subject)
            .fetch_optional(&mut *tx)
            .instrument(db_span("SELECT", SELECT_LOCK_FOR_UPDATE))
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut state = lock_state_from_row(&row)?;
        update(&mut state);

        sqlx::query(UPDATE_LOCK)
            .bind(subject)
            .bind(state.account_non_locked)
            .bind(attempts_column(state.failed_attempts))
            .bind(state.lock_time)
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", UPDATE_LOCK))
            .await?;

        tx.commit().await?;
        Ok(Some(state))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(db_span("SELECT", "SELECT 1"))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_column_saturates() {
        assert_eq!(attempts_column(3), 3);
        assert_eq!(attempts_column(u32::MAX), i32::MAX);
    }

    #[test]
    fn statements_target_principals_table() {
        for statement in [
            SELECT_PRINCIPAL,
            UPSERT_PRINCIPAL,
            SELECT_LOCK_FOR_UPDATE,
            UPDATE_LOCK,
        ] {
            assert!(statement.contains("principals"));
        }
        assert!(SELECT_LOCK_FOR_UPDATE.trim_end().ends_with("FOR UPDATE"));
    }
}
