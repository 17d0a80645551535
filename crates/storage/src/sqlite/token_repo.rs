use chrono::{DateTime, Utc};
use prep_core::model::UserId;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64};
use crate::repository::{AuthTokenRepository, StorageError};

#[async_trait::async_trait]
impl AuthTokenRepository for SqliteRepository {
    async fn insert_token(
        &self,
        digest: &str,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO auth_tokens (token_digest, user_id, created_at, expires_at)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(digest)
        .bind(id_i64("user_id", user_id.value())?)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_token_user(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StorageError> {
        let user: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM auth_tokens WHERE token_digest = ?1 AND expires_at > ?2",
        )
        .bind(digest)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        user.map(|raw| {
            u64::try_from(raw)
                .map(UserId::new)
                .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
        })
        .transpose()
    }

    async fn delete_token(&self, digest: &str) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM auth_tokens WHERE token_digest = ?1")
            .bind(digest)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected() > 0)
    }
}
