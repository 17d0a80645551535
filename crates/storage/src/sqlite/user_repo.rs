use chrono::{DateTime, Utc};
use prep_core::model::{SubscriptionTier, User, UserId, VerifiedIdentity};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_user_row};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_identity(
        &self,
        identity: &VerifiedIdentity,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO users (email, name, google_id, subscription_tier, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                ON CONFLICT(email) DO UPDATE SET
                    name = excluded.name,
                    google_id = COALESCE(excluded.google_id, users.google_id),
                    updated_at = excluded.updated_at
                RETURNING id, email, name, google_id, subscription_tier, created_at, updated_at
            ",
        )
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(identity.google_id.as_deref())
        .bind(SubscriptionTier::Free.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        map_user_row(&row)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, email, name, google_id, subscription_tier, created_at, updated_at
                FROM users
                WHERE id = ?1
            ",
        )
        .bind(id_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_user_row).transpose()
    }
}
