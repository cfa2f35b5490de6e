use chrono::Utc;
use quiz_core::model::RewardOverride;

use super::SqliteRepository;
use super::mapping::{conn, map_override_row};
use crate::repository::{RewardOverrideRepository, StorageError};

#[async_trait::async_trait]
impl RewardOverrideRepository for SqliteRepository {
    async fn get_override(&self, key: &str) -> Result<Option<RewardOverride>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT coins, xp
                FROM reward_overrides
                WHERE game_data_key = ?1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_override_row).transpose()
    }

    async fn set_override(&self, key: &str, value: RewardOverride) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO reward_overrides (game_data_key, coins, xp, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(game_data_key) DO UPDATE SET
                    coins = excluded.coins,
                    xp = excluded.xp,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(i64::from(value.coins))
        .bind(i64::from(value.xp))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
