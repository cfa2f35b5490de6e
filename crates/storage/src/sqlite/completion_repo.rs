use quiz_core::model::{CompletionSummary, ModuleId};

use super::SqliteRepository;
use super::mapping::{conn, map_completion_row};
use crate::repository::{CompletionId, CompletionRepository, CompletionRow, StorageError};

#[async_trait::async_trait]
impl CompletionRepository for SqliteRepository {
    async fn append_completion(
        &self,
        summary: &CompletionSummary,
    ) -> Result<CompletionId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO completions (
                    module_id, started_at, completed_at, total_stages,
                    correct_count, passed, coins, xp
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(summary.module_id().as_str())
        .bind(summary.started_at())
        .bind(summary.completed_at())
        .bind(i64::from(summary.total_stages()))
        .bind(i64::from(summary.correct_count()))
        .bind(i64::from(summary.passed()))
        .bind(i64::from(summary.coins()))
        .bind(i64::from(summary.xp()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_completion(&self, id: CompletionId) -> Result<CompletionSummary, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, module_id, started_at, completed_at, total_stages,
                    correct_count, passed, coins, xp
                FROM completions
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        Ok(map_completion_row(&row)?.summary)
    }

    async fn list_completions(
        &self,
        module_id: &ModuleId,
        limit: u32,
    ) -> Result<Vec<CompletionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, module_id, started_at, completed_at, total_stages,
                    correct_count, passed, coins, xp
                FROM completions
                WHERE module_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(module_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_completion_row(&row)?);
        }
        Ok(out)
    }
}
