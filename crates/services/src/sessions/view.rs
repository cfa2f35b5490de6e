use chrono::{DateTime, Utc};
use std::sync::Arc;

use quiz_core::model::{CompletionSummary, ModuleId};
use storage::CompletionId;
use storage::repository::{CompletionRepository, CompletionRow};

use crate::error::QuizServiceError;

/// Presentation-agnostic list item for a persisted completion.
///
/// Timestamps stay as `DateTime<Utc>`; callers decide how to render them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionListItem {
    pub id: CompletionId,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: i64,

    pub correct: u32,
    pub total: u32,
    pub passed: bool,
    pub coins: u32,
    pub xp: u32,
}

impl CompletionListItem {
    #[must_use]
    pub fn from_row(row: &CompletionRow) -> Self {
        let summary = &row.summary;
        Self {
            id: row.id,
            completed_at: summary.completed_at(),
            duration_secs: (summary.completed_at() - summary.started_at()).num_seconds(),
            correct: summary.correct_count(),
            total: summary.total_stages(),
            passed: summary.passed(),
            coins: summary.coins(),
            xp: summary.xp(),
        }
    }
}

/// Read-side facade over persisted completions.
#[derive(Clone)]
pub struct CompletionHistoryService {
    completions: Arc<dyn CompletionRepository>,
}

impl CompletionHistoryService {
    #[must_use]
    pub fn new(completions: Arc<dyn CompletionRepository>) -> Self {
        Self { completions }
    }

    /// Most recent completions for a module, newest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn list_recent(
        &self,
        module_id: &ModuleId,
        limit: u32,
    ) -> Result<Vec<CompletionListItem>, QuizServiceError> {
        let rows = self.completions.list_completions(module_id, limit).await?;
        Ok(rows.iter().map(CompletionListItem::from_row).collect())
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` when the id is unknown or the read fails.
    pub async fn get(&self, id: CompletionId) -> Result<CompletionSummary, QuizServiceError> {
        Ok(self.completions.get_completion(id).await?)
    }
}
