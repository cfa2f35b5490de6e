use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ModuleId, StageId};
use crate::model::reward::Reward;

/// One answered stage, in answer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub stage_id: StageId,
    pub is_correct: bool,
}

/// Result computed when a run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub total_stages: u32,
    pub correct_count: u32,
    pub passed: bool,
    pub reward: Reward,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("correct count ({correct}) exceeds total stages ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("passed flag does not match counts")]
    PassedMismatch,

    #[error("a completion needs at least one stage")]
    NoStages,
}

/// Aggregate record for a finished run, as handed to the hosting shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSummary {
    module_id: ModuleId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_stages: u32,
    correct_count: u32,
    passed: bool,
    coins: u32,
    xp: u32,
}

impl CompletionSummary {
    /// Rehydrate a completion from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError` if timestamps or counts are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        module_id: ModuleId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        total_stages: u32,
        correct_count: u32,
        passed: bool,
        coins: u32,
        xp: u32,
    ) -> Result<Self, CompletionError> {
        if completed_at < started_at {
            return Err(CompletionError::InvalidTimeRange);
        }
        if total_stages == 0 {
            return Err(CompletionError::NoStages);
        }
        if correct_count > total_stages {
            return Err(CompletionError::CountMismatch {
                correct: correct_count,
                total: total_stages,
            });
        }
        if passed != (correct_count == total_stages) {
            return Err(CompletionError::PassedMismatch);
        }

        Ok(Self {
            module_id,
            started_at,
            completed_at,
            total_stages,
            correct_count,
            passed,
            coins,
            xp,
        })
    }

    /// Build a summary from a finished run's outcome.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::InvalidTimeRange` if `completed_at` is before `started_at`.
    pub fn from_outcome(
        module_id: ModuleId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        outcome: &QuizOutcome,
    ) -> Result<Self, CompletionError> {
        Self::from_persisted(
            module_id,
            started_at,
            completed_at,
            outcome.total_stages,
            outcome.correct_count,
            outcome.passed,
            outcome.reward.coins,
            outcome.reward.xp,
        )
    }

    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_stages(&self) -> u32 {
        self.total_stages
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn coins(&self) -> u32 {
        self.coins
    }

    #[must_use]
    pub fn xp(&self) -> u32 {
        self.xp
    }
}
