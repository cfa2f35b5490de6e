use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::engine::{QuizSession, QuizTimings};
use quiz_core::model::{CompletionSummary, ModuleId, QuizModule};
use storage::repository::{
    CompletionRepository, ModuleRepository, RewardOverrideRepository, Storage,
};
use storage::{CompletionId, StorageError};
use tracing::{info, instrument};

use super::runner::QuizRunner;
use crate::error::QuizServiceError;

/// Orchestrates session start (with reward overrides) and completion hand-off.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    timings: QuizTimings,
    modules: Arc<dyn ModuleRepository>,
    overrides: Arc<dyn RewardOverrideRepository>,
    completions: Arc<dyn CompletionRepository>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        modules: Arc<dyn ModuleRepository>,
        overrides: Arc<dyn RewardOverrideRepository>,
        completions: Arc<dyn CompletionRepository>,
    ) -> Self {
        Self {
            clock,
            timings: QuizTimings::default(),
            modules,
            overrides,
            completions,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.modules),
            Arc::clone(&storage.overrides),
            Arc::clone(&storage.completions),
        )
    }

    #[must_use]
    pub fn with_timings(mut self, timings: QuizTimings) -> Self {
        self.timings = timings;
        self
    }

    /// All playable modules in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if the module store fails.
    pub async fn list_modules(&self) -> Result<Vec<Arc<QuizModule>>, QuizServiceError> {
        Ok(self.modules.list_modules().await?)
    }

    /// Load a module, apply its game-data reward override, and start a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::ModuleNotFound` for unknown ids and
    /// `QuizServiceError::Storage` for other storage failures.
    #[instrument(level = "info", skip(self), fields(module_id = %module_id))]
    pub async fn start_session(
        &self,
        module_id: &ModuleId,
    ) -> Result<QuizRunner, QuizServiceError> {
        let module = match self.modules.get_module(module_id).await {
            Ok(module) => module,
            Err(StorageError::NotFound) => {
                return Err(QuizServiceError::ModuleNotFound(module_id.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let module = match self.overrides.get_override(module.game_data_key()).await? {
            Some(reward) => {
                info!(coins = reward.coins, xp = reward.xp, "applying reward override");
                Arc::new(module.as_ref().clone().with_reward(reward))
            }
            None => module,
        };

        let session = QuizSession::new(module, self.clock.now()).with_timings(self.timings);
        Ok(QuizRunner::new(session, self.clock))
    }

    /// Persist a passing run once its results are visible.
    ///
    /// Returns `Ok(None)` for a failed run. Calling again after a successful
    /// hand-off returns the same id without writing twice.
    ///
    /// # Errors
    ///
    /// Returns `NotFinished` before `finish`, `ResultsPending` while the reveal
    /// delay is running, and `Storage` if the write fails (safe to call again).
    pub async fn finalize(
        &self,
        runner: &mut QuizRunner,
    ) -> Result<Option<CompletionId>, QuizServiceError> {
        if let Some(id) = runner.completion_id() {
            return Ok(Some(id));
        }

        let session = runner.snapshot().await;
        let (Some(outcome), Some(completed_at)) = (session.outcome(), session.completed_at())
        else {
            return Err(QuizServiceError::NotFinished);
        };
        if !session.results_visible() {
            return Err(QuizServiceError::ResultsPending);
        }
        if !session.submit_completion() {
            return Ok(None);
        }

        let summary = CompletionSummary::from_outcome(
            session.module().id().clone(),
            session.started_at(),
            completed_at,
            outcome,
        )?;
        let id = self.completions.append_completion(&summary).await?;
        runner.set_completion_id(id);
        info!(
            module_id = %summary.module_id(),
            completion_id = id,
            coins = summary.coins(),
            "completion submitted"
        );
        Ok(Some(id))
    }
}
