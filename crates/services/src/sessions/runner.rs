use std::fmt;
use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::engine::{PendingReveal, QuizSession, SelectionFeedback, SessionPhase};
use quiz_core::model::{ChoiceId, QuizOutcome};
use quiz_core::time::to_std;
use storage::CompletionId;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::QuizServiceError;

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Drives one [`QuizSession`] on tokio, turning its pending reveals into timer tasks.
///
/// At most one timer task is alive at a time. It is aborted when a new reveal
/// is scheduled, on [`retry`](Self::retry), and when the runner is dropped, so
/// a reveal can never land in a reset or abandoned session.
pub struct QuizRunner {
    clock: Clock,
    session: Arc<Mutex<QuizSession>>,
    timer: Option<JoinHandle<()>>,
    phase_tx: Arc<watch::Sender<SessionPhase>>,
    completion_id: Option<CompletionId>,
}

impl QuizRunner {
    #[must_use]
    pub fn new(session: QuizSession, clock: Clock) -> Self {
        let (phase_tx, _rx) = watch::channel(session.phase());
        Self {
            clock,
            session: Arc::new(Mutex::new(session)),
            timer: None,
            phase_tx: Arc::new(phase_tx),
            completion_id: None,
        }
    }

    /// Phase updates, including those applied by timer tasks.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Copy of the current session state.
    pub async fn snapshot(&self) -> QuizSession {
        self.session.lock().await.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.session.lock().await.phase()
    }

    #[must_use]
    pub fn completion_id(&self) -> Option<CompletionId> {
        self.completion_id
    }

    pub(crate) fn set_completion_id(&mut self, id: CompletionId) {
        self.completion_id = Some(id);
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` if the engine rejects the selection.
    pub async fn select_choice(
        &mut self,
        stage_index: usize,
        choice_id: &ChoiceId,
    ) -> Result<SelectionFeedback, QuizServiceError> {
        let (feedback, phase) = {
            let mut session = self.session.lock().await;
            let feedback = session.select_choice(stage_index, choice_id, self.clock.now())?;
            (feedback, session.phase())
        };
        debug!(
            stage = %feedback.stage_id,
            choice = %feedback.choice_id,
            correct = feedback.is_correct,
            points = feedback.points,
            "choice selected"
        );
        self.schedule(feedback.reveal);
        self.phase_tx.send_replace(phase);
        Ok(feedback)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` while feedback is locked or on the last stage.
    pub async fn advance(&mut self) -> Result<usize, QuizServiceError> {
        let (index, phase) = {
            let mut session = self.session.lock().await;
            let index = session.advance()?;
            (index, session.phase())
        };
        self.phase_tx.send_replace(phase);
        Ok(index)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` if the last stage is not answered and unlocked.
    pub async fn finish(&mut self) -> Result<QuizOutcome, QuizServiceError> {
        let (outcome, reveal, phase, module_id) = {
            let mut session = self.session.lock().await;
            let outcome = session.finish(self.clock.now())?;
            (
                outcome,
                session.pending_reveal().copied(),
                session.phase(),
                session.module().id().clone(),
            )
        };
        info!(
            module_id = %module_id,
            correct = outcome.correct_count,
            total = outcome.total_stages,
            passed = outcome.passed,
            coins = outcome.reward.coins,
            "session finished"
        );
        if let Some(reveal) = reveal {
            self.schedule(reveal);
        }
        self.phase_tx.send_replace(phase);
        Ok(outcome)
    }

    /// Cancel any pending reveal and start over at stage 0.
    pub async fn retry(&mut self) {
        self.cancel_timer();
        let phase = {
            let mut session = self.session.lock().await;
            session.retry(self.clock.now());
            session.phase()
        };
        self.completion_id = None;
        debug!("session reset");
        self.phase_tx.send_replace(phase);
    }

    /// Wait until the outstanding reveal (if any) has fired.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.timer.take() {
            // A cancelled task has nothing left to apply.
            let _ = handle.await;
        }
    }

    fn schedule(&mut self, reveal: PendingReveal) {
        self.cancel_timer();
        let delay = to_std(reveal.remaining(self.clock.now()));
        let session = Arc::clone(&self.session);
        let phase_tx = Arc::clone(&self.phase_tx);
        let token = reveal.token;

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut session = session.lock().await;
            if session.fire(token) {
                debug!(kind = ?token.kind(), "reveal fired");
                phase_tx.send_replace(session.phase());
            }
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for QuizRunner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl fmt::Debug for QuizRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizRunner")
            .field("clock", &self.clock)
            .field("timer_pending", &self.timer.is_some())
            .field("completion_id", &self.completion_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
