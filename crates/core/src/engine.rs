use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::model::{AnswerRecord, ChoiceId, QuizModule, QuizOutcome, Stage, StageId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected transitions. A rejected call never changes the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("session already completed")]
    Completed,

    #[error("stage {got} is not the active stage ({expected})")]
    StageMismatch { expected: usize, got: usize },

    #[error("stage already answered")]
    AlreadyAnswered,

    #[error("choice {choice} does not exist on stage {stage}")]
    UnknownChoice { stage: StageId, choice: ChoiceId },

    #[error("current stage has not been answered")]
    NotAnswered,

    #[error("feedback is still showing")]
    AdvanceLocked,

    #[error("already on the last stage")]
    LastStage,

    #[error("finish requires the last stage")]
    NotLastStage,
}

//
// ─── TIMINGS ───────────────────────────────────────────────────────────────────
//

/// Reveal delays used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizTimings {
    /// Delay after a selection before `advance`/`finish` unlock.
    pub advance_delay: Duration,
    /// Delay after `finish` before the results become visible.
    pub reveal_delay: Duration,
}

impl QuizTimings {
    #[must_use]
    pub fn new(advance_delay: Duration, reveal_delay: Duration) -> Self {
        Self {
            advance_delay,
            reveal_delay,
        }
    }

    /// No delays; reveals are due immediately.
    #[must_use]
    pub fn immediate() -> Self {
        Self::new(Duration::zero(), Duration::zero())
    }
}

impl Default for QuizTimings {
    fn default() -> Self {
        Self::new(Duration::milliseconds(1500), Duration::milliseconds(2500))
    }
}

//
// ─── REVEALS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevealKind {
    /// Unlocks `advance`/`finish` after feedback has been shown.
    AdvanceUnlock,
    /// Exposes the completed results.
    Results,
}

/// Handle for one scheduled reveal.
///
/// Generations never repeat within a session, so a token issued before a
/// `retry` or a newer schedule is ignored by [`QuizSession::fire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevealToken {
    generation: u64,
    kind: RevealKind,
}

impl RevealToken {
    #[must_use]
    pub fn kind(&self) -> RevealKind {
        self.kind
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReveal {
    pub token: RevealToken,
    pub due_at: DateTime<Utc>,
}

impl PendingReveal {
    /// Time left until the reveal is due, zero if already due.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.due_at - now).max(Duration::zero())
    }
}

//
// ─── PHASE / PROGRESS ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Answering { stage: usize },
    Feedback { stage: usize, can_advance: bool },
    Completed { results_visible: bool },
}

/// Aggregated view of session progress, useful for a display shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub remaining: usize,
    pub coins: u32,
    pub is_complete: bool,
}

/// What a display shell needs right after a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionFeedback {
    pub stage_id: StageId,
    pub choice_id: ChoiceId,
    pub is_correct: bool,
    pub reflection: String,
    /// Coins added to the running tally; drives the "+N" flash.
    pub points: u32,
    pub reveal: PendingReveal,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Run-time state for one playthrough of a module.
///
/// The session is a pure state machine: time only enters through the `now`
/// arguments, and delayed effects are described as a [`PendingReveal`] that the
/// host either polls with [`tick`](Self::tick) or delivers with [`fire`](Self::fire).
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use quiz_core::engine::{QuizSession, QuizTimings};
/// # use quiz_core::model::*;
/// # use quiz_core::time::fixed_now;
/// let stage = Stage::new(
///     StageId::new(1),
///     "Borrow to buy the dip?",
///     vec![
///         ChoiceDraft::new("debt", "That's panic debt", "Right.", true),
///         ChoiceDraft::new("buy", "Buy now", "Risky.", false),
///     ],
///     4,
/// )?;
/// let module = QuizModule::new(
///     ModuleId::from("Demo"),
///     "Demo",
///     None,
///     vec![stage],
///     RewardRules::new(Reward::new(4, 1), FallbackPolicy::Zero),
/// )?;
/// let now = fixed_now();
/// let mut session =
///     QuizSession::new(Arc::new(module), now).with_timings(QuizTimings::immediate());
/// session.select_choice(0, &ChoiceId::from("debt"), now)?;
/// session.tick(now);
/// let outcome = session.finish(now)?;
/// assert!(outcome.passed);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct QuizSession {
    module: Arc<QuizModule>,
    timings: QuizTimings,
    current: usize,
    history: Vec<AnswerRecord>,
    coins: u32,
    selected: Option<ChoiceId>,
    can_advance: bool,
    outcome: Option<QuizOutcome>,
    results_visible: bool,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    pending: Option<PendingReveal>,
    generation: u64,
}

impl QuizSession {
    /// Start a fresh session at stage 0.
    #[must_use]
    pub fn new(module: Arc<QuizModule>, started_at: DateTime<Utc>) -> Self {
        Self {
            module,
            timings: QuizTimings::default(),
            current: 0,
            history: Vec::new(),
            coins: 0,
            selected: None,
            can_advance: false,
            outcome: None,
            results_visible: false,
            started_at,
            completed_at: None,
            pending: None,
            generation: 0,
        }
    }

    #[must_use]
    pub fn with_timings(mut self, timings: QuizTimings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn module(&self) -> &Arc<QuizModule> {
        &self.module
    }

    #[must_use]
    pub fn timings(&self) -> QuizTimings {
        self.timings
    }

    #[must_use]
    pub fn current_stage_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<&Stage> {
        self.module.stage(self.current)
    }

    #[must_use]
    pub fn is_last_stage(&self) -> bool {
        self.current + 1 >= self.module.total_stages()
    }

    #[must_use]
    pub fn history(&self) -> &[AnswerRecord] {
        &self.history
    }

    /// Running tally of stage rewards for correct answers so far.
    #[must_use]
    pub fn coins_accumulated(&self) -> u32 {
        self.coins
    }

    #[must_use]
    pub fn selected_choice(&self) -> Option<&ChoiceId> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn is_feedback_visible(&self) -> bool {
        self.selected.is_some()
    }

    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.can_advance
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn results_visible(&self) -> bool {
        self.results_visible
    }

    #[must_use]
    pub fn final_correct_count(&self) -> usize {
        self.history.iter().filter(|r| r.is_correct).count()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&QuizOutcome> {
        self.outcome.as_ref()
    }

    /// True once results are visible for a passing run.
    #[must_use]
    pub fn submit_completion(&self) -> bool {
        self.results_visible && self.outcome.is_some_and(|o| o.passed)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn pending_reveal(&self) -> Option<&PendingReveal> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.is_completed() {
            SessionPhase::Completed {
                results_visible: self.results_visible,
            }
        } else if self.selected.is_some() {
            SessionPhase::Feedback {
                stage: self.current,
                can_advance: self.can_advance,
            }
        } else {
            SessionPhase::Answering {
                stage: self.current,
            }
        }
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        let total = self.module.total_stages();
        QuizProgress {
            total,
            answered: self.history.len(),
            correct: self.final_correct_count(),
            remaining: total.saturating_sub(self.history.len()),
            coins: self.coins,
            is_complete: self.is_completed(),
        }
    }

    /// Record the single answer for the active stage.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after `finish`, `StageMismatch` if
    /// `stage_index` is not the active stage, `AlreadyAnswered` if a choice is
    /// locked in, and `UnknownChoice` if the stage has no such option.
    pub fn select_choice(
        &mut self,
        stage_index: usize,
        choice_id: &ChoiceId,
        now: DateTime<Utc>,
    ) -> Result<SelectionFeedback, QuizError> {
        if self.is_completed() {
            return Err(QuizError::Completed);
        }
        if stage_index != self.current {
            return Err(QuizError::StageMismatch {
                expected: self.current,
                got: stage_index,
            });
        }
        if self.selected.is_some() {
            return Err(QuizError::AlreadyAnswered);
        }

        let module = Arc::clone(&self.module);
        let stage = module.stage(self.current).ok_or(QuizError::Completed)?;
        let choice = stage.choice(choice_id).ok_or_else(|| QuizError::UnknownChoice {
            stage: stage.id(),
            choice: choice_id.clone(),
        })?;

        let is_correct = choice.is_correct();
        let points = if is_correct { stage.reward() } else { 0 };
        self.history.push(AnswerRecord {
            stage_id: stage.id(),
            is_correct,
        });
        self.coins = self.coins.saturating_add(points);
        self.selected = Some(choice_id.clone());
        self.can_advance = false;
        let reveal = self.schedule(RevealKind::AdvanceUnlock, now + self.timings.advance_delay);

        Ok(SelectionFeedback {
            stage_id: stage.id(),
            choice_id: choice_id.clone(),
            is_correct,
            reflection: choice.reflection().to_owned(),
            points,
            reveal,
        })
    }

    /// Move to the next stage once feedback has unlocked.
    ///
    /// Returns the new stage index.
    ///
    /// # Errors
    ///
    /// Returns `NotAnswered`/`AdvanceLocked` while the current stage is not
    /// ready, `LastStage` on the final stage (use `finish`), and `Completed`
    /// after `finish`.
    pub fn advance(&mut self) -> Result<usize, QuizError> {
        if self.is_completed() {
            return Err(QuizError::Completed);
        }
        if self.selected.is_none() {
            return Err(QuizError::NotAnswered);
        }
        if !self.can_advance {
            return Err(QuizError::AdvanceLocked);
        }
        if self.is_last_stage() {
            return Err(QuizError::LastStage);
        }

        self.current += 1;
        self.selected = None;
        self.can_advance = false;
        Ok(self.current)
    }

    /// Compute the outcome after the last stage and schedule the results reveal.
    ///
    /// # Errors
    ///
    /// Returns `NotLastStage` before the final stage, `NotAnswered`/`AdvanceLocked`
    /// while its feedback is pending, and `Completed` if already finished.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<QuizOutcome, QuizError> {
        if self.is_completed() {
            return Err(QuizError::Completed);
        }
        if !self.is_last_stage() {
            return Err(QuizError::NotLastStage);
        }
        if self.selected.is_none() {
            return Err(QuizError::NotAnswered);
        }
        if !self.can_advance {
            return Err(QuizError::AdvanceLocked);
        }

        let total = self.module.total_stages();
        let correct = self.final_correct_count();
        let outcome = QuizOutcome {
            total_stages: u32::try_from(total).unwrap_or(u32::MAX),
            correct_count: u32::try_from(correct).unwrap_or(u32::MAX),
            passed: correct == total,
            reward: self.module.rewards().award(correct, total),
        };

        self.outcome = Some(outcome);
        self.completed_at = Some(now);
        self.results_visible = false;
        self.schedule(RevealKind::Results, now + self.timings.reveal_delay);
        Ok(outcome)
    }

    /// Reset to stage 0 and drop any pending reveal.
    pub fn retry(&mut self, now: DateTime<Utc>) {
        self.current = 0;
        self.history.clear();
        self.coins = 0;
        self.selected = None;
        self.can_advance = false;
        self.outcome = None;
        self.results_visible = false;
        self.started_at = now;
        self.completed_at = None;
        self.pending = None;
        self.generation += 1;
    }

    /// Deliver a scheduled reveal. Stale or unknown tokens are ignored.
    ///
    /// Returns `true` if the token matched the pending reveal.
    pub fn fire(&mut self, token: RevealToken) -> bool {
        match self.pending {
            Some(pending) if pending.token == token => {
                self.pending = None;
                self.apply(token.kind);
                true
            }
            _ => false,
        }
    }

    /// Fire the pending reveal if it is due at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<RevealKind> {
        let pending = self.pending?;
        if pending.due_at > now {
            return None;
        }
        self.fire(pending.token).then_some(pending.token.kind)
    }

    fn schedule(&mut self, kind: RevealKind, due_at: DateTime<Utc>) -> PendingReveal {
        self.generation += 1;
        let pending = PendingReveal {
            token: RevealToken {
                generation: self.generation,
                kind,
            },
            due_at,
        };
        self.pending = Some(pending);
        pending
    }

    fn apply(&mut self, kind: RevealKind) {
        match kind {
            RevealKind::AdvanceUnlock => self.can_advance = true,
            RevealKind::Results => self.results_visible = true,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
