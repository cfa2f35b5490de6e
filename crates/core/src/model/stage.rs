use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ChoiceId, StageId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StageError {
    #[error("stage {stage} prompt cannot be empty")]
    EmptyPrompt { stage: StageId },

    #[error("stage {stage} has no options")]
    NoOptions { stage: StageId },

    #[error("stage {stage} has no correct option")]
    NoCorrectOption { stage: StageId },

    #[error("stage {stage} repeats choice id {choice}")]
    DuplicateChoice { stage: StageId, choice: ChoiceId },

    #[error("stage {stage} choice {choice} has an empty label")]
    EmptyLabel { stage: StageId, choice: ChoiceId },
}

//
// ─── CHOICE ────────────────────────────────────────────────────────────────────
//

/// One selectable answer within a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    id: ChoiceId,
    label: String,
    reflection: String,
    is_correct: bool,
}

impl Choice {
    #[must_use]
    pub fn id(&self) -> &ChoiceId {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Explanatory text revealed after the choice is picked.
    #[must_use]
    pub fn reflection(&self) -> &str {
        &self.reflection
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

//
// ─── STAGE ─────────────────────────────────────────────────────────────────────
//

/// A single multiple-choice prompt. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    id: StageId,
    prompt: String,
    options: Vec<Choice>,
    reward: u32,
}

impl Stage {
    /// Build a stage from its parts.
    ///
    /// # Errors
    ///
    /// Returns `StageError` if the prompt or a label is blank, there are no
    /// options, a choice id repeats, or no option is marked correct.
    pub fn new(
        id: StageId,
        prompt: impl Into<String>,
        options: Vec<ChoiceDraft>,
        reward: u32,
    ) -> Result<Self, StageError> {
        let prompt = prompt.into().trim().to_owned();
        if prompt.is_empty() {
            return Err(StageError::EmptyPrompt { stage: id });
        }
        if options.is_empty() {
            return Err(StageError::NoOptions { stage: id });
        }

        let mut seen = HashSet::with_capacity(options.len());
        let mut built = Vec::with_capacity(options.len());
        for draft in options {
            let choice_id = ChoiceId::new(draft.id.trim());
            if !seen.insert(choice_id.clone()) {
                return Err(StageError::DuplicateChoice {
                    stage: id,
                    choice: choice_id,
                });
            }
            let label = draft.label.trim().to_owned();
            if label.is_empty() {
                return Err(StageError::EmptyLabel {
                    stage: id,
                    choice: choice_id,
                });
            }
            built.push(Choice {
                id: choice_id,
                label,
                reflection: draft.reflection.trim().to_owned(),
                is_correct: draft.correct,
            });
        }

        if !built.iter().any(Choice::is_correct) {
            return Err(StageError::NoCorrectOption { stage: id });
        }

        Ok(Self {
            id,
            prompt,
            options: built,
            reward,
        })
    }

    #[must_use]
    pub fn id(&self) -> StageId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[Choice] {
        &self.options
    }

    /// Coins granted to the running tally when this stage is answered correctly.
    #[must_use]
    pub fn reward(&self) -> u32 {
        self.reward
    }

    #[must_use]
    pub fn choice(&self, id: &ChoiceId) -> Option<&Choice> {
        self.options.iter().find(|c| c.id() == id)
    }

    /// First option marked correct.
    #[must_use]
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.options.iter().find(|c| c.is_correct())
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Unvalidated choice as it appears in catalog files.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceDraft {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub reflection: String,
    #[serde(default)]
    pub correct: bool,
}

impl ChoiceDraft {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        reflection: impl Into<String>,
        correct: bool,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            reflection: reflection.into(),
            correct,
        }
    }
}

/// Unvalidated stage as it appears in catalog files.
#[derive(Debug, Clone, Deserialize)]
pub struct StageDraft {
    pub id: u32,
    pub prompt: String,
    #[serde(default)]
    pub reward: u32,
    #[serde(default)]
    pub options: Vec<ChoiceDraft>,
}

impl StageDraft {
    /// # Errors
    ///
    /// See [`Stage::new`].
    pub fn validate(self) -> Result<Stage, StageError> {
        Stage::new(StageId::new(self.id), self.prompt, self.options, self.reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<ChoiceDraft> {
        vec![
            ChoiceDraft::new("save", "Save it", "Good habit.", true),
            ChoiceDraft::new("spend", "Spend it", "Gone by Friday.", false),
        ]
    }

    #[test]
    fn builds_valid_stage() {
        let stage = Stage::new(StageId::new(1), " Payday! ", options(), 4).unwrap();
        assert_eq!(stage.prompt(), "Payday!");
        assert_eq!(stage.options().len(), 2);
        assert_eq!(stage.reward(), 4);
        assert_eq!(stage.correct_choice().unwrap().id().as_str(), "save");
        assert!(stage.choice(&ChoiceId::from("spend")).is_some());
        assert!(stage.choice(&ChoiceId::from("lend")).is_none());
    }

    #[test]
    fn rejects_stage_without_correct_option() {
        let opts = vec![ChoiceDraft::new("a", "A", "", false)];
        let err = Stage::new(StageId::new(2), "Q", opts, 1).unwrap_err();
        assert_eq!(err, StageError::NoCorrectOption { stage: StageId::new(2) });
    }

    #[test]
    fn rejects_duplicate_choice_ids() {
        let opts = vec![
            ChoiceDraft::new("a", "A", "", true),
            ChoiceDraft::new("a", "Again", "", false),
        ];
        let err = Stage::new(StageId::new(1), "Q", opts, 1).unwrap_err();
        assert!(matches!(err, StageError::DuplicateChoice { .. }));
    }

    #[test]
    fn rejects_blank_prompt_and_empty_options() {
        assert!(matches!(
            Stage::new(StageId::new(1), "   ", options(), 1),
            Err(StageError::EmptyPrompt { .. })
        ));
        assert!(matches!(
            Stage::new(StageId::new(1), "Q", Vec::new(), 1),
            Err(StageError::NoOptions { .. })
        ));
    }
}
