use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ModuleId, StageId};
use crate::model::reward::{FallbackPolicy, Reward, RewardRules};
use crate::model::stage::{Stage, StageDraft, StageError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module id cannot be empty")]
    EmptyId,

    #[error("module {module} title cannot be empty")]
    EmptyTitle { module: ModuleId },

    #[error("module {module} has no stages")]
    NoStages { module: ModuleId },

    #[error("module {module} repeats stage id {stage}")]
    DuplicateStage { module: ModuleId, stage: StageId },

    #[error("module {module} lists stage {stage} after a higher stage id")]
    StageOrder { module: ModuleId, stage: StageId },

    #[error("module {module}: {source}")]
    Stage {
        module: ModuleId,
        #[source]
        source: StageError,
    },
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// A complete quiz: ordered stages plus reward rules.
///
/// Modules are pure data. Stage order is the order given at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizModule {
    id: ModuleId,
    title: String,
    subtitle: Option<String>,
    stages: Vec<Stage>,
    rewards: RewardRules,
    game_data_key: Option<String>,
}

impl QuizModule {
    /// Creates a new module.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError` if the id/title are blank, there are no stages,
    /// or stage ids repeat or are out of order.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        subtitle: Option<String>,
        stages: Vec<Stage>,
        rewards: RewardRules,
    ) -> Result<Self, ModuleError> {
        if id.as_str().trim().is_empty() {
            return Err(ModuleError::EmptyId);
        }
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ModuleError::EmptyTitle { module: id });
        }
        if stages.is_empty() {
            return Err(ModuleError::NoStages { module: id });
        }
        let mut seen = HashSet::with_capacity(stages.len());
        for stage in &stages {
            if !seen.insert(stage.id()) {
                return Err(ModuleError::DuplicateStage {
                    module: id,
                    stage: stage.id(),
                });
            }
        }
        // Stage ids follow play order.
        if let Some(pair) = stages.windows(2).find(|pair| pair[1].id() < pair[0].id()) {
            return Err(ModuleError::StageOrder {
                module: id,
                stage: pair[1].id(),
            });
        }

        Ok(Self {
            id,
            title,
            subtitle: subtitle
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            stages,
            rewards,
            game_data_key: None,
        })
    }

    /// Key used to look up reward overrides; defaults to the module id.
    #[must_use]
    pub fn with_game_data_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.game_data_key = Some(key).filter(|k| !k.trim().is_empty());
        self
    }

    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    #[must_use]
    pub fn total_stages(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn rewards(&self) -> RewardRules {
        self.rewards
    }

    #[must_use]
    pub fn game_data_key(&self) -> &str {
        self.game_data_key.as_deref().unwrap_or(self.id.as_str())
    }

    /// Replace the full-completion reward, e.g. with a game-data override.
    #[must_use]
    pub fn with_reward(mut self, full: Reward) -> Self {
        self.rewards = self.rewards.with_override(full);
        self
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RewardDraft {
    #[serde(default)]
    pub total_coins: u32,
    #[serde(default)]
    pub xp: u32,
}

/// Unvalidated module as it appears in a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDraft {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub fallback: FallbackPolicy,
    #[serde(default)]
    pub game_data_key: Option<String>,
    #[serde(default)]
    pub rewards: RewardDraft,
    #[serde(default)]
    pub stages: Vec<StageDraft>,
}

impl ModuleDraft {
    /// Validate into an immutable module.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError` for any module or stage validation failure.
    pub fn validate(self) -> Result<QuizModule, ModuleError> {
        let id = ModuleId::new(self.id.trim());
        let mut stages = Vec::with_capacity(self.stages.len());
        for draft in self.stages {
            let stage = draft.validate().map_err(|source| ModuleError::Stage {
                module: id.clone(),
                source,
            })?;
            stages.push(stage);
        }
        let rules = RewardRules::new(
            Reward::new(self.rewards.total_coins, self.rewards.xp),
            self.fallback,
        );
        let module = QuizModule::new(id, self.title, self.subtitle, stages, rules)?;
        Ok(match self.game_data_key {
            Some(key) => module.with_game_data_key(key),
            None => module,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stage::ChoiceDraft;

    fn stage(id: u32) -> Stage {
        Stage::new(
            StageId::new(id),
            format!("Q{id}"),
            vec![
                ChoiceDraft::new("yes", "Yes", "", true),
                ChoiceDraft::new("no", "No", "", false),
            ],
            1,
        )
        .unwrap()
    }

    #[test]
    fn module_requires_stages() {
        let err = QuizModule::new(
            ModuleId::from("Empty"),
            "Empty",
            None,
            Vec::new(),
            RewardRules::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ModuleError::NoStages { .. }));
    }

    #[test]
    fn module_rejects_duplicate_stage_ids() {
        let err = QuizModule::new(
            ModuleId::from("Dup"),
            "Dup",
            None,
            vec![stage(1), stage(1)],
            RewardRules::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModuleError::DuplicateStage {
                module: ModuleId::from("Dup"),
                stage: StageId::new(1)
            }
        );
    }

    #[test]
    fn module_rejects_out_of_order_stage_ids() {
        let err = QuizModule::new(
            ModuleId::from("Shuffled"),
            "Shuffled",
            None,
            vec![stage(3), stage(1), stage(2)],
            RewardRules::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModuleError::StageOrder {
                module: ModuleId::from("Shuffled"),
                stage: StageId::new(1)
            }
        );

        let gapped = QuizModule::new(
            ModuleId::from("Gapped"),
            "Gapped",
            None,
            vec![stage(1), stage(5)],
            RewardRules::default(),
        );
        assert!(gapped.is_ok());
    }

    #[test]
    fn game_data_key_defaults_to_id() {
        let module = QuizModule::new(
            ModuleId::from("Budgeting"),
            "Budgeting",
            Some("  ".into()),
            vec![stage(1)],
            RewardRules::default(),
        )
        .unwrap();
        assert_eq!(module.game_data_key(), "Budgeting");
        assert_eq!(module.subtitle(), None);

        let keyed = module.with_game_data_key("finance-budget-101");
        assert_eq!(keyed.game_data_key(), "finance-budget-101");
    }

    #[test]
    fn draft_surfaces_stage_errors_with_module() {
        let draft = ModuleDraft {
            id: "Broken".into(),
            title: "Broken".into(),
            subtitle: None,
            fallback: FallbackPolicy::Zero,
            game_data_key: None,
            rewards: RewardDraft::default(),
            stages: vec![StageDraft {
                id: 1,
                prompt: "Q".into(),
                reward: 1,
                options: vec![ChoiceDraft::new("a", "A", "", false)],
            }],
        };
        let err = draft.validate().unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Stage {
                source: StageError::NoCorrectOption { .. },
                ..
            }
        ));
    }
}
