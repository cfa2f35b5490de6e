mod completion;
mod ids;
mod module;
mod reward;
mod stage;

pub use ids::{ChoiceId, ModuleId, ParseIdError, StageId};

pub use completion::{AnswerRecord, CompletionError, CompletionSummary, QuizOutcome};
pub use module::{ModuleDraft, ModuleError, QuizModule, RewardDraft};
pub use reward::{FallbackPolicy, Reward, RewardOverride, RewardRules};
pub use stage::{Choice, ChoiceDraft, Stage, StageDraft, StageError};
