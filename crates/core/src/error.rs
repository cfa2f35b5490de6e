use thiserror::Error;

use crate::engine::QuizError;
use crate::model::{CompletionError, ModuleError, StageError};

/// Umbrella error for callers that do not care which layer of the core failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}
