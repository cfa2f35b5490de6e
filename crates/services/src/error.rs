//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::engine::QuizError;
use quiz_core::model::{CompletionError, ModuleId};
use storage::StorageError;

/// Errors emitted by quiz session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("module not found: {0}")]
    ModuleNotFound(ModuleId),
    #[error("session has not finished")]
    NotFinished,
    #[error("results are not visible yet")]
    ResultsPending,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
