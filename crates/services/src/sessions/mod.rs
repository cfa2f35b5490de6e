mod runner;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::QuizServiceError;
pub use runner::QuizRunner;
pub use view::{CompletionHistoryService, CompletionListItem};
pub use workflow::QuizLoopService;
