#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use quiz_core::Clock;
pub use quiz_core::engine::{QuizTimings, SelectionFeedback, SessionPhase};

pub use error::QuizServiceError;
pub use sessions::{CompletionHistoryService, CompletionListItem, QuizLoopService, QuizRunner};
