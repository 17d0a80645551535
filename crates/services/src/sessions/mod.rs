mod answers;
mod service;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use answers::AnswerOutcome;
pub use service::{CompletedSession, SessionAction, SessionService, StartSession};
