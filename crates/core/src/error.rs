use thiserror::Error;

use crate::model::{
    AnswerError, ExamError, QuestionError, SessionStateError, UserError,
};
use crate::selection::SelectionError;
use crate::timer::TimerError;

/// Any domain validation failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Timer(#[from] TimerError),
}
