mod answer;
mod exam;
mod ids;
mod progress;
mod question;
mod session;
mod user;

pub use ids::{AnswerId, ExamId, ObjectiveId, ParseIdError, QuestionId, SessionId, UserId};

pub use answer::{
    AnswerError, AnswerSubmission, AnsweredQuestion, Confidence, MAX_TIME_SPENT_SECONDS,
    NewAnswer, UserAnswer,
};
pub use exam::{Exam, ExamError, Objective};
pub use progress::{MASTERY_MIN_ANSWERS, MasteryLevel, UserProgress};
pub use question::{
    Difficulty, NewQuestion, Question, QuestionDraft, QuestionError, QuestionSource,
    QuestionStats, QuestionType,
};
pub use session::{
    ObjectiveStats, SessionMode, SessionStateError, SessionStats, SessionStatus, StudySession,
};
pub use user::{SubscriptionTier, User, UserError, VerifiedIdentity};
