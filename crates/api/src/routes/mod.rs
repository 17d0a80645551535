mod auth;
mod dashboard;
mod exams;
mod generate;
mod health;
mod sessions;
mod study;

pub use auth::{login, logout, me};
pub use dashboard::dashboard_stats;
pub use exams::{list_exams, list_objectives};
pub use generate::generate_questions;
pub use health::{database_health, health};
pub use sessions::{
    NextParams, UpdateSession, complete_session, create_session, get_session, next_questions,
    record_answer, update_session,
};
pub use study::{StudyParams, study_questions};
