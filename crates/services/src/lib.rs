#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod auth_service;
pub mod error;
pub mod identity;
pub mod progress;
pub mod sessions;
pub mod study_service;
pub mod timer;

pub use prep_core::Clock;

pub use app_services::{AppServices, ServiceSettings};
pub use auth_service::{AuthService, LoginSession};
pub use identity::{IdentityVerifier, LoginCredentials, LoginPolicy};
pub use error::{
    AiClientError, AppServicesError, AuthError, DashboardError, GenerationError, RateLimitError,
    SessionError, StudyError,
};
pub use progress::{DashboardService, DashboardStats, ExamProgress, ProgressService};
pub use sessions::{AnswerOutcome, CompletedSession, SessionAction, SessionService, StartSession};
pub use study_service::StudyService;
pub use timer::TimerRunner;
