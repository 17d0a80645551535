use std::sync::Arc;

use storage::repository::{ExamRepository, HealthCheck, Storage};

use crate::Clock;
use crate::ai::{AiClient, AiConfig, DEFAULT_COOLDOWN_SECS, GenerationService, RateLimiter};
use crate::auth_service::AuthService;
use crate::error::AppServicesError;
use crate::identity::{IdentityVerifier, LoginPolicy};
use crate::progress::{DashboardService, ProgressService};
use crate::sessions::SessionService;
use crate::study_service::StudyService;

/// Knobs the service layer needs from configuration.
#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub token_secret: String,
    /// `None` disables AI question generation.
    pub ai: Option<AiConfig>,
    pub generation_cooldown_secs: u32,
    /// Which sign-in credentials `AuthService::sign_in` accepts.
    pub login: LoginPolicy,
}

impl ServiceSettings {
    #[must_use]
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            ai: None,
            generation_cooldown_secs: DEFAULT_COOLDOWN_SECS,
            login: LoginPolicy::Disabled,
        }
    }

    #[must_use]
    pub fn with_login(mut self, login: LoginPolicy) -> Self {
        self.login = login;
        self
    }

    #[must_use]
    pub fn with_ai(mut self, ai: Option<AiConfig>) -> Self {
        self.ai = ai;
        self
    }
}

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    auth: Arc<AuthService>,
    study: Arc<StudyService>,
    sessions: Arc<SessionService>,
    dashboard: Arc<DashboardService>,
    generation: Arc<GenerationService>,
    exams: Arc<dyn ExamRepository>,
    health: Arc<dyn HealthCheck>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock, settings: ServiceSettings) -> Self {
        let study = StudyService::new(
            clock,
            Arc::clone(&storage.exams),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.answers),
        );
        let progress = ProgressService::new(
            clock,
            Arc::clone(&storage.exams),
            Arc::clone(&storage.answers),
            Arc::clone(&storage.progress),
        );
        let sessions = SessionService::new(
            clock,
            Arc::clone(&storage.exams),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.answers),
            Arc::clone(&storage.sessions),
            study.clone(),
            progress,
        );
        let dashboard = DashboardService::new(
            clock,
            Arc::clone(&storage.exams),
            Arc::clone(&storage.answers),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.progress),
        );
        let auth = AuthService::new(
            clock,
            settings.token_secret,
            Arc::clone(&storage.users),
            Arc::clone(&storage.tokens),
        )
        .with_verifier(IdentityVerifier::new(settings.login));
        let generation = GenerationService::new(
            clock,
            AiClient::new(settings.ai),
            Arc::new(RateLimiter::new(settings.generation_cooldown_secs)),
            Arc::clone(&storage.exams),
            Arc::clone(&storage.questions),
        );

        Self {
            auth: Arc::new(auth),
            study: Arc::new(study),
            sessions: Arc::new(sessions),
            dashboard: Arc::new(dashboard),
            generation: Arc::new(generation),
            exams: Arc::clone(&storage.exams),
            health: Arc::clone(&storage.health),
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: ServiceSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, settings))
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn study(&self) -> Arc<StudyService> {
        Arc::clone(&self.study)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn generation(&self) -> Arc<GenerationService> {
        Arc::clone(&self.generation)
    }

    /// Read access to the exam catalog.
    #[must_use]
    pub fn exams(&self) -> Arc<dyn ExamRepository> {
        Arc::clone(&self.exams)
    }

    #[must_use]
    pub fn health(&self) -> Arc<dyn HealthCheck> {
        Arc::clone(&self.health)
    }
}
