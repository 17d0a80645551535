use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prep_core::model::{
    AnswerId, AnsweredQuestion, Exam, ExamId, NewAnswer, NewQuestion, Objective, Question,
    QuestionId, QuestionStats, SessionId, SessionMode, StudySession, User, UserAnswer, UserId,
    UserProgress, VerifiedIdentity,
};
use prep_core::selection::{SelectionOrder, StudyQuestionQuery};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::selection;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Input for opening a study session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub user_id: UserId,
    pub exam_id: ExamId,
    pub mode: SessionMode,
    pub question_count: u32,
    pub started_at: DateTime<Utc>,
}

/// Lifetime answer totals for a user, plus timestamps for streak calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerActivity {
    pub total_answers: u32,
    pub correct_answers: u32,
    pub total_time_seconds: u64,
    /// Answer timestamps at or after the requested lower bound.
    pub recent_answer_times: Vec<DateTime<Utc>>,
}

/// Session counts for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounts {
    pub total: u32,
    pub completed: u32,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create the user on first sign-in, or refresh name/Google id on later ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_identity(
        &self,
        identity: &VerifiedIdentity,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;
}

#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Persist or update an exam.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the exam code is taken by another exam.
    async fn upsert_exam(&self, exam: &Exam) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_exams(&self, active_only: bool) -> Result<Vec<Exam>, StorageError>;

    /// Persist or update an objective.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam does not exist.
    async fn upsert_objective(&self, objective: &Objective) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_objectives(&self, exam_id: ExamId) -> Result<Vec<Objective>, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Store a new active question with zeroed statistics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam or objective is missing.
    async fn insert_question(&self, question: &NewQuestion) -> Result<Question, StorageError>;

    /// Store a batch of questions as one unit: either all of them or none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any exam or objective is missing; nothing
    /// is written in that case.
    async fn insert_questions(
        &self,
        questions: &[NewQuestion],
    ) -> Result<Vec<Question>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// Select up to `query.limit()` questions matching the query, skipping `excluded`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn study_questions(
        &self,
        query: &StudyQuestionQuery,
        excluded: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// IDs of questions of `exam_id` the user answered at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn recent_question_ids(
        &self,
        user_id: UserId,
        exam_id: ExamId,
        since: DateTime<Utc>,
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// Insert the answer and roll the question statistics forward atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question or session is missing; nothing
    /// is written in that case.
    async fn record_answer(&self, answer: NewAnswer) -> Result<UserAnswer, StorageError>;

    /// Answers of a session joined to their question's objective, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn session_answers(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError>;

    /// Every answer a user gave for an exam, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn user_exam_answers(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn activity(
        &self,
        user_id: UserId,
        recent_since: DateTime<Utc>,
    ) -> Result<AnswerActivity, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has an open session for the
    /// exam, `StorageError::NotFound` if the user or exam is missing.
    async fn create_session(&self, session: &NewSession) -> Result<StudySession, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<StudySession>, StorageError>;

    /// Write back status, counters and timestamps.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn update_session(&self, session: &StudySession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn find_open_session(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Option<StudySession>, StorageError>;

    /// Most recently started sessions first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_sessions(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<StudySession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn count_sessions(&self, user_id: UserId) -> Result<SessionCounts, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the rollup cannot be stored.
    async fn upsert_progress(
        &self,
        progress: &UserProgress,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_progress(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Option<UserProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_progress(&self, user_id: UserId) -> Result<Vec<UserProgress>, StorageError>;
}

/// Bearer tokens, stored by digest only.
#[async_trait]
pub trait AuthTokenRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a digest collision.
    async fn insert_token(
        &self,
        digest: &str,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// The token's user if the token exists and has not expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn find_token_user(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StorageError>;

    /// Returns whether a token was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn delete_token(&self, digest: &str) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Round-trip to the backing store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` when the store is unreachable.
    async fn ping(&self) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    exams: HashMap<ExamId, Exam>,
    objectives: HashMap<prep_core::model::ObjectiveId, Objective>,
    questions: HashMap<QuestionId, Question>,
    answers: Vec<UserAnswer>,
    sessions: HashMap<SessionId, StudySession>,
    progress: HashMap<(UserId, ExamId), UserProgress>,
    tokens: HashMap<String, (UserId, DateTime<Utc>)>,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn answered(&self, answer: &UserAnswer) -> Option<AnsweredQuestion> {
        let question = self.questions.get(&answer.question_id)?;
        Some(AnsweredQuestion {
            question_id: answer.question_id,
            objective_id: question.objective_id(),
            is_correct: answer.is_correct,
            time_spent_seconds: answer.time_spent_seconds,
            answered_at: answer.answered_at,
        })
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_identity(
        &self,
        identity: &VerifiedIdentity,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let mut guard = self.lock()?;
        if let Some(user) = guard.users.values_mut().find(|u| u.email == identity.email) {
            user.name.clone_from(&identity.name);
            if identity.google_id.is_some() {
                user.google_id.clone_from(&identity.google_id);
            }
            user.updated_at = now;
            return Ok(user.clone());
        }
        let id = UserId::new(guard.next_id());
        let user = User {
            id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            google_id: identity.google_id.clone(),
            subscription_tier: prep_core::model::SubscriptionTier::Free,
            created_at: now,
            updated_at: now,
        };
        guard.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }
}

#[async_trait]
impl ExamRepository for InMemoryRepository {
    async fn upsert_exam(&self, exam: &Exam) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard
            .exams
            .values()
            .any(|e| e.code() == exam.code() && e.id() != exam.id())
        {
            return Err(StorageError::Conflict);
        }
        guard.exams.insert(exam.id(), exam.clone());
        Ok(())
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError> {
        Ok(self.lock()?.exams.get(&id).cloned())
    }

    async fn list_exams(&self, active_only: bool) -> Result<Vec<Exam>, StorageError> {
        let guard = self.lock()?;
        let mut exams: Vec<Exam> = guard
            .exams
            .values()
            .filter(|e| !active_only || e.is_active())
            .cloned()
            .collect();
        exams.sort_by(|a, b| a.vendor().cmp(b.vendor()).then(a.code().cmp(b.code())));
        Ok(exams)
    }

    async fn upsert_objective(&self, objective: &Objective) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.exams.contains_key(&objective.exam_id()) {
            return Err(StorageError::NotFound);
        }
        guard.objectives.insert(objective.id(), objective.clone());
        Ok(())
    }

    async fn list_objectives(&self, exam_id: ExamId) -> Result<Vec<Objective>, StorageError> {
        let guard = self.lock()?;
        let mut objectives: Vec<Objective> = guard
            .objectives
            .values()
            .filter(|o| o.exam_id() == exam_id)
            .cloned()
            .collect();
        objectives.sort_by_key(Objective::id);
        Ok(objectives)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_question(&self, question: &NewQuestion) -> Result<Question, StorageError> {
        let mut stored = self.insert_questions(std::slice::from_ref(question)).await?;
        stored.pop().ok_or(StorageError::NotFound)
    }

    async fn insert_questions(
        &self,
        questions: &[NewQuestion],
    ) -> Result<Vec<Question>, StorageError> {
        let mut guard = self.lock()?;
        let all_known = questions.iter().all(|question| {
            guard.exams.contains_key(&question.exam_id())
                && guard
                    .objectives
                    .get(&question.objective_id())
                    .is_some_and(|o| o.exam_id() == question.exam_id())
        });
        if !all_known {
            return Err(StorageError::NotFound);
        }

        let mut stored = Vec::with_capacity(questions.len());
        for question in questions {
            let id = QuestionId::new(guard.next_id());
            let question =
                Question::from_persisted(id, question.clone(), true, QuestionStats::default());
            guard.questions.insert(id, question.clone());
            stored.push(question);
        }
        Ok(stored)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        Ok(self.lock()?.questions.get(&id).cloned())
    }

    async fn study_questions(
        &self,
        query: &StudyQuestionQuery,
        excluded: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        let mut candidates: Vec<Question> = guard
            .questions
            .values()
            .filter(|q| selection::matches(q, query, excluded))
            .cloned()
            .collect();
        drop(guard);

        let limit = usize::try_from(query.limit()).unwrap_or(usize::MAX);
        if query.order == SelectionOrder::Random {
            let ids = selection::sample_ids(
                candidates.iter().map(Question::id),
                limit,
                &mut rand::rng(),
            );
            return Ok(selection::reorder_by_ids(candidates, &ids));
        }

        selection::sort_for_order(&mut candidates, query.order);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn recent_question_ids(
        &self,
        user_id: UserId,
        exam_id: ExamId,
        since: DateTime<Utc>,
    ) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self.lock()?;
        let mut ids: Vec<QuestionId> = guard
            .answers
            .iter()
            .filter(|a| a.user_id == user_id && a.answered_at >= since)
            .filter(|a| {
                guard
                    .questions
                    .get(&a.question_id)
                    .is_some_and(|q| q.exam_id() == exam_id)
            })
            .map(|a| a.question_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn record_answer(&self, answer: NewAnswer) -> Result<UserAnswer, StorageError> {
        let mut guard = self.lock()?;
        if !guard.sessions.contains_key(&answer.session_id) {
            return Err(StorageError::NotFound);
        }
        let stats = guard
            .questions
            .get(&answer.question_id)
            .ok_or(StorageError::NotFound)?
            .stats()
            .record_attempt(answer.is_correct, answer.time_spent_seconds);

        let id = AnswerId::new(guard.next_id());
        let answered_at = answer.answered_at;
        let session_id = answer.session_id;
        let stored = UserAnswer::from_new(id, answer);

        if let Some(question) = guard.questions.get_mut(&stored.question_id) {
            question.set_stats(stats);
        }
        if let Some(session) = guard.sessions.get_mut(&session_id) {
            session.last_activity_at = answered_at;
        }
        guard.answers.push(stored.clone());
        Ok(stored)
    }

    async fn session_answers(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .filter_map(|a| guard.answered(a))
            .collect())
    }

    async fn user_exam_answers(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| {
                guard
                    .questions
                    .get(&a.question_id)
                    .is_some_and(|q| q.exam_id() == exam_id)
            })
            .filter_map(|a| guard.answered(a))
            .collect())
    }

    async fn activity(
        &self,
        user_id: UserId,
        recent_since: DateTime<Utc>,
    ) -> Result<AnswerActivity, StorageError> {
        let guard = self.lock()?;
        let mut activity = AnswerActivity::default();
        for answer in guard.answers.iter().filter(|a| a.user_id == user_id) {
            activity.total_answers += 1;
            if answer.is_correct {
                activity.correct_answers += 1;
            }
            activity.total_time_seconds += u64::from(answer.time_spent_seconds);
            if answer.answered_at >= recent_since {
                activity.recent_answer_times.push(answer.answered_at);
            }
        }
        Ok(activity)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &NewSession) -> Result<StudySession, StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&session.user_id)
            || !guard.exams.contains_key(&session.exam_id)
        {
            return Err(StorageError::NotFound);
        }
        if guard
            .sessions
            .values()
            .any(|s| s.user_id == session.user_id && s.exam_id == session.exam_id && s.is_open())
        {
            return Err(StorageError::Conflict);
        }
        let id = SessionId::new(guard.next_id());
        let created = StudySession::start(
            id,
            session.user_id,
            session.exam_id,
            session.mode,
            session.question_count,
            session.started_at,
        );
        guard.sessions.insert(id, created.clone());
        Ok(created)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<StudySession>, StorageError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn update_session(&self, session: &StudySession) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard
            .sessions
            .get_mut(&session.id)
            .ok_or(StorageError::NotFound)?;
        *slot = session.clone();
        Ok(())
    }

    async fn find_open_session(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Option<StudySession>, StorageError> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.exam_id == exam_id && s.is_open())
            .cloned())
    }

    async fn list_sessions(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<StudySession>, StorageError> {
        let guard = self.lock()?;
        let mut sessions: Vec<StudySession> = guard
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        sessions.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(sessions)
    }

    async fn count_sessions(&self, user_id: UserId) -> Result<SessionCounts, StorageError> {
        let guard = self.lock()?;
        let mut counts = SessionCounts::default();
        for session in guard.sessions.values().filter(|s| s.user_id == user_id) {
            counts.total += 1;
            if !session.is_open() {
                counts.completed += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_progress(
        &self,
        progress: &UserProgress,
        _now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.lock()?
            .progress
            .insert((progress.user_id, progress.exam_id), progress.clone());
        Ok(())
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Option<UserProgress>, StorageError> {
        Ok(self.lock()?.progress.get(&(user_id, exam_id)).cloned())
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<UserProgress>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<UserProgress> = guard
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.exam_id);
        Ok(rows)
    }
}

#[async_trait]
impl AuthTokenRepository for InMemoryRepository {
    async fn insert_token(
        &self,
        digest: &str,
        user_id: UserId,
        _created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.tokens.contains_key(digest) {
            return Err(StorageError::Conflict);
        }
        guard
            .tokens
            .insert(digest.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn find_token_user(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StorageError> {
        Ok(self
            .lock()?
            .tokens
            .get(digest)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(user_id, _)| *user_id))
    }

    async fn delete_token(&self, digest: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.tokens.remove(digest).is_some())
    }
}

#[async_trait]
impl HealthCheck for InMemoryRepository {
    async fn ping(&self) -> Result<(), StorageError> {
        self.lock().map(|_| ())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub exams: Arc<dyn ExamRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub tokens: Arc<dyn AuthTokenRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Share one adapter across every repository slot.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + ExamRepository
            + QuestionRepository
            + AnswerRepository
            + SessionRepository
            + ProgressRepository
            + AuthTokenRepository
            + HealthCheck
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            exams: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            tokens: Arc::new(repo.clone()),
            health: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::{ObjectiveId, QuestionDraft, QuestionSource};
    use prep_core::selection::DifficultyRange;
    use prep_core::time::fixed_now;

    async fn seeded() -> (InMemoryRepository, User) {
        let repo = InMemoryRepository::new();
        let exam = Exam::new(ExamId::new(1), "CompTIA", "SY0-701", "Security+", 75, 90, 90, true)
            .unwrap();
        repo.upsert_exam(&exam).await.unwrap();
        repo.upsert_objective(
            &Objective::new(ObjectiveId::new(1), ExamId::new(1), "1.0", "General", 100).unwrap(),
        )
        .await
        .unwrap();
        for i in 0..20_u8 {
            let draft = QuestionDraft {
                exam_id: ExamId::new(1),
                objective_id: ObjectiveId::new(1),
                text: format!("Question {i}"),
                options: vec!["a".into(), "b".into()],
                correct_answers: vec![0],
                explanation: None,
                difficulty: if i < 10 { 1 + i % 2 } else { 3 + i % 3 },
                source: QuestionSource::Manual,
            };
            repo.insert_question(&draft.validate().unwrap()).await.unwrap();
        }
        let user = repo
            .upsert_identity(
                &VerifiedIdentity {
                    email: "ada@example.com".into(),
                    name: "Ada".into(),
                    google_id: None,
                },
                fixed_now(),
            )
            .await
            .unwrap();
        (repo, user)
    }

    #[tokio::test]
    async fn rejected_batch_leaves_no_questions_behind() {
        let (repo, _) = seeded().await;
        let draft = |objective: u64| {
            QuestionDraft {
                exam_id: ExamId::new(1),
                objective_id: ObjectiveId::new(objective),
                text: format!("Generated for {objective}"),
                options: vec!["a".into(), "b".into()],
                correct_answers: vec![1],
                explanation: None,
                difficulty: 2,
                source: QuestionSource::Ai,
            }
            .validate()
            .unwrap()
        };
        let before = repo.lock().unwrap().questions.len();

        let err = repo.insert_questions(&[draft(1), draft(7)]).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        assert_eq!(repo.lock().unwrap().questions.len(), before);

        let stored = repo.insert_questions(&[draft(1), draft(1)]).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(repo.lock().unwrap().questions.len(), before + 2);
    }

    #[tokio::test]
    async fn difficulty_filter_and_limit() {
        let (repo, _) = seeded().await;
        let query = StudyQuestionQuery::new(ExamId::new(1))
            .with_difficulty(DifficultyRange::new(3, 5).unwrap())
            .with_limit(10);
        let questions = repo.study_questions(&query, &[]).await.unwrap();
        assert_eq!(questions.len(), 10);
        assert!(questions.iter().all(|q| q.difficulty().value() >= 3));
    }

    #[tokio::test]
    async fn speed_drill_orders_by_difficulty() {
        let (repo, _) = seeded().await;
        let query = StudyQuestionQuery::new(ExamId::new(1))
            .with_order(SelectionOrder::SpeedDrill)
            .with_limit(100);
        let questions = repo.study_questions(&query, &[]).await.unwrap();
        assert_eq!(questions.len(), 20);
        assert!(questions.windows(2).all(|w| w[0].difficulty() <= w[1].difficulty()));
    }

    #[tokio::test]
    async fn record_answer_updates_question_stats() {
        let (repo, user) = seeded().await;
        let session = repo
            .create_session(&NewSession {
                user_id: user.id,
                exam_id: ExamId::new(1),
                mode: SessionMode::Study,
                question_count: 20,
                started_at: fixed_now(),
            })
            .await
            .unwrap();
        let question = repo.study_questions(&StudyQuestionQuery::new(ExamId::new(1)), &[])
            .await
            .unwrap()
            .remove(0);

        repo.record_answer(NewAnswer {
            session_id: session.id,
            user_id: user.id,
            question_id: question.id(),
            selected_answers: vec![1],
            is_correct: false,
            time_spent_seconds: 40,
            confidence: None,
            flagged: false,
            answered_at: fixed_now(),
        })
        .await
        .unwrap();

        let stats = repo.get_question(question.id()).await.unwrap().unwrap().stats();
        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.correct_attempts, 0);
    }

    #[tokio::test]
    async fn second_open_session_conflicts() {
        let (repo, user) = seeded().await;
        let new = NewSession {
            user_id: user.id,
            exam_id: ExamId::new(1),
            mode: SessionMode::Study,
            question_count: 20,
            started_at: fixed_now(),
        };
        repo.create_session(&new).await.unwrap();
        assert!(matches!(
            repo.create_session(&new).await,
            Err(StorageError::Conflict)
        ));
    }
}
