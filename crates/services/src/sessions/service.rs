use std::sync::Arc;

use serde::{Deserialize, Serialize};

use prep_core::model::{
    AnswerSubmission, ExamId, NewAnswer, Question, SessionId, SessionMode, SessionStats,
    SessionStatus, StudySession, UserId, UserProgress,
};
use prep_core::selection::{DEFAULT_LIMIT, MAX_LIMIT, SelectionOrder, StudyQuestionQuery};
use storage::repository::{
    AnswerRepository, ExamRepository, NewSession, QuestionRepository, SessionRepository,
    StorageError,
};

use super::answers::{AnswerOutcome, grade};
use crate::Clock;
use crate::error::SessionError;
use crate::progress::ProgressService;
use crate::study_service::StudyService;

/// Request to open a new session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartSession {
    pub exam_id: ExamId,
    #[serde(default)]
    pub mode: SessionMode,
    /// Target question count; defaults by mode when absent.
    #[serde(default)]
    pub question_count: Option<u32>,
}

/// Client-driven state changes on an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Pause,
    Resume,
}

/// A finished session with its final statistics and refreshed exam progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedSession {
    pub session: StudySession,
    /// `None` when the session was completed without any answers.
    pub stats: Option<SessionStats>,
    pub progress: UserProgress,
}

/// Owns the study session lifecycle: open, answer, pause/resume, complete.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    answers: Arc<dyn AnswerRepository>,
    sessions: Arc<dyn SessionRepository>,
    study: StudyService,
    progress: ProgressService,
}

impl SessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        questions: Arc<dyn QuestionRepository>,
        answers: Arc<dyn AnswerRepository>,
        sessions: Arc<dyn SessionRepository>,
        study: StudyService,
        progress: ProgressService,
    ) -> Self {
        Self {
            clock,
            exams,
            questions,
            answers,
            sessions,
            study,
            progress,
        }
    }

    /// Open a session for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ExamNotFound` / `ExamInactive` for unusable exams,
    /// `SessionError::AlreadyOpen` when the user already has an open session for the exam.
    pub async fn create(
        &self,
        user_id: UserId,
        request: StartSession,
    ) -> Result<StudySession, SessionError> {
        let exam = self
            .exams
            .get_exam(request.exam_id)
            .await?
            .ok_or(SessionError::ExamNotFound)?;
        if !exam.is_active() {
            return Err(SessionError::ExamInactive);
        }

        let question_count = match (request.question_count, request.mode) {
            (Some(0), _) => return Err(SessionError::InvalidQuestionCount),
            (Some(count), _) => count,
            (None, SessionMode::Practice) => exam.question_count(),
            (None, _) => DEFAULT_LIMIT,
        };

        let new = NewSession {
            user_id,
            exam_id: exam.id(),
            mode: request.mode,
            question_count,
            started_at: self.clock.now(),
        };
        let session = self.sessions.create_session(&new).await.map_err(|err| match err {
            StorageError::Conflict => SessionError::AlreadyOpen,
            StorageError::NotFound => SessionError::ExamNotFound,
            other => SessionError::Storage(other),
        })?;

        tracing::info!(
            session_id = %session.id,
            user_id = %user_id,
            exam = exam.code(),
            mode = session.mode.as_str(),
            question_count,
            "session started"
        );
        Ok(session)
    }

    /// Fetch a session owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for unknown sessions and sessions of other users.
    pub async fn get(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<StudySession, SessionError> {
        match self.sessions.get_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(SessionError::NotFound),
        }
    }

    /// Apply a pause or resume.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` for transitions the current status does not allow.
    pub async fn apply(
        &self,
        user_id: UserId,
        session_id: SessionId,
        action: SessionAction,
    ) -> Result<StudySession, SessionError> {
        let mut session = self.get(user_id, session_id).await?;
        let now = self.clock.now();
        match action {
            SessionAction::Pause => session.pause(now)?,
            SessionAction::Resume => session.resume(now)?,
        }
        self.sessions.update_session(&session).await?;
        tracing::debug!(session_id = %session.id, status = %session.status, "session updated");
        Ok(session)
    }

    /// Grade and store one answer, then refresh the session counters.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` unless the session is active, question errors
    /// for unknown questions or questions of another exam, and `SessionError::Answer`
    /// for malformed submissions.
    pub async fn record_answer(
        &self,
        user_id: UserId,
        session_id: SessionId,
        submission: AnswerSubmission,
    ) -> Result<AnswerOutcome, SessionError> {
        let mut session = self.get(user_id, session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(SessionError::NotActive(session.status));
        }
        let confidence = submission.validate()?;

        let question = self
            .questions
            .get_question(submission.question_id)
            .await?
            .ok_or(SessionError::QuestionNotFound)?;
        if question.exam_id() != session.exam_id {
            return Err(SessionError::QuestionNotInExam);
        }
        let (selected_answers, is_correct) = grade(&question, &submission.selected_answers)?;

        let now = self.clock.now();
        let answer = self
            .answers
            .record_answer(NewAnswer {
                session_id: session.id,
                user_id,
                question_id: question.id(),
                selected_answers,
                is_correct,
                time_spent_seconds: submission.time_spent_seconds,
                confidence,
                flagged: submission.flagged,
                answered_at: now,
            })
            .await?;

        session.last_activity_at = now;
        self.aggregate(&mut session).await?;

        tracing::debug!(
            session_id = %session.id,
            question_id = %question.id(),
            is_correct,
            answered = session.questions_answered,
            "answer recorded"
        );
        Ok(AnswerOutcome {
            answer,
            is_correct,
            correct_answers: question.correct_answers().to_vec(),
            explanation: question.explanation().map(str::to_string),
            session,
        })
    }

    /// Questions to serve next in a session.
    ///
    /// Review sessions walk the most-attempted questions first and ignore the recency
    /// window; other modes draw at random. Questions already answered in this session
    /// are always skipped. `limit` defaults to the questions still left to reach the
    /// session's target.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` for finished sessions.
    pub async fn next_questions(
        &self,
        user_id: UserId,
        session_id: SessionId,
        limit: Option<u32>,
    ) -> Result<Vec<Question>, SessionError> {
        let session = self.get(user_id, session_id).await?;
        if !session.is_open() {
            return Err(SessionError::Completed);
        }

        let answered: Vec<_> = self
            .answers
            .session_answers(session.id)
            .await?
            .into_iter()
            .map(|a| a.question_id)
            .collect();
        let remaining = session
            .question_count
            .saturating_sub(session.questions_answered)
            .max(1);
        let limit = limit.unwrap_or(remaining).min(MAX_LIMIT);

        let mut query = StudyQuestionQuery::new(session.exam_id).with_limit(limit);
        if session.mode == SessionMode::Review {
            query = query
                .with_order(SelectionOrder::WeakAreas)
                .with_exclude_recent_hours(0);
        }

        Ok(self
            .study
            .study_questions_excluding(user_id, &query, answered)
            .await?)
    }

    /// Finish a session: final aggregation, status change and progress refresh.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is already completed.
    pub async fn complete(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<CompletedSession, SessionError> {
        let mut session = self.get(user_id, session_id).await?;
        if !session.is_open() {
            return Err(SessionError::Completed);
        }

        let stats = self.session_stats(session.id).await?;
        if let Some(stats) = &stats {
            session.apply_stats(stats);
        }
        session.complete(self.clock.now())?;
        self.sessions.update_session(&session).await?;

        let progress = self.progress.refresh(user_id, session.exam_id).await?;
        tracing::info!(
            session_id = %session.id,
            answered = session.questions_answered,
            accuracy = session.accuracy,
            "session completed"
        );
        Ok(CompletedSession {
            session,
            stats,
            progress,
        })
    }

    /// Re-aggregate a session from its answers and persist the counters.
    ///
    /// Leaves the stored session untouched when it has no answers.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn aggregate(
        &self,
        session: &mut StudySession,
    ) -> Result<Option<SessionStats>, SessionError> {
        let Some(stats) = self.session_stats(session.id).await? else {
            return Ok(None);
        };
        session.apply_stats(&stats);
        self.sessions.update_session(session).await?;
        Ok(Some(stats))
    }

    async fn session_stats(&self, session_id: SessionId) -> Result<Option<SessionStats>, SessionError> {
        let answers = self.answers.session_answers(session_id).await?;
        Ok(SessionStats::from_answers(&answers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::{
        Exam, Objective, ObjectiveId, QuestionDraft, QuestionSource, VerifiedIdentity,
    };
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, UserRepository};

    struct Fixture {
        repo: InMemoryRepository,
        service: SessionService,
        questions: Vec<Question>,
        user: UserId,
    }

    async fn fixture() -> Fixture {
        let repo = InMemoryRepository::new();
        repo.upsert_exam(
            &Exam::new(ExamId::new(1), "CompTIA", "SY0-701", "Security+", 83, 90, 90, true)
                .unwrap(),
        )
        .await
        .unwrap();
        repo.upsert_exam(
            &Exam::new(ExamId::new(2), "CompTIA", "220-1101", "A+ Core 1", 75, 90, 90, false)
                .unwrap(),
        )
        .await
        .unwrap();
        for id in [1, 2] {
            repo.upsert_objective(
                &Objective::new(
                    ObjectiveId::new(id),
                    ExamId::new(1),
                    format!("{id}.0"),
                    format!("Objective {id}"),
                    50,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        }

        let mut questions = Vec::new();
        for i in 0..6_u64 {
            let draft = QuestionDraft {
                exam_id: ExamId::new(1),
                objective_id: ObjectiveId::new(i % 2 + 1),
                text: format!("Question {i}"),
                options: vec!["A".into(), "B".into(), "C".into()],
                correct_answers: vec![0],
                explanation: Some(format!("Because {i}")),
                difficulty: 3,
                source: QuestionSource::Manual,
            };
            questions.push(repo.insert_question(&draft.validate().unwrap()).await.unwrap());
        }

        let user = repo
            .upsert_identity(
                &VerifiedIdentity {
                    email: "kim@example.com".into(),
                    name: "Kim".into(),
                    google_id: None,
                },
                fixed_now(),
            )
            .await
            .unwrap()
            .id;

        let clock = fixed_clock();
        let arc = Arc::new(repo.clone());
        let study = StudyService::new(clock, arc.clone(), arc.clone(), arc.clone());
        let progress = ProgressService::new(clock, arc.clone(), arc.clone(), arc.clone());
        let service = SessionService::new(
            clock,
            arc.clone(),
            arc.clone(),
            arc.clone(),
            arc,
            study,
            progress,
        );
        Fixture {
            repo,
            service,
            questions,
            user,
        }
    }

    fn start(mode: SessionMode) -> StartSession {
        StartSession {
            exam_id: ExamId::new(1),
            mode,
            question_count: None,
        }
    }

    fn submit(question: &Question, selected: usize) -> AnswerSubmission {
        AnswerSubmission {
            question_id: question.id(),
            selected_answers: vec![selected],
            time_spent_seconds: 30,
            confidence: Some(3),
            flagged: false,
        }
    }

    #[tokio::test]
    async fn question_count_defaults_by_mode() {
        let f = fixture().await;
        let practice = f.service.create(f.user, start(SessionMode::Practice)).await.unwrap();
        assert_eq!(practice.question_count, 90);
        f.service.complete(f.user, practice.id).await.unwrap();

        let study = f.service.create(f.user, start(SessionMode::Study)).await.unwrap();
        assert_eq!(study.question_count, DEFAULT_LIMIT);
    }

    #[tokio::test]
    async fn second_open_session_and_inactive_exam_are_rejected() {
        let f = fixture().await;
        f.service.create(f.user, start(SessionMode::Study)).await.unwrap();
        let err = f.service.create(f.user, start(SessionMode::Study)).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyOpen));

        let mut inactive = start(SessionMode::Study);
        inactive.exam_id = ExamId::new(2);
        let err = f.service.create(f.user, inactive).await.unwrap_err();
        assert!(matches!(err, SessionError::ExamInactive));

        let mut unknown = start(SessionMode::Study);
        unknown.exam_id = ExamId::new(9);
        let err = f.service.create(f.user, unknown).await.unwrap_err();
        assert!(matches!(err, SessionError::ExamNotFound));
    }

    #[tokio::test]
    async fn sessions_are_private_to_their_owner() {
        let f = fixture().await;
        let session = f.service.create(f.user, start(SessionMode::Study)).await.unwrap();
        let stranger = UserId::new(f.user.value() + 100);
        let err = f.service.get(stranger, session.id).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
    }

    #[tokio::test]
    async fn answers_are_graded_and_aggregated() {
        let f = fixture().await;
        let session = f.service.create(f.user, start(SessionMode::Study)).await.unwrap();

        let first = f
            .service
            .record_answer(f.user, session.id, submit(&f.questions[0], 0))
            .await
            .unwrap();
        assert!(first.is_correct);
        assert_eq!(first.correct_answers, vec![0]);
        assert_eq!(first.explanation.as_deref(), Some("Because 0"));

        let second = f
            .service
            .record_answer(f.user, session.id, submit(&f.questions[1], 2))
            .await
            .unwrap();
        assert!(!second.is_correct);
        assert_eq!(second.session.questions_answered, 2);
        assert_eq!(second.session.correct_answers, 1);
        assert!((second.session.accuracy - 0.5).abs() < 1e-9);

        let stored = f.repo.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.objective_breakdown.len(), 2);
        let stats = f.repo.get_question(f.questions[0].id()).await.unwrap().unwrap().stats();
        assert_eq!((stats.total_attempts, stats.correct_attempts), (1, 1));
    }

    #[tokio::test]
    async fn paused_sessions_do_not_accept_answers() {
        let f = fixture().await;
        let session = f.service.create(f.user, start(SessionMode::Study)).await.unwrap();
        f.service
            .apply(f.user, session.id, SessionAction::Pause)
            .await
            .unwrap();

        let err = f
            .service
            .record_answer(f.user, session.id, submit(&f.questions[0], 0))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotActive(SessionStatus::Paused)));

        let err = f
            .service
            .apply(f.user, session.id, SessionAction::Pause)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::State(_)));

        let resumed = f
            .service
            .apply(f.user, session.id, SessionAction::Resume)
            .await
            .unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn next_questions_skip_those_already_answered() {
        let f = fixture().await;
        let session = f
            .service
            .create(
                f.user,
                StartSession {
                    exam_id: ExamId::new(1),
                    mode: SessionMode::Review,
                    question_count: Some(4),
                },
            )
            .await
            .unwrap();
        f.service
            .record_answer(f.user, session.id, submit(&f.questions[3], 1))
            .await
            .unwrap();

        let next = f.service.next_questions(f.user, session.id, None).await.unwrap();
        assert_eq!(next.len(), 3);
        assert!(next.iter().all(|q| q.id() != f.questions[3].id()));
    }

    #[tokio::test]
    async fn completing_twice_is_a_conflict() {
        let f = fixture().await;
        let session = f.service.create(f.user, start(SessionMode::Study)).await.unwrap();
        f.service
            .record_answer(f.user, session.id, submit(&f.questions[0], 0))
            .await
            .unwrap();

        let done = f.service.complete(f.user, session.id).await.unwrap();
        assert_eq!(done.session.status, SessionStatus::Completed);
        assert_eq!(done.session.completed_at, Some(fixed_now()));
        assert_eq!(done.stats.map(|s| s.total), Some(1));
        assert_eq!(done.progress.total_answers, 1);

        let err = f.service.complete(f.user, session.id).await.unwrap_err();
        assert!(matches!(err, SessionError::Completed));
    }

    #[tokio::test]
    async fn completing_without_answers_keeps_zero_counters() {
        let f = fixture().await;
        let session = f.service.create(f.user, start(SessionMode::Study)).await.unwrap();
        let done = f.service.complete(f.user, session.id).await.unwrap();
        assert!(done.stats.is_none());
        assert_eq!(done.session.questions_answered, 0);
    }
}
