use chrono::Duration;
use prep_core::model::{
    Exam, ExamId, NewAnswer, Objective, ObjectiveId, Question, QuestionDraft, QuestionSource,
    SessionMode, SessionStats, SessionStatus, User, UserProgress, VerifiedIdentity,
};
use prep_core::selection::{DifficultyRange, SelectionOrder, StudyQuestionQuery};
use prep_core::time::fixed_now;
use storage::repository::{
    AnswerRepository, AuthTokenRepository, ExamRepository, HealthCheck, NewSession,
    ProgressRepository, QuestionRepository, SessionRepository, StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

/// Exam 1 with two objectives and 20 active questions, 10 of them at difficulty >= 3.
async fn seed_exam(repo: &SqliteRepository) -> Vec<Question> {
    let exam = Exam::new(ExamId::new(1), "CompTIA", "SY0-701", "Security+", 83, 90, 90, true)
        .unwrap();
    repo.upsert_exam(&exam).await.unwrap();
    for (id, weight) in [(1, 60), (2, 40)] {
        let objective = Objective::new(
            ObjectiveId::new(id),
            ExamId::new(1),
            format!("{id}.0"),
            format!("Objective {id}"),
            weight,
        )
        .unwrap();
        repo.upsert_objective(&objective).await.unwrap();
    }

    let mut out = Vec::new();
    for i in 0..20_u8 {
        let draft = QuestionDraft {
            exam_id: ExamId::new(1),
            objective_id: ObjectiveId::new(u64::from(i % 2) + 1),
            text: format!("Question {i}"),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answers: vec![0],
            explanation: None,
            difficulty: if i < 10 { 1 + i % 2 } else { 3 + i % 3 },
            source: QuestionSource::Manual,
        };
        out.push(repo.insert_question(&draft.validate().unwrap()).await.unwrap());
    }
    out
}

async fn seed_user(repo: &SqliteRepository) -> User {
    repo.upsert_identity(
        &VerifiedIdentity {
            email: "ada@example.com".into(),
            name: "Ada".into(),
            google_id: Some("g-1".into()),
        },
        fixed_now(),
    )
    .await
    .unwrap()
}

fn answer(
    session: prep_core::model::SessionId,
    user: &User,
    question: &Question,
    is_correct: bool,
    secs: u32,
) -> NewAnswer {
    NewAnswer {
        session_id: session,
        user_id: user.id,
        question_id: question.id(),
        selected_answers: vec![if is_correct { 0 } else { 1 }],
        is_correct,
        time_spent_seconds: secs,
        confidence: None,
        flagged: false,
        answered_at: fixed_now(),
    }
}

#[tokio::test]
async fn difficulty_range_and_limit_are_honoured() {
    let repo = connect("memdb_selection").await;
    seed_exam(&repo).await;

    let query = StudyQuestionQuery::new(ExamId::new(1))
        .with_difficulty(DifficultyRange::new(3, 5).unwrap())
        .with_limit(10);
    let questions = repo.study_questions(&query, &[]).await.unwrap();

    assert_eq!(questions.len(), 10);
    assert!(questions.iter().all(|q| q.difficulty().value() >= 3));
}

#[tokio::test]
async fn selection_never_exceeds_limit_and_respects_filters() {
    let repo = connect("memdb_selection_limits").await;
    let questions = seed_exam(&repo).await;
    let excluded = [questions[0].id(), questions[2].id()];

    for limit in [1, 5, 20, 100] {
        let query = StudyQuestionQuery::new(ExamId::new(1))
            .with_objectives(vec![ObjectiveId::new(1)])
            .with_limit(limit);
        let rows = repo.study_questions(&query, &excluded).await.unwrap();
        assert!(rows.len() <= limit as usize);
        assert!(rows.iter().all(|q| q.objective_id() == ObjectiveId::new(1)));
        assert!(rows.iter().all(|q| !excluded.contains(&q.id())));
    }

    let empty = StudyQuestionQuery::new(ExamId::new(99));
    assert!(repo.study_questions(&empty, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn speed_drill_and_weak_areas_are_deterministic() {
    let repo = connect("memdb_orders").await;
    let questions = seed_exam(&repo).await;
    let user = seed_user(&repo).await;
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
    repo.record_answer(answer(session.id, &user, &questions[7], true, 10))
        .await
        .unwrap();
    repo.record_answer(answer(session.id, &user, &questions[7], false, 10))
        .await
        .unwrap();

    let drill = repo
        .study_questions(
            &StudyQuestionQuery::new(ExamId::new(1))
                .with_order(SelectionOrder::SpeedDrill)
                .with_limit(100),
            &[],
        )
        .await
        .unwrap();
    assert!(drill.windows(2).all(|w| {
        w[0].difficulty() < w[1].difficulty()
            || (w[0].difficulty() == w[1].difficulty() && w[0].id() < w[1].id())
    }));

    let weak = repo
        .study_questions(
            &StudyQuestionQuery::new(ExamId::new(1))
                .with_order(SelectionOrder::WeakAreas)
                .with_limit(3),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(weak[0].id(), questions[7].id());
    assert_eq!(weak.len(), 3);
}

#[tokio::test]
async fn recording_answers_updates_stats_atomically() {
    let repo = connect("memdb_answers").await;
    let questions = seed_exam(&repo).await;
    let user = seed_user(&repo).await;
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
    let q = &questions[0];

    repo.record_answer(answer(session.id, &user, q, true, 30)).await.unwrap();
    let stats = repo.get_question(q.id()).await.unwrap().unwrap().stats();
    assert_eq!((stats.total_attempts, stats.correct_attempts), (1, 1));
    assert!((stats.avg_time_seconds - 30.0).abs() < 1e-9);

    repo.record_answer(answer(session.id, &user, q, false, 60)).await.unwrap();
    let stats = repo.get_question(q.id()).await.unwrap().unwrap().stats();
    assert_eq!((stats.total_attempts, stats.correct_attempts), (2, 1));
    assert!((stats.avg_time_seconds - 45.0).abs() < 1e-9);

    // Missing question: the insert fails and nothing is written.
    let mut missing = answer(session.id, &user, q, true, 5);
    missing.question_id = prep_core::model::QuestionId::new(9_999);
    assert!(matches!(
        repo.record_answer(missing).await,
        Err(StorageError::NotFound)
    ));
    assert_eq!(repo.session_answers(session.id).await.unwrap().len(), 2);

    let recent = repo
        .recent_question_ids(user.id, ExamId::new(1), fixed_now() - Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(recent, vec![q.id()]);
}

#[tokio::test]
async fn session_lifecycle_round_trips() {
    let repo = connect("memdb_sessions").await;
    let questions = seed_exam(&repo).await;
    let user = seed_user(&repo).await;
    let new = NewSession {
        user_id: user.id,
        exam_id: ExamId::new(1),
        mode: SessionMode::Practice,
        question_count: 90,
        started_at: fixed_now(),
    };
    let mut session = repo.create_session(&new).await.unwrap();
    assert!(matches!(
        repo.create_session(&new).await,
        Err(StorageError::Conflict)
    ));

    repo.record_answer(answer(session.id, &user, &questions[0], true, 20))
        .await
        .unwrap();
    repo.record_answer(answer(session.id, &user, &questions[1], false, 40))
        .await
        .unwrap();

    let answers = repo.session_answers(session.id).await.unwrap();
    let stats = SessionStats::from_answers(&answers).unwrap();
    session.apply_stats(&stats);
    session.complete(fixed_now() + Duration::minutes(5)).unwrap();
    repo.update_session(&session).await.unwrap();

    let stored = repo.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.questions_answered, 2);
    assert!((stored.accuracy - 0.5).abs() < 1e-9);
    assert_eq!(stored.objective_breakdown.len(), 2);
    assert!(repo.find_open_session(user.id, ExamId::new(1)).await.unwrap().is_none());

    // Completed sessions no longer block a new one.
    repo.create_session(&new).await.unwrap();
    let counts = repo.count_sessions(user.id).await.unwrap();
    assert_eq!((counts.total, counts.completed), (2, 1));
    assert_eq!(repo.list_sessions(user.id, 5).await.unwrap().len(), 2);
}

#[tokio::test]
async fn progress_and_tokens_persist() {
    let repo = connect("memdb_progress_tokens").await;
    seed_exam(&repo).await;
    let user = seed_user(&repo).await;
    let objectives = repo.list_objectives(ExamId::new(1)).await.unwrap();

    let progress = UserProgress::compute(user.id, ExamId::new(1), &objectives, &[]);
    repo.upsert_progress(&progress, fixed_now()).await.unwrap();
    repo.upsert_progress(&progress, fixed_now()).await.unwrap();
    let listed = repo.list_progress(user.id).await.unwrap();
    assert_eq!(listed, vec![progress]);

    let expires = fixed_now() + Duration::days(30);
    repo.insert_token("digest-1", user.id, fixed_now(), expires)
        .await
        .unwrap();
    assert_eq!(
        repo.find_token_user("digest-1", fixed_now()).await.unwrap(),
        Some(user.id)
    );
    assert_eq!(repo.find_token_user("digest-1", expires).await.unwrap(), None);
    assert!(repo.delete_token("digest-1").await.unwrap());
    assert!(!repo.delete_token("digest-1").await.unwrap());

    repo.ping().await.unwrap();
}

#[tokio::test]
async fn second_login_refreshes_existing_user() {
    let repo = connect("memdb_users").await;
    let first = seed_user(&repo).await;
    let again = repo
        .upsert_identity(
            &VerifiedIdentity {
                email: "ada@example.com".into(),
                name: "Ada Lovelace".into(),
                google_id: None,
            },
            fixed_now() + Duration::days(1),
        )
        .await
        .unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(again.name, "Ada Lovelace");
    assert_eq!(again.google_id.as_deref(), Some("g-1"));
    assert_eq!(again.created_at, first.created_at);
}

#[tokio::test]
async fn question_batches_are_all_or_nothing() {
    let repo = connect("memdb_batch").await;
    seed_exam(&repo).await;
    let draft = |objective: u64, text: &str| {
        QuestionDraft {
            exam_id: ExamId::new(1),
            objective_id: ObjectiveId::new(objective),
            text: text.into(),
            options: vec!["A".into(), "B".into()],
            correct_answers: vec![1],
            explanation: None,
            difficulty: 2,
            source: QuestionSource::Ai,
        }
        .validate()
        .unwrap()
    };
    let all = StudyQuestionQuery::new(ExamId::new(1)).with_limit(100);

    let err = repo
        .insert_questions(&[draft(1, "Kept?"), draft(99, "Unknown objective")])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    let stored = repo.study_questions(&all, &[]).await.unwrap();
    assert_eq!(stored.len(), 20);
    assert!(stored.iter().all(|q| q.text() != "Kept?"));

    let inserted = repo
        .insert_questions(&[draft(1, "First"), draft(2, "Second")])
        .await
        .unwrap();
    assert_eq!(inserted.len(), 2);
    assert_ne!(inserted[0].id(), inserted[1].id());
    assert_eq!(repo.study_questions(&all, &[]).await.unwrap().len(), 22);
}
