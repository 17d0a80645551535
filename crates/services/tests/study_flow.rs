use prep_core::model::{AnswerSubmission, ExamId, SessionMode, SessionStatus, VerifiedIdentity};
use prep_core::selection::StudyQuestionQuery;
use prep_core::time::fixed_now;
use services::{AppServices, Clock, ServiceSettings, SessionError, StartSession};
use storage::Storage;
use storage::seed::seed_demo;

async fn services() -> AppServices {
    let storage = Storage::in_memory();
    seed_demo(&storage).await.unwrap();
    AppServices::new(&storage, Clock::fixed(fixed_now()), ServiceSettings::new("flow-secret"))
}

#[tokio::test]
async fn sign_in_study_and_complete_a_session() {
    let app = services().await;
    let login = app
        .auth()
        .login(VerifiedIdentity {
            email: "river@example.com".into(),
            name: "River".into(),
            google_id: None,
        })
        .await
        .unwrap();
    let user = app.auth().authenticate(Some(&login.token)).await.unwrap();

    let sessions = app.sessions();
    let session = sessions
        .create(
            user.id,
            StartSession {
                exam_id: ExamId::new(1),
                mode: SessionMode::Study,
                question_count: Some(3),
            },
        )
        .await
        .unwrap();

    let questions = sessions.next_questions(user.id, session.id, None).await.unwrap();
    assert_eq!(questions.len(), 3);
    for question in &questions {
        let outcome = sessions
            .record_answer(
                user.id,
                session.id,
                AnswerSubmission {
                    question_id: question.id(),
                    selected_answers: question.correct_answers().to_vec(),
                    time_spent_seconds: 40,
                    confidence: None,
                    flagged: false,
                },
            )
            .await
            .unwrap();
        assert!(outcome.is_correct);
    }

    let done = sessions.complete(user.id, session.id).await.unwrap();
    assert_eq!(done.session.status, SessionStatus::Completed);
    assert_eq!(done.session.questions_answered, 3);
    assert!((done.session.accuracy - 1.0).abs() < 1e-9);
    assert!(matches!(
        sessions.next_questions(user.id, session.id, None).await,
        Err(SessionError::Completed)
    ));

    // Answered questions fall inside the 24h window for plain study queries.
    let fresh = app
        .study()
        .study_questions(user.id, &StudyQuestionQuery::new(ExamId::new(1)).with_limit(100))
        .await
        .unwrap();
    assert!(fresh.iter().all(|q| questions.iter().all(|a| a.id() != q.id())));

    let stats = app.dashboard().stats(user.id).await.unwrap();
    assert_eq!((stats.total_sessions, stats.completed_sessions), (1, 1));
    assert_eq!((stats.total_answers, stats.correct_answers), (3, 3));
    assert_eq!(stats.total_study_time_seconds, 120);
    assert_eq!(stats.current_streak_days, 1);
    assert_eq!(stats.exams.len(), 1);
    assert_eq!(stats.exams[0].exam_code, "SY0-701");
    assert_eq!(stats.recent_sessions.len(), 1);
}

#[tokio::test]
async fn generation_is_unavailable_without_a_key() {
    let app = services().await;
    assert!(!app.generation().enabled());
    app.health().ping().await.unwrap();
}
