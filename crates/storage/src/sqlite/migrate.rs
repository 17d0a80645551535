use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Version 1: users, exams, objectives, questions, sessions, answers, progress, tokens.
const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            google_id TEXT,
            subscription_tier TEXT NOT NULL DEFAULT 'free'
                CHECK (subscription_tier IN ('free', 'basic', 'pro')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exams (
            id INTEGER PRIMARY KEY,
            vendor TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            passing_score INTEGER NOT NULL CHECK (passing_score BETWEEN 1 AND 100),
            time_limit_minutes INTEGER NOT NULL CHECK (time_limit_minutes > 0),
            question_count INTEGER NOT NULL CHECK (question_count > 0),
            is_active INTEGER NOT NULL DEFAULT 1
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS objectives (
            id INTEGER PRIMARY KEY,
            exam_id INTEGER NOT NULL,
            code TEXT NOT NULL,
            title TEXT NOT NULL,
            weight INTEGER NOT NULL CHECK (weight > 0),
            FOREIGN KEY (exam_id) REFERENCES exams(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            exam_id INTEGER NOT NULL,
            objective_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            options TEXT NOT NULL,
            correct_answers TEXT NOT NULL,
            question_type TEXT NOT NULL CHECK (question_type IN ('single', 'multiple')),
            explanation TEXT,
            difficulty INTEGER NOT NULL CHECK (difficulty BETWEEN 1 AND 5),
            source TEXT NOT NULL DEFAULT 'manual' CHECK (source IN ('manual', 'ai')),
            is_active INTEGER NOT NULL DEFAULT 1,
            total_attempts INTEGER NOT NULL DEFAULT 0 CHECK (total_attempts >= 0),
            correct_attempts INTEGER NOT NULL DEFAULT 0 CHECK (correct_attempts >= 0),
            avg_time_seconds REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (exam_id) REFERENCES exams(id) ON DELETE CASCADE,
            FOREIGN KEY (objective_id) REFERENCES objectives(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS study_sessions (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            exam_id INTEGER NOT NULL,
            mode TEXT NOT NULL CHECK (mode IN ('study', 'practice', 'review')),
            status TEXT NOT NULL CHECK (status IN ('active', 'paused', 'completed')),
            question_count INTEGER NOT NULL CHECK (question_count >= 0),
            questions_answered INTEGER NOT NULL DEFAULT 0,
            correct_answers INTEGER NOT NULL DEFAULT 0,
            accuracy REAL NOT NULL DEFAULT 0,
            avg_time_seconds REAL NOT NULL DEFAULT 0,
            objective_breakdown TEXT NOT NULL DEFAULT '{}',
            started_at TEXT NOT NULL,
            last_activity_at TEXT NOT NULL,
            completed_at TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (exam_id) REFERENCES exams(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_answers (
            id INTEGER PRIMARY KEY,
            session_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            selected_answers TEXT NOT NULL,
            is_correct INTEGER NOT NULL,
            time_spent_seconds INTEGER NOT NULL CHECK (time_spent_seconds >= 0),
            confidence INTEGER CHECK (confidence BETWEEN 1 AND 5),
            flagged INTEGER NOT NULL DEFAULT 0,
            answered_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES study_sessions(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_progress (
            user_id INTEGER NOT NULL,
            exam_id INTEGER NOT NULL,
            questions_seen INTEGER NOT NULL,
            total_answers INTEGER NOT NULL,
            correct_answers INTEGER NOT NULL,
            accuracy REAL NOT NULL,
            mastery_level TEXT NOT NULL,
            readiness_score REAL NOT NULL,
            objective_accuracy TEXT NOT NULL DEFAULT '{}',
            last_studied_at TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, exam_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (exam_id) REFERENCES exams(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS auth_tokens (
            token_digest TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_exam_active_difficulty
            ON questions (exam_id, is_active, difficulty, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_objective
            ON questions (objective_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_objectives_exam
            ON objectives (exam_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_user_answers_user_answered_at
            ON user_answers (user_id, answered_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_user_answers_session
            ON user_answers (session_id, answered_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_study_sessions_user_started
            ON study_sessions (user_id, started_at);
    ",
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_study_sessions_one_open
            ON study_sessions (user_id, exam_id)
            WHERE status != 'completed';
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_auth_tokens_user
            ON auth_tokens (user_id);
    ",
];

/// Runs a single, consolidated migration for the current schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for &statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
