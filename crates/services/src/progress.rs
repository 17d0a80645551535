//! Progress rollups and the dashboard summary.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use prep_core::model::{ExamId, StudySession, UserId, UserProgress};
use storage::repository::{
    AnswerRepository, ExamRepository, ProgressRepository, SessionRepository,
};

use crate::Clock;
use crate::error::DashboardError;

/// Sessions listed on the dashboard.
pub const RECENT_SESSIONS: u32 = 5;

/// How far back answer timestamps are read when computing the streak.
const STREAK_LOOKBACK_DAYS: i64 = 366;

/// Recomputes `UserProgress` from answer history.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    answers: Arc<dyn AnswerRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        answers: Arc<dyn AnswerRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            exams,
            answers,
            progress,
        }
    }

    /// Rebuild and store the rollup for one user and exam.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError` on storage failures.
    pub async fn refresh(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<UserProgress, DashboardError> {
        let objectives = self.exams.list_objectives(exam_id).await?;
        let answers = self.answers.user_exam_answers(user_id, exam_id).await?;
        let progress = UserProgress::compute(user_id, exam_id, &objectives, &answers);
        self.progress
            .upsert_progress(&progress, self.clock.now())
            .await?;
        tracing::info!(
            user_id = %user_id,
            exam_id = %exam_id,
            mastery = progress.mastery_level.as_str(),
            readiness = progress.readiness_score,
            "refreshed progress"
        );
        Ok(progress)
    }
}

/// Progress for one exam, labelled for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamProgress {
    pub exam_id: ExamId,
    pub exam_code: String,
    pub exam_name: String,
    pub passing_score: u32,
    pub progress: UserProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_sessions: u32,
    pub completed_sessions: u32,
    pub total_answers: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub total_study_time_seconds: u64,
    pub current_streak_days: u32,
    pub exams: Vec<ExamProgress>,
    pub recent_sessions: Vec<StudySession>,
}

/// Read-only summary across all of a user's activity.
#[derive(Clone)]
pub struct DashboardService {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    answers: Arc<dyn AnswerRepository>,
    sessions: Arc<dyn SessionRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        answers: Arc<dyn AnswerRepository>,
        sessions: Arc<dyn SessionRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            exams,
            answers,
            sessions,
            progress,
        }
    }

    /// # Errors
    ///
    /// Returns `DashboardError` on storage failures.
    pub async fn stats(&self, user_id: UserId) -> Result<DashboardStats, DashboardError> {
        let now = self.clock.now();
        let counts = self.sessions.count_sessions(user_id).await?;
        let activity = self
            .answers
            .activity(user_id, now - Duration::days(STREAK_LOOKBACK_DAYS))
            .await?;
        let recent_sessions = self.sessions.list_sessions(user_id, RECENT_SESSIONS).await?;

        let mut exams = Vec::new();
        for progress in self.progress.list_progress(user_id).await? {
            // Rollups for deleted exams are dropped from the summary.
            let Some(exam) = self.exams.get_exam(progress.exam_id).await? else {
                continue;
            };
            exams.push(ExamProgress {
                exam_id: exam.id(),
                exam_code: exam.code().to_string(),
                exam_name: exam.name().to_string(),
                passing_score: exam.passing_score(),
                progress,
            });
        }

        let accuracy = if activity.total_answers == 0 {
            0.0
        } else {
            f64::from(activity.correct_answers) / f64::from(activity.total_answers)
        };

        Ok(DashboardStats {
            total_sessions: counts.total,
            completed_sessions: counts.completed,
            total_answers: activity.total_answers,
            correct_answers: activity.correct_answers,
            accuracy,
            total_study_time_seconds: activity.total_time_seconds,
            current_streak_days: current_streak(&activity.recent_answer_times, now),
            exams,
            recent_sessions,
        })
    }
}

/// Consecutive UTC days with at least one answer, ending today or yesterday.
#[must_use]
pub fn current_streak(answer_times: &[DateTime<Utc>], now: DateTime<Utc>) -> u32 {
    let days: BTreeSet<NaiveDate> = answer_times.iter().map(DateTime::date_naive).collect();
    let today = now.date_naive();

    let mut day = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::time::fixed_now;

    fn days_ago(n: i64) -> DateTime<Utc> {
        fixed_now() - Duration::days(n)
    }

    #[test]
    fn streak_counts_back_from_today() {
        let times = [days_ago(0), days_ago(0), days_ago(1), days_ago(2), days_ago(4)];
        assert_eq!(current_streak(&times, fixed_now()), 3);
    }

    #[test]
    fn streak_may_end_yesterday() {
        let times = [days_ago(1), days_ago(2)];
        assert_eq!(current_streak(&times, fixed_now()), 2);
    }

    #[test]
    fn streak_is_broken_by_a_missed_day() {
        assert_eq!(current_streak(&[days_ago(2)], fixed_now()), 0);
        assert_eq!(current_streak(&[], fixed_now()), 0);
    }
}
