use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use prep_core::model::{
    Difficulty, Exam, ExamId, NewQuestion, Objective, ObjectiveId, Question, QuestionDraft,
    QuestionSource, User,
};
use storage::repository::{ExamRepository, QuestionRepository};

use super::client::AiClient;
use super::rate_limit::RateLimiter;
use crate::Clock;
use crate::error::{AiClientError, GenerationError};

/// Most questions a single request may ask for.
pub const MAX_GENERATION_COUNT: u8 = 10;

const SYSTEM_PROMPT: &str = "You write IT certification practice questions. \
Reply with JSON only: an array of objects with the fields \
\"question\" (string), \"options\" (array of 4 strings), \
\"correct_answers\" (array of zero-based option indexes) and \"explanation\" (string).";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationRequest {
    pub exam_id: ExamId,
    pub objective_id: ObjectiveId,
    pub count: u8,
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub questions: Vec<Question>,
    /// Items in the reply that did not validate.
    pub skipped: u32,
}

/// Generates questions for an exam objective through the AI provider.
#[derive(Clone)]
pub struct GenerationService {
    clock: Clock,
    client: AiClient,
    limiter: Arc<RateLimiter>,
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl GenerationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        client: AiClient,
        limiter: Arc<RateLimiter>,
        exams: Arc<dyn ExamRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            clock,
            client,
            limiter,
            exams,
            questions,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.client.enabled()
    }

    /// Generate, validate and store questions for `user`.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` for bad requests, unknown exams/objectives, rate limits,
    /// provider failures and replies that are not JSON.
    pub async fn generate(
        &self,
        user: &User,
        request: GenerationRequest,
    ) -> Result<GenerationReport, GenerationError> {
        if !(1..=MAX_GENERATION_COUNT).contains(&request.count) {
            return Err(GenerationError::InvalidCount {
                count: request.count,
                max: MAX_GENERATION_COUNT,
            });
        }
        let difficulty = Difficulty::new(request.difficulty)?;
        if !self.client.enabled() {
            return Err(GenerationError::Client(AiClientError::Disabled));
        }

        let exam = self
            .exams
            .get_exam(request.exam_id)
            .await?
            .ok_or(GenerationError::ExamNotFound)?;
        let objective = self
            .exams
            .list_objectives(exam.id())
            .await?
            .into_iter()
            .find(|o| o.id() == request.objective_id)
            .ok_or(GenerationError::ObjectiveNotFound)?;

        if let Err(err) = self
            .limiter
            .check(user.id, user.subscription_tier, self.clock.now())
        {
            tracing::warn!(user_id = %user.id, error = %err, "generation rate limited");
            return Err(err.into());
        }

        let prompt = build_prompt(&exam, &objective, request.count, difficulty);
        let reply = self.client.complete(SYSTEM_PROMPT, &prompt).await?;
        let (mut drafts, skipped) =
            drafts_from_reply(&reply, exam.id(), objective.id(), difficulty)?;
        drafts.truncate(usize::from(request.count));
        let questions = self.questions.insert_questions(&drafts).await?;

        tracing::info!(
            user_id = %user.id,
            exam = exam.code(),
            objective = objective.code(),
            requested = request.count,
            stored = questions.len(),
            skipped,
            "generated questions"
        );
        Ok(GenerationReport { questions, skipped })
    }
}

fn build_prompt(exam: &Exam, objective: &Objective, count: u8, difficulty: Difficulty) -> String {
    format!(
        "Write {count} multiple-choice questions for the {vendor} {name} ({code}) exam, \
objective {objective_code} \"{objective_title}\". \
Difficulty {level} on a scale of 1 (recall) to 5 (multi-step scenario). \
Each question has exactly one best answer unless the stem says \"choose two\".",
        vendor = exam.vendor(),
        name = exam.name(),
        code = exam.code(),
        objective_code = objective.code(),
        objective_title = objective.title(),
        level = difficulty.value(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnswerIndexes {
    One(usize),
    Many(Vec<usize>),
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    #[serde(alias = "text")]
    question: String,
    options: Vec<String>,
    #[serde(alias = "correct_answer", alias = "answer")]
    correct_answers: AnswerIndexes,
    #[serde(default)]
    explanation: Option<String>,
}

/// Pull the JSON items out of a model reply.
///
/// Accepts a bare array or an object with a `questions` array, optionally wrapped in
/// a Markdown code fence.
fn parse_items(reply: &str) -> Result<Vec<Value>, GenerationError> {
    let body = strip_code_fence(reply);
    let value: Value =
        serde_json::from_str(body).map_err(|err| GenerationError::Malformed(err.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(GenerationError::Malformed(
                "expected a `questions` array".to_string(),
            )),
        },
        _ => Err(GenerationError::Malformed("expected a JSON array".to_string())),
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn drafts_from_reply(
    reply: &str,
    exam_id: ExamId,
    objective_id: ObjectiveId,
    difficulty: Difficulty,
) -> Result<(Vec<NewQuestion>, u32), GenerationError> {
    let mut drafts = Vec::new();
    let mut skipped = 0_u32;

    for (index, item) in parse_items(reply)?.into_iter().enumerate() {
        let generated: GeneratedQuestion = match serde_json::from_value(item) {
            Ok(generated) => generated,
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping unparseable generated question");
                skipped += 1;
                continue;
            }
        };
        let correct_answers = match generated.correct_answers {
            AnswerIndexes::One(i) => vec![i],
            AnswerIndexes::Many(v) => v,
        };
        let draft = QuestionDraft {
            exam_id,
            objective_id,
            text: generated.question,
            options: generated.options,
            correct_answers,
            explanation: generated.explanation,
            difficulty: difficulty.value(),
            source: QuestionSource::Ai,
        };
        match draft.validate() {
            Ok(question) => drafts.push(question),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping invalid generated question");
                skipped += 1;
            }
        }
    }

    Ok((drafts, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::{SubscriptionTier, UserId};
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    const REPLY: &str = r#"```json
[
  {"question": "Which port does SSH use?", "options": ["21", "22", "23", "25"],
   "correct_answers": [1], "explanation": "SSH listens on TCP 22."},
  {"text": "Pick the symmetric cipher", "options": ["AES", "RSA", "ECC", "DH"],
   "correct_answer": 0},
  {"question": "", "options": ["a", "b"], "correct_answers": [0]},
  {"question": "Out of range", "options": ["a", "b"], "correct_answers": [5]},
  {"prompt": "wrong shape"}
]
```"#;

    fn difficulty() -> Difficulty {
        Difficulty::new(3).unwrap()
    }

    #[test]
    fn fenced_reply_keeps_valid_items_and_counts_the_rest() {
        let (drafts, skipped) =
            drafts_from_reply(REPLY, ExamId::new(1), ObjectiveId::new(2), difficulty()).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(skipped, 3);
        assert_eq!(drafts[0].correct_answers(), &[1]);
        assert_eq!(drafts[1].correct_answers(), &[0]);
        assert!(drafts.iter().all(|d| d.source() == QuestionSource::Ai));
        assert!(drafts.iter().all(|d| d.objective_id() == ObjectiveId::new(2)));
    }

    #[test]
    fn wrapped_object_is_accepted() {
        let reply = r#"{"questions": [{"question": "Q", "options": ["a", "b"], "correct_answers": [0]}]}"#;
        let (drafts, skipped) =
            drafts_from_reply(reply, ExamId::new(1), ObjectiveId::new(1), difficulty()).unwrap();
        assert_eq!((drafts.len(), skipped), (1, 0));
    }

    #[test]
    fn prose_reply_is_malformed() {
        let err = drafts_from_reply(
            "Sure! Here are some questions.",
            ExamId::new(1),
            ObjectiveId::new(1),
            difficulty(),
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[test]
    fn fence_without_language_tag_is_stripped() {
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  [2]  "), "[2]");
    }

    fn user() -> User {
        User {
            id: UserId::new(1),
            email: "a@example.com".into(),
            name: "A".into(),
            google_id: None,
            subscription_tier: SubscriptionTier::Free,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    fn service(client: AiClient) -> GenerationService {
        let repo = Arc::new(InMemoryRepository::new());
        GenerationService::new(
            fixed_clock(),
            client,
            Arc::new(RateLimiter::default()),
            repo.clone(),
            repo,
        )
    }

    #[tokio::test]
    async fn count_is_checked_before_anything_else() {
        let service = service(AiClient::new(None));
        let request = GenerationRequest {
            exam_id: ExamId::new(1),
            objective_id: ObjectiveId::new(1),
            count: 11,
            difficulty: 3,
        };
        let err = service.generate(&user(), request).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidCount { count: 11, max: 10 }));
    }

    #[tokio::test]
    async fn disabled_client_is_reported() {
        let service = service(AiClient::new(None));
        assert!(!service.enabled());
        let request = GenerationRequest {
            exam_id: ExamId::new(1),
            objective_id: ObjectiveId::new(1),
            count: 2,
            difficulty: 3,
        };
        let err = service.generate(&user(), request).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Client(AiClientError::Disabled)
        ));
    }
}
