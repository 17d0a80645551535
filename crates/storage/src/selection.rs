//! Shared pieces of study-question selection used by every adapter.

use rand::Rng;
use rand::seq::{IteratorRandom, SliceRandom};

use prep_core::model::{Question, QuestionId};
use prep_core::selection::{SelectionOrder, StudyQuestionQuery};

/// Uniformly sample up to `limit` ids from the candidate set.
///
/// Reservoir sampling over the id stream, so the candidate rows never need a
/// database-side random sort. The sample is shuffled because reservoir output keeps
/// partial input order.
pub fn sample_ids<R: Rng + ?Sized>(
    candidates: impl IntoIterator<Item = QuestionId>,
    limit: usize,
    rng: &mut R,
) -> Vec<QuestionId> {
    let mut chosen = candidates.into_iter().choose_multiple(rng, limit);
    chosen.shuffle(rng);
    chosen
}

/// In-process filter equivalent to the SQL `WHERE` clause.
#[must_use]
pub fn matches(question: &Question, query: &StudyQuestionQuery, excluded: &[QuestionId]) -> bool {
    question.exam_id() == query.exam_id
        && question.is_active()
        && query.difficulty.contains(question.difficulty())
        && (query.objective_ids.is_empty() || query.objective_ids.contains(&question.objective_id()))
        && !excluded.contains(&question.id())
}

/// Sort for the deterministic orders; ties break by ascending id.
pub fn sort_for_order(questions: &mut [Question], order: SelectionOrder) {
    match order {
        SelectionOrder::Random => {}
        SelectionOrder::WeakAreas => questions.sort_by(|a, b| {
            b.stats()
                .total_attempts
                .cmp(&a.stats().total_attempts)
                .then(a.id().cmp(&b.id()))
        }),
        SelectionOrder::SpeedDrill => {
            questions.sort_by(|a, b| a.difficulty().cmp(&b.difficulty()).then(a.id().cmp(&b.id())));
        }
    }
}

/// Put fetched rows back into the order of `ids`, dropping ids with no row.
#[must_use]
pub fn reorder_by_ids(mut questions: Vec<Question>, ids: &[QuestionId]) -> Vec<Question> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(pos) = questions.iter().position(|q| q.id() == *id) {
            out.push(questions.swap_remove(pos));
        }
    }
    out
}
