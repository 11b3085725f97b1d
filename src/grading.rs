// src/grading.rs

use crate::models::{attempt::GradingFeedback, quiz::Question};

/// An AI grade above this threshold earns credit for the answer.
pub const AI_CREDIT_THRESHOLD: i64 = 75;

/// Index of the single AI-graded question: the first short-answer question
/// in the quiz. Limiting AI grading to one question per quiz bounds the
/// latency and cost of a submission.
pub fn designated_short_answer(questions: &[Question]) -> Option<usize> {
    questions.iter().position(Question::is_short_answer)
}

/// Decides whether a submitted answer earns credit.
///
/// `ai_feedback` is Some only for the designated short-answer question; in
/// that case the AI score alone decides (a failed grading call records a
/// score of 0 and therefore no credit). A missing or empty answer is always
/// incorrect.
pub fn is_answer_correct(
    question: &Question,
    answer: Option<&str>,
    ai_feedback: Option<&GradingFeedback>,
) -> bool {
    let answer = answer.unwrap_or("");

    match question {
        Question::Mcq { correct_index, .. } => answer == correct_index.to_string(),
        Question::TrueFalse { correct_answer, .. } => answer == correct_answer,
        Question::FillIn { correct_answer, .. } => keyword_match(answer, correct_answer),
        Question::ShortAnswer { correct_answer, .. } => match ai_feedback {
            Some(feedback) => feedback.score > AI_CREDIT_THRESHOLD,
            // Non-designated short answers fall back to a keyword check.
            None => keyword_match(answer, correct_answer),
        },
    }
}

/// Case-insensitive containment of the submitted text in the reference
/// answer.
fn keyword_match(answer: &str, correct_answer: &str) -> bool {
    !answer.is_empty()
        && correct_answer
            .to_lowercase()
            .contains(&answer.to_lowercase())
}

/// Percentage score for `correct` answers out of `total` questions.
pub fn score_percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (correct as f64 / total as f64) * 100.0
}
