// src/models/attempt.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// AI grading feedback for a single question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradingFeedback {
    /// 0-100.
    pub score: i64,
    pub rationale: String,
    /// False when the grading call failed and a score-0 substitute was
    /// recorded instead.
    pub is_ai_graded: bool,
}

/// Represents the 'attempts' table: one student's completed run of a quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub class_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub teacher_id: i64,
    /// 0-100.
    pub score: f64,
    pub total_questions: i32,
    pub completed_at: chrono::DateTime<chrono::Utc>,

    /// Question index -> submitted answer text.
    pub answers: Json<BTreeMap<u32, String>>,
    /// Question index -> AI grading feedback, for the subset of questions
    /// that were AI-graded.
    pub feedback: Json<BTreeMap<u32, GradingFeedback>>,
}

/// DTO for submitting a quiz attempt.
///
/// Historical records stored the quiz reference under either `quizId` or
/// `quiz_id`; both are accepted here and normalized to the single canonical
/// `quiz_id` column on write.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(alias = "quizId")]
    pub quiz_id: i64,
    #[serde(alias = "classId")]
    pub class_id: i64,
    /// Question index -> answer text. Missing indices count as unanswered.
    #[serde(default)]
    pub answers: BTreeMap<u32, String>,
}

/// DTO returned to the student right after submission.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub score: f64,
    pub total_questions: i32,
    pub correct_count: usize,
    pub answers: BTreeMap<u32, String>,
    pub feedback: BTreeMap<u32, GradingFeedback>,
}
