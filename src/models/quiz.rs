// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// A quiz question, discriminated by kind.
///
/// The wire shape (tag names and camelCase fields) matches what the AI
/// generation endpoint is asked to produce, so the same type is used to
/// validate AI responses, persisted quizzes and incoming edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Question {
    #[serde(rename = "MCQ", rename_all = "camelCase")]
    Mcq {
        question: String,
        options: Vec<String>,
        /// 0-based index of the correct option.
        correct_index: u32,
        /// Text of the correct option, kept for review display.
        correct_answer: String,
        explanation: String,
    },
    #[serde(rename = "TrueFalse", rename_all = "camelCase")]
    TrueFalse {
        question: String,
        /// "True" or "False".
        correct_answer: String,
        explanation: String,
    },
    #[serde(rename = "FillIn", rename_all = "camelCase")]
    FillIn {
        question: String,
        correct_answer: String,
        explanation: String,
    },
    #[serde(rename = "ShortAnswer", rename_all = "camelCase")]
    ShortAnswer {
        question: String,
        correct_answer: String,
        explanation: String,
    },
}

impl Question {
    pub fn text(&self) -> &str {
        match self {
            Question::Mcq { question, .. }
            | Question::TrueFalse { question, .. }
            | Question::FillIn { question, .. }
            | Question::ShortAnswer { question, .. } => question,
        }
    }

    pub fn correct_answer(&self) -> &str {
        match self {
            Question::Mcq { correct_answer, .. }
            | Question::TrueFalse { correct_answer, .. }
            | Question::FillIn { correct_answer, .. }
            | Question::ShortAnswer { correct_answer, .. } => correct_answer,
        }
    }

    pub fn is_short_answer(&self) -> bool {
        matches!(self, Question::ShortAnswer { .. })
    }

    /// Boundary validation for questions arriving from the AI endpoint or
    /// from a save/edit request.
    pub fn validate(&self) -> Result<(), String> {
        if self.text().trim().is_empty() {
            return Err("question text cannot be empty".to_string());
        }
        if self.correct_answer().trim().is_empty() {
            return Err("correct answer cannot be empty".to_string());
        }
        if let Question::Mcq {
            options,
            correct_index,
            ..
        } = self
        {
            if options.len() < 2 {
                return Err("MCQ must have at least 2 options".to_string());
            }
            if *correct_index as usize >= options.len() {
                return Err(format!(
                    "correct index {} out of range for {} options",
                    correct_index,
                    options.len()
                ));
            }
        }
        Ok(())
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub teacher_id: i64,
    pub title: String,

    /// Ordered question array, stored as JSONB. Attempt answer maps key on
    /// the array index, so index positions must not change once attempts
    /// reference this quiz.
    pub questions: Json<Vec<Question>>,

    pub status: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for saving (or resaving) a quiz to the question bank.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub questions: Vec<Question>,
}

/// Per-kind question counts requested from the generator.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TypeCounts {
    #[serde(default)]
    pub mcq: u32,
    #[serde(default)]
    pub true_false: u32,
    #[serde(default)]
    pub fill_in: u32,
    #[serde(default)]
    pub short_answer: u32,
}

impl TypeCounts {
    pub fn total(&self) -> u32 {
        self.mcq + self.true_false + self.fill_in + self.short_answer
    }
}

/// DTO for AI quiz generation.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Topic name, e.g. "Photosynthesis".
    pub topic: Option<String>,
    /// Pasted notes or source content. Takes priority over topic.
    pub content: Option<String>,
    /// "Easy", "Medium" or "Hard".
    pub difficulty: String,
    pub type_counts: TypeCounts,
    /// Align questions to common 9th-grade standards.
    #[serde(default)]
    pub curriculum_aligned: bool,
    /// Optional output language directive, e.g. "Spanish".
    pub language: Option<String>,
}
