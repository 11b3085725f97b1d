// src/models/class.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'classes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub teacher_id: i64,
    pub name: String,
    /// 6-character join code handed out to students.
    pub code: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Class row enriched with its roster size for the teacher's class list.
#[derive(Debug, Serialize, FromRow)]
pub struct ClassWithCount {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub student_count: i64,
}

/// A row of the per-class student roster.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RosterEntry {
    pub class_id: i64,
    pub student_id: i64,
    pub name: String,
    pub email: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// Per-student mirror of class membership ("my classes").
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: i64,
    pub class_id: i64,
    pub class_name: String,
    pub code: String,
    pub teacher_id: i64,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a class.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// DTO for joining a class with a code.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinClassRequest {
    #[validate(length(min = 6, max = 12))]
    pub code: String,
}

/// DTO for assigning a quiz to a class.
#[derive(Debug, Deserialize)]
pub struct AssignQuizRequest {
    #[serde(alias = "quizId")]
    pub quiz_id: i64,
}
