// src/handlers/attempts.rs

use std::collections::BTreeMap;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::{PgPool, types::Json as SqlJson};

use crate::{
    ai::AiClient,
    error::AppError,
    grading,
    models::{
        attempt::{AttemptResult, GradingFeedback, SubmitAttemptRequest},
        quiz::Quiz,
    },
    utils::jwt::Claims,
};

/// Grades and persists a quiz attempt.
///
/// The first short-answer question (if any) is graded by one AI call,
/// awaited before the rest of the grading; every other question is graded
/// locally. A failed grading call records a score-0 substitute so the
/// submission always completes.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    State(ai): State<AiClient>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id();

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, teacher_id, title, questions, status, created_at
        FROM quizzes
        WHERE id = $1
        "#,
    )
    .bind(payload.quiz_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let questions = &quiz.questions.0;
    if questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    // One AI grading call for the designated short answer, before the rest
    // of the grading. Failure substitutes a zero score instead of aborting.
    let mut feedback: BTreeMap<u32, GradingFeedback> = BTreeMap::new();
    if let Some(index) = grading::designated_short_answer(questions) {
        let question = &questions[index];
        let submitted = payload
            .answers
            .get(&(index as u32))
            .map(String::as_str)
            .unwrap_or("");

        let entry = match ai
            .grade_short_answer(question.text(), question.correct_answer(), submitted)
            .await
        {
            Ok(grade) => GradingFeedback {
                score: grade.score,
                rationale: grade.rationale,
                is_ai_graded: true,
            },
            Err(e) => {
                tracing::warn!("AI grading failed, substituting score 0: {e}");
                GradingFeedback {
                    score: 0,
                    rationale: "AI grading failed. Score set to 0.".to_string(),
                    is_ai_graded: false,
                }
            }
        };
        feedback.insert(index as u32, entry);
    }

    let correct_count = questions
        .iter()
        .enumerate()
        .filter(|(index, question)| {
            let answer = payload
                .answers
                .get(&(*index as u32))
                .map(String::as_str);
            grading::is_answer_correct(question, answer, feedback.get(&(*index as u32)))
        })
        .count();

    let total_questions = questions.len();
    let score = grading::score_percentage(correct_count, total_questions);

    let student_name = sqlx::query_scalar::<_, String>(
        "SELECT display_name FROM users WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(&pool)
    .await?
    .unwrap_or_else(|| "Anonymous".to_string());

    let attempt_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO attempts
            (quiz_id, class_id, student_id, student_name, teacher_id,
             score, total_questions, answers, feedback)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(quiz.id)
    .bind(payload.class_id)
    .bind(student_id)
    .bind(&student_name)
    .bind(quiz.teacher_id)
    .bind(score)
    .bind(total_questions as i32)
    .bind(SqlJson(&payload.answers))
    .bind(SqlJson(&feedback))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to save quiz attempt: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(AttemptResult {
            attempt_id,
            score,
            total_questions: total_questions as i32,
            correct_count,
            answers: payload.answers,
            feedback,
        }),
    ))
}
