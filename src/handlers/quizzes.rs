// src/handlers/quizzes.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    ai::AiClient,
    error::AppError,
    models::{
        attempt::Attempt,
        quiz::{GenerateQuizRequest, Question, Quiz, SaveQuizRequest},
    },
    utils::{html::clean_text, jwt::Claims},
    views,
};

/// Generates a draft quiz through the AI collaborator.
///
/// Nothing is persisted: the teacher reviews and edits the questions before
/// saving them to the question bank.
pub async fn generate_quiz(
    State(ai): State<AiClient>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let has_topic = payload.topic.as_deref().is_some_and(|t| !t.trim().is_empty());
    let has_content = payload
        .content
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if !has_topic && !has_content {
        return Err(AppError::BadRequest(
            "Enter a topic or paste notes to generate a quiz".to_string(),
        ));
    }
    if payload.type_counts.total() == 0 {
        return Err(AppError::BadRequest(
            "Specify at least one question".to_string(),
        ));
    }

    let questions = ai.generate_quiz(&payload).await?;

    Ok(Json(questions))
}

/// Saves an approved quiz to the teacher's question bank with status
/// 'draft'.
pub async fn save_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SaveQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (title, questions) = validate_quiz_payload(payload)?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (teacher_id, title, questions, status)
        VALUES ($1, $2, $3, 'draft')
        RETURNING id, teacher_id, title, questions, status, created_at
        "#,
    )
    .bind(claims.user_id())
    .bind(&title)
    .bind(SqlJson(&questions))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to save quiz: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Explicit edit-and-resave of an owned quiz.
///
/// Attempt answer maps key on question index, so reordering questions after
/// attempts exist corrupts grading review; callers are expected to edit in
/// place.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SaveQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (title, questions) = validate_quiz_payload(payload)?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        UPDATE quizzes
        SET title = $1, questions = $2
        WHERE id = $3 AND teacher_id = $4
        RETURNING id, teacher_id, title, questions, status, created_at
        "#,
    )
    .bind(&title)
    .bind(SqlJson(&questions))
    .bind(id)
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    Ok(Json(quiz))
}

/// Fetch one owned quiz.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, teacher_id, title, questions, status, created_at
        FROM quizzes
        WHERE id = $1 AND teacher_id = $2
        "#,
    )
    .bind(id)
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    Ok(Json(quiz))
}

/// The teacher's question bank, each quiz enriched with attempt count,
/// average score and the matching attempts.
///
/// Recomputed in full on every request from the current quiz and attempt
/// rows.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let summaries = aggregated_quizzes(&pool, claims.user_id()).await?;
    Ok(Json(summaries))
}

/// Dashboard totals over the aggregated quiz list.
pub async fn analytics(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let summaries = aggregated_quizzes(&pool, claims.user_id()).await?;
    Ok(Json(views::teacher_overview(&summaries)))
}

async fn aggregated_quizzes(
    pool: &PgPool,
    teacher_id: i64,
) -> Result<Vec<views::QuizSummary>, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, teacher_id, title, questions, status, created_at
        FROM quizzes
        WHERE teacher_id = $1
        "#,
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch quizzes: {:?}", e);
        AppError::from(e)
    })?;

    let attempts = sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, quiz_id, class_id, student_id, student_name, teacher_id,
               score, total_questions, completed_at, answers, feedback
        FROM attempts
        WHERE teacher_id = $1
        "#,
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attempts: {:?}", e);
        AppError::from(e)
    })?;

    Ok(views::aggregate_attempts(quizzes, &attempts))
}

/// Shared boundary validation for save and update: title and every question
/// must pass, and user-authored text is sanitized before persisting.
fn validate_quiz_payload(payload: SaveQuizRequest) -> Result<(String, Vec<Question>), AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.questions.is_empty() {
        return Err(AppError::BadRequest(
            "A quiz needs at least one question".to_string(),
        ));
    }
    for question in &payload.questions {
        question.validate().map_err(AppError::BadRequest)?;
    }

    let title = clean_text(payload.title.trim());
    let questions = payload
        .questions
        .into_iter()
        .map(sanitize_question)
        .collect();

    Ok((title, questions))
}

fn sanitize_question(question: Question) -> Question {
    match question {
        Question::Mcq {
            question,
            options,
            correct_index,
            correct_answer,
            explanation,
        } => Question::Mcq {
            question: clean_text(&question),
            options: options.iter().map(|o| clean_text(o)).collect(),
            correct_index,
            correct_answer: clean_text(&correct_answer),
            explanation: clean_text(&explanation),
        },
        Question::TrueFalse {
            question,
            correct_answer,
            explanation,
        } => Question::TrueFalse {
            question: clean_text(&question),
            correct_answer: clean_text(&correct_answer),
            explanation: clean_text(&explanation),
        },
        Question::FillIn {
            question,
            correct_answer,
            explanation,
        } => Question::FillIn {
            question: clean_text(&question),
            correct_answer: clean_text(&correct_answer),
            explanation: clean_text(&explanation),
        },
        Question::ShortAnswer {
            question,
            correct_answer,
            explanation,
        } => Question::ShortAnswer {
            question: clean_text(&question),
            correct_answer: clean_text(&correct_answer),
            explanation: clean_text(&explanation),
        },
    }
}
