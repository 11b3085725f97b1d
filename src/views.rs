// src/views.rs
//
// Derived views over quizzes, attempts and enrollments. Everything here is
// a full recomputation over whatever rows the caller currently holds; there
// is no incremental state, so the functions are safe to call regardless of
// which underlying collection changed last.

use std::collections::HashSet;

use chrono::{Days, FixedOffset, NaiveDate};
use serde::Serialize;
use sqlx::prelude::FromRow;

use crate::models::{
    attempt::Attempt,
    class::Enrollment,
    quiz::Quiz,
};

/// A teacher's quiz enriched with attempt statistics.
#[derive(Debug, Serialize)]
pub struct QuizSummary {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub total_attempts: i64,
    /// Arithmetic mean of matching attempt scores; 0 when there are none.
    pub avg_score: f64,
    pub attempts: Vec<Attempt>,
}

/// Joins attempts onto the teacher's quizzes by quiz id and computes
/// per-quiz attempt counts and average scores. No output ordering is
/// imposed beyond the input quiz order.
pub fn aggregate_attempts(quizzes: Vec<Quiz>, attempts: &[Attempt]) -> Vec<QuizSummary> {
    quizzes
        .into_iter()
        .map(|quiz| {
            let matching: Vec<Attempt> = attempts
                .iter()
                .filter(|a| a.quiz_id == quiz.id)
                .cloned()
                .collect();
            let total_attempts = matching.len() as i64;
            let avg_score = if total_attempts > 0 {
                matching.iter().map(|a| a.score).sum::<f64>() / total_attempts as f64
            } else {
                0.0
            };
            QuizSummary {
                quiz,
                total_attempts,
                avg_score,
                attempts: matching,
            }
        })
        .collect()
}

/// Dashboard totals across the aggregated quiz list.
#[derive(Debug, Serialize)]
pub struct TeacherOverview {
    pub total_quizzes: usize,
    pub total_attempts: i64,
    /// Mean over every attempt, equivalently the attempt-weighted mean of
    /// per-quiz averages.
    pub overall_avg_score: f64,
    /// Title of the quiz with the lowest average, among quizzes that have
    /// at least one attempt.
    pub weakest_quiz: Option<String>,
}

pub fn teacher_overview(summaries: &[QuizSummary]) -> TeacherOverview {
    let total_attempts: i64 = summaries.iter().map(|s| s.total_attempts).sum();
    let overall_avg_score = if total_attempts > 0 {
        summaries
            .iter()
            .map(|s| s.avg_score * s.total_attempts as f64)
            .sum::<f64>()
            / total_attempts as f64
    } else {
        0.0
    };
    let weakest_quiz = summaries
        .iter()
        .filter(|s| s.total_attempts > 0)
        .min_by(|a, b| a.avg_score.total_cmp(&b.avg_score))
        .map(|s| s.quiz.title.clone());

    TeacherOverview {
        total_quizzes: summaries.len(),
        total_attempts,
        overall_avg_score,
        weakest_quiz,
    }
}

/// One quiz assigned to one of the student's classes.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignedQuiz {
    pub quiz_id: i64,
    pub class_id: i64,
    pub class_name: String,
    pub title: String,
    pub question_count: i64,
}

/// An assigned quiz annotated with the student's own attempts.
#[derive(Debug, Serialize)]
pub struct AssignedQuizView {
    #[serde(flatten)]
    pub assigned: AssignedQuiz,
    pub attempts: Vec<Attempt>,
}

/// Merges per-class assignment entries into one list scoped to the classes
/// the student is currently enrolled in, then joins the student's attempts
/// by quiz id. An enrollment that disappears takes exactly its class's
/// entries with it; other classes' entries are untouched.
pub fn resolve_assignments(
    enrollments: &[Enrollment],
    assigned: Vec<AssignedQuiz>,
    attempts: &[Attempt],
) -> Vec<AssignedQuizView> {
    let enrolled: HashSet<i64> = enrollments.iter().map(|e| e.class_id).collect();

    assigned
        .into_iter()
        .filter(|entry| enrolled.contains(&entry.class_id))
        .map(|entry| {
            let matching = attempts
                .iter()
                .filter(|a| a.quiz_id == entry.quiz_id)
                .cloned()
                .collect();
            AssignedQuizView {
                assigned: entry,
                attempts: matching,
            }
        })
        .collect()
}

/// Display-only progress summary for the student dashboard.
#[derive(Debug, Serialize, PartialEq)]
pub struct ProgressSummary {
    /// Consecutive calendar days with at least one attempt, ending today or
    /// yesterday.
    pub streak: u32,
    pub total_attempts: usize,
    /// Score of the chronologically latest attempt (by completion
    /// timestamp), 0 when there are none.
    pub last_score: f64,
}

/// Derives the streak and last-score display values from the student's full
/// attempt list. Calendar days are taken in the given local offset.
pub fn progress_summary(
    attempts: &[Attempt],
    today: NaiveDate,
    offset: FixedOffset,
) -> ProgressSummary {
    let mut dates: Vec<NaiveDate> = attempts
        .iter()
        .map(|a| a.completed_at.with_timezone(&offset).date_naive())
        .collect();
    dates.sort_unstable();
    dates.dedup();

    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);

    let mut streak = 0u32;
    let mut last: Option<NaiveDate> = None;
    for date in dates.iter().rev() {
        match last {
            None => {
                // A streak can only start on today or yesterday.
                if *date == today || *date == yesterday {
                    streak = 1;
                    last = Some(*date);
                }
            }
            Some(prev) => {
                let gap = (prev - *date).num_days();
                if gap == 1 {
                    streak += 1;
                    last = Some(*date);
                } else {
                    break;
                }
            }
        }
    }

    let last_score = attempts
        .iter()
        .max_by_key(|a| a.completed_at)
        .map(|a| a.score)
        .unwrap_or(0.0);

    ProgressSummary {
        streak,
        total_attempts: attempts.len(),
        last_score,
    }
}
