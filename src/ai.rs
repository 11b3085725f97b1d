// src/ai.rs

use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    config::Config,
    error::AppError,
    models::quiz::{GenerateQuizRequest, Question},
};

const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(1000);

/// Result of grading one short answer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AiGrade {
    /// 0-100.
    pub score: i64,
    pub rationale: String,
}

/// Client for the external generateContent endpoint.
///
/// Holds the endpoint URL and API key explicitly instead of reading ambient
/// globals. The retry baseline is injectable so tests can exercise the
/// backoff schedule without waiting real seconds.
#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    retry_base: Duration,
}

impl AiClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            retry_base: DEFAULT_RETRY_BASE,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ai_api_url.clone(), config.ai_api_key.clone())
    }

    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// Generates a quiz: N questions with the caller's per-kind breakdown,
    /// difficulty and optional language directive. The response is parsed
    /// into the typed question union and validated before being returned.
    pub async fn generate_quiz(
        &self,
        request: &GenerateQuizRequest,
    ) -> Result<Vec<Question>, AppError> {
        let (user_query, system_prompt) = build_generation_prompt(request);
        let payload = content_payload(&user_query, &system_prompt, quiz_response_schema());

        let response = self.post_with_backoff(&payload).await?;
        let text = extract_text(&response)?;
        let cleaned = strip_code_fences(text);

        let questions: Vec<Question> = serde_json::from_str(&cleaned).map_err(|e| {
            tracing::error!("Failed to parse generated quiz: {e}");
            AppError::Upstream("Generated quiz data is empty or invalid.".to_string())
        })?;

        if questions.is_empty() {
            return Err(AppError::Upstream(
                "Generated quiz data is empty or invalid.".to_string(),
            ));
        }
        for q in &questions {
            q.validate().map_err(AppError::Upstream)?;
        }

        Ok(questions)
    }

    /// Grades one short answer against the reference answer.
    /// Returns a 0-100 score and a short rationale.
    pub async fn grade_short_answer(
        &self,
        question: &str,
        reference_answer: &str,
        submitted: &str,
    ) -> Result<AiGrade, AppError> {
        let user_query = format!(
            "Grade the following student response for the question: \"{question}\".\n\
             The official correct answer is: \"{reference_answer}\".\n\
             The student's submitted response is: \"{submitted}\".\n\
             Provide a score out of 100 and a brief rationale for the score."
        );
        let system_prompt = "You are a short-answer grading AI. You must compare the student \
                             answer to the provided correct answer and return a JSON object \
                             strictly following the schema.";

        let payload = content_payload(&user_query, system_prompt, grading_response_schema());

        let response = self.post_with_backoff(&payload).await?;
        let text = extract_text(&response)?;
        let cleaned = strip_code_fences(text);

        serde_json::from_str(&cleaned).map_err(|e| {
            tracing::error!("Failed to parse grading response: {e}");
            AppError::Upstream("AI grading response was malformed.".to_string())
        })
    }

    /// POSTs the payload, retrying on HTTP 429 with delay doubling from the
    /// configured baseline (1s, 2s, 4s by default). Any other non-success
    /// status and any transport error fail immediately.
    async fn post_with_backoff(&self, payload: &Value) -> Result<Value, AppError> {
        let url = format!("{}{}", self.api_url, self.api_key);
        let mut retries = 0;

        loop {
            let response = self
                .http
                .post(&url)
                .json(payload)
                .send()
                .await
                .map_err(|e| {
                    tracing::error!("AI request transport error: {e}");
                    AppError::Upstream(
                        "Failed to communicate with the AI model. Please try again.".to_string(),
                    )
                })?;

            let status = response.status();
            if status.is_success() {
                return response.json().await.map_err(|e| {
                    tracing::error!("AI response body was not JSON: {e}");
                    AppError::Upstream("AI returned an empty or invalid response.".to_string())
                });
            }

            if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                let delay = self.retry_base * 2u32.pow(retries);
                tracing::warn!("AI endpoint rate-limited, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                retries += 1;
                continue;
            }

            return Err(AppError::Upstream(format!(
                "AI request failed with status: {status}"
            )));
        }
    }
}

/// Builds the user query and system prompt for quiz generation.
pub fn build_generation_prompt(request: &GenerateQuizRequest) -> (String, String) {
    let counts = &request.type_counts;
    let breakdown: Vec<String> = [
        (counts.mcq, "Multiple Choice (MCQ)"),
        (counts.true_false, "True/False"),
        (counts.fill_in, "Fill-in-the-Blank"),
        (counts.short_answer, "Short Answer"),
    ]
    .iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{n} {label} questions"))
    .collect();

    // Pasted notes take priority over the bare topic.
    let prompt_content = match (&request.content, &request.topic) {
        (Some(content), _) if !content.trim().is_empty() => {
            format!("From the following content: \"{}\"", content.trim())
        }
        (_, Some(topic)) => format!("On the topic of: \"{}\"", topic.trim()),
        _ => String::new(),
    };

    let mut user_query = format!(
        "Generate a quiz with exactly {} questions. The distribution must be: {}. {}. \
         Ensure the difficulty is {}. Provide correct answers and a brief explanation for each.",
        counts.total(),
        breakdown.join(", and "),
        prompt_content,
        request.difficulty,
    );

    let mut system_prompt = format!(
        "You are a professional educational quiz generator. Your goal is to create a quiz that \
         adheres strictly to the user's requirements and the JSON schema. Use varied Bloom's \
         taxonomy levels (knowledge, application, analysis) appropriate for a {} difficulty quiz.",
        request.difficulty,
    );

    if request.curriculum_aligned {
        system_prompt.push_str(
            " Ensure questions are aligned with common 9th-grade educational standards for US curricula.",
        );
    }
    if let Some(language) = &request.language {
        user_query.push_str(&format!(
            " The questions, answers, and explanations must be provided in {language}."
        ));
    }
    system_prompt.push_str(" The response must be a valid JSON array.");

    (user_query, system_prompt)
}

/// Assembles the generateContent request body with a strict response schema.
fn content_payload(user_query: &str, system_prompt: &str, schema: Value) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": user_query }] }],
        "systemInstruction": { "parts": [{ "text": system_prompt }] },
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": schema,
        },
    })
}

/// Output-shape contract for quiz generation: a tagged union over the four
/// question kinds.
fn quiz_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "type": { "type": "STRING", "enum": ["MCQ", "TrueFalse", "FillIn", "ShortAnswer"] },
                "question": { "type": "STRING", "description": "The text of the question." },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Array of 4 options (MCQ only).",
                },
                "correctAnswer": {
                    "type": "STRING",
                    "description": "The text of the correct answer (for T/F, Fill-in, Short Answer), or the text of the correct MCQ option.",
                },
                "correctIndex": {
                    "type": "INTEGER",
                    "description": "0-based index of correct option (MCQ only).",
                },
                "explanation": {
                    "type": "STRING",
                    "description": "A 1-2 sentence explanation for the correct answer.",
                },
            },
            "required": ["type", "question", "correctAnswer", "explanation"],
            "propertyOrdering": ["type", "question", "options", "correctAnswer", "correctIndex", "explanation"],
        },
    })
}

fn grading_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "INTEGER", "description": "Score out of 100 for the short answer." },
            "rationale": {
                "type": "STRING",
                "description": "1-2 sentences explaining the derived score and what was missing or correct.",
            },
        },
        "required": ["score", "rationale"],
    })
}

/// Pulls the generated text out of a generateContent response body.
fn extract_text(response: &Value) -> Result<&str, AppError> {
    response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            AppError::Upstream("AI returned an empty or invalid response.".to_string())
        })
}

/// Strips markdown code-fence wrappers the model sometimes emits around the
/// JSON body.
fn strip_code_fences(text: &str) -> String {
    let re = Regex::new(r"```json\s*|```\s*").expect("static regex");
    re.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::TypeCounts;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Instant;

    fn generation_request() -> GenerateQuizRequest {
        GenerateQuizRequest {
            title: "Biology 1".to_string(),
            topic: Some("Photosynthesis".to_string()),
            content: None,
            difficulty: "Medium".to_string(),
            type_counts: TypeCounts {
                mcq: 3,
                true_false: 1,
                fill_in: 0,
                short_answer: 1,
            },
            curriculum_aligned: true,
            language: Some("Spanish".to_string()),
        }
    }

    #[test]
    fn prompt_carries_breakdown_difficulty_and_language() {
        let (user_query, system_prompt) = build_generation_prompt(&generation_request());

        assert!(user_query.contains("exactly 5 questions"));
        assert!(user_query.contains("3 Multiple Choice (MCQ) questions"));
        assert!(user_query.contains("1 True/False questions"));
        assert!(!user_query.contains("Fill-in-the-Blank"));
        assert!(user_query.contains("On the topic of: \"Photosynthesis\""));
        assert!(user_query.contains("difficulty is Medium"));
        assert!(user_query.contains("provided in Spanish"));
        assert!(system_prompt.contains("9th-grade"));
        assert!(system_prompt.contains("valid JSON array"));
    }

    #[test]
    fn notes_take_priority_over_topic() {
        let mut request = generation_request();
        request.content = Some("The Calvin cycle fixes carbon.".to_string());
        let (user_query, _) = build_generation_prompt(&request);
        assert!(user_query.contains("From the following content"));
        assert!(!user_query.contains("On the topic of"));
    }

    #[test]
    fn code_fences_are_stripped() {
        let fenced = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(strip_code_fences(fenced), "[{\"a\": 1}]");
        assert_eq!(strip_code_fences("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn extract_text_rejects_empty_candidates() {
        let body = json!({ "candidates": [] });
        assert!(extract_text(&body).is_err());

        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] } }]
        });
        assert!(extract_text(&body).is_err());
    }

    /// Wraps text in a generateContent-shaped response body.
    fn gemini_body(text: &str) -> Value {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    /// Spawns a mock AI endpoint that returns 429 `fail_times` times, then
    /// 200 with the given body. Returns the base URL and the hit counter.
    async fn spawn_mock_ai(fail_times: usize, body: Value) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = (hits.clone(), fail_times, body);

        async fn handle(
            State((hits, fail_times, body)): State<(Arc<AtomicUsize>, usize, Value)>,
        ) -> Result<Json<Value>, StatusCode> {
            let n = hits.fetch_add(1, Ordering::SeqCst);
            if n < fail_times {
                return Err(StatusCode::TOO_MANY_REQUESTS);
            }
            Ok(Json(body))
        }

        let app = Router::new()
            .route("/generate", post(handle))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/generate?key="), hits)
    }

    #[tokio::test]
    async fn rate_limited_call_succeeds_after_two_delayed_retries() {
        let body = gemini_body(r#"{"score": 80, "rationale": "Covers the key idea."}"#);
        let (url, hits) = spawn_mock_ai(2, body).await;

        let base = Duration::from_millis(20);
        let client = AiClient::new(url, "test-key").with_retry_base(base);

        let started = Instant::now();
        let grade = client
            .grade_short_answer("Why is the sky blue?", "Rayleigh scattering", "scattering")
            .await
            .expect("call should succeed after retries");

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(grade.score, 80);
        // Backoff schedule is base then 2x base.
        assert!(started.elapsed() >= base * 3);
    }

    #[tokio::test]
    async fn non_rate_limit_failure_is_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        async fn handle(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
            hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        }

        let app = Router::new()
            .route("/generate", post(handle))
            .with_state(counter);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = AiClient::new(format!("http://{addr}/generate?key="), "k")
            .with_retry_base(Duration::from_millis(1));
        let result = client.grade_short_answer("q", "a", "b").await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_grading_json_is_an_upstream_error() {
        let (url, _) = spawn_mock_ai(0, gemini_body("not json at all")).await;
        let client = AiClient::new(url, "k");

        let result = client.grade_short_answer("q", "a", "b").await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn generated_quiz_is_parsed_from_fenced_json() {
        let quiz_json = r#"```json
        [
            {
                "type": "MCQ",
                "question": "Which pigment absorbs light?",
                "options": ["Keratin", "Chlorophyll", "Melanin", "Hemoglobin"],
                "correctAnswer": "Chlorophyll",
                "correctIndex": 1,
                "explanation": "Chlorophyll absorbs red and blue light."
            },
            {
                "type": "TrueFalse",
                "question": "Photosynthesis produces oxygen.",
                "correctAnswer": "True",
                "explanation": "Oxygen is released when water is split."
            }
        ]
        ```"#;
        let (url, _) = spawn_mock_ai(0, gemini_body(quiz_json)).await;
        let client = AiClient::new(url, "k");

        let questions = client
            .generate_quiz(&generation_request())
            .await
            .expect("quiz should parse");

        assert_eq!(questions.len(), 2);
        assert!(matches!(questions[0], Question::Mcq { correct_index: 1, .. }));
    }

    #[tokio::test]
    async fn empty_generated_quiz_is_rejected() {
        let (url, _) = spawn_mock_ai(0, gemini_body("[]")).await;
        let client = AiClient::new(url, "k");

        let result = client.generate_quiz(&generation_request()).await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }
}
