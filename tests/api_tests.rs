// tests/api_tests.rs

use eduquiz::{ai::AiClient, config::Config, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// `ai_url` points the AI client at a mock endpoint; tests that never
/// trigger an AI call can pass an unreachable URL.
async fn spawn_app(ai_url: &str) -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        ai_api_url: ai_url.to_string(),
        ai_api_key: "test-key".to_string(),
    };

    let state = AppState {
        pool,
        ai: AiClient::new(ai_url, "test-key"),
        config,
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Spawns a mock generateContent endpoint that always answers with the
/// given text wrapped in the expected response envelope.
async fn spawn_mock_ai(text: &str) -> String {
    use axum::{Json, Router, extract::State, routing::post};

    async fn handle(State(text): State<String>) -> Json<Value> {
        Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    let app = Router::new()
        .route("/generate", post(handle))
        .with_state(text.to_string());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/generate?key=")
}

const NO_AI: &str = "http://127.0.0.1:1/unreachable?key=";

fn unique_name(prefix: &str) -> String {
    // Truncate UUID to keep usernames short
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Registers a user and logs in; returns (token, user_id).
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    role: &str,
) -> (String, i64) {
    let username = unique_name(&role[..1].to_string());
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": username,
            "password": password,
            "role": role,
            "display_name": format!("{username} display"),
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let login: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("Token not found").to_string();
    let user_id = login["user_id"].as_i64().expect("user_id not found");
    (token, user_id)
}

fn sample_questions() -> Value {
    json!([
        {
            "type": "MCQ",
            "question": "Which organelle performs photosynthesis?",
            "options": ["Nucleus", "Mitochondrion", "Chloroplast", "Ribosome"],
            "correctAnswer": "Chloroplast",
            "correctIndex": 2,
            "explanation": "Chloroplasts contain chlorophyll."
        },
        {
            "type": "TrueFalse",
            "question": "Photosynthesis consumes carbon dioxide.",
            "correctAnswer": "True",
            "explanation": "CO2 is fixed into sugar."
        }
    ])
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": unique_name("u"),
            "password": "password123",
            "role": "teacher",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": "yo",
            "password": "password123",
            "role": "student",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_rejects_unknown_role() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": unique_name("u"),
            "password": "password123",
            "role": "principal",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn guest_login_creates_anonymous_student() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/guest", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "student");
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn students_cannot_reach_teacher_routes() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();
    let (student_token, _) = register_and_login(&client, &address, "student").await;

    let response = client
        .get(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // And no token at all is a 401.
    let response = client
        .get(format!("{}/api/quizzes", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn join_with_unknown_code_is_404() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();
    let (student_token, _) = register_and_login(&client, &address, "student").await;

    let response = client
        .post(format!("{}/api/student/join", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({ "code": "ZZZZZ2" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_classroom_flow() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();

    // 1. Teacher signs up, creates a class and a quiz, assigns it.
    let (teacher_token, _) = register_and_login(&client, &address, "teacher").await;

    let class: Value = client
        .post(format!("{}/api/classes", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({ "name": "9th Grade Biology" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let class_id = class["id"].as_i64().unwrap();
    let code = class["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);
    assert!(
        code.bytes()
            .all(|b| b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789".contains(&b)),
        "join code {code} uses an unexpected character"
    );

    let quiz: Value = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({ "title": "Photosynthesis Review", "questions": sample_questions() }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();
    assert_eq!(quiz["status"], "draft");

    let response = client
        .post(format!("{}/api/classes/{}/assignments", address, class_id))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({ "quiz_id": quiz_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // 2. Student joins with a messy but valid code and sees the quiz.
    let (student_token, _) = register_and_login(&client, &address, "student").await;

    let messy_code = format!(" {} ", code.to_lowercase());
    let response = client
        .post(format!("{}/api/student/join", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({ "code": messy_code }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let assigned: Vec<Value> = client
        .get(format!("{}/api/student/assigned", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0]["quiz_id"].as_i64().unwrap(), quiz_id);
    assert_eq!(assigned[0]["question_count"], 2);
    assert_eq!(assigned[0]["attempts"].as_array().unwrap().len(), 0);

    let full_quiz: Value = client
        .get(format!("{}/api/student/assigned/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(full_quiz["questions"].as_array().unwrap().len(), 2);

    // 3. One perfect attempt, one blank-ish attempt.
    let perfect: Value = client
        .post(format!("{}/api/student/attempts", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({
            "quizId": quiz_id, // legacy field name is accepted
            "class_id": class_id,
            "answers": { "0": "2", "1": "True" },
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(perfect["score"].as_f64().unwrap(), 100.0);
    assert_eq!(perfect["correct_count"], 2);

    let failed: Value = client
        .post(format!("{}/api/student/attempts", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({
            "quiz_id": quiz_id,
            "class_id": class_id,
            "answers": { "0": "1" },
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(failed["score"].as_f64().unwrap(), 0.0);

    // 4. Teacher sees the aggregated view.
    let bank: Vec<Value> = client
        .get(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let summary = bank
        .iter()
        .find(|q| q["id"].as_i64() == Some(quiz_id))
        .expect("quiz missing from bank");
    assert_eq!(summary["total_attempts"], 2);
    assert!((summary["avg_score"].as_f64().unwrap() - 50.0).abs() < 1e-9);
    assert_eq!(summary["attempts"].as_array().unwrap().len(), 2);

    let overview: Value = client
        .get(format!("{}/api/quizzes/analytics", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(overview["total_attempts"].as_i64().unwrap() >= 2);

    // 5. Roster shows the student; class list counts them.
    let roster: Vec<Value> = client
        .get(format!("{}/api/classes/{}/students", address, class_id))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(roster.len(), 1);

    // 6. Student progress reflects today's activity.
    let progress: Value = client
        .get(format!("{}/api/student/progress", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progress["streak"], 1);
    assert_eq!(progress["total_attempts"], 2);
}

#[tokio::test]
async fn test_ai_graded_short_answer_flow() {
    // Mock grader awards 80: above the credit threshold.
    let ai_url = spawn_mock_ai(r#"{"score": 80, "rationale": "Mentions the key idea."}"#).await;
    let address = spawn_app(&ai_url).await;
    let client = reqwest::Client::new();

    let (teacher_token, _) = register_and_login(&client, &address, "teacher").await;
    let (student_token, _) = register_and_login(&client, &address, "student").await;

    let class: Value = client
        .post(format!("{}/api/classes", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({ "name": "Essay class" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let class_id = class["id"].as_i64().unwrap();
    let code = class["code"].as_str().unwrap().to_string();

    let quiz: Value = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({
            "title": "Short answer demo",
            "questions": [{
                "type": "ShortAnswer",
                "question": "Explain why leaves are green.",
                "correctAnswer": "Chlorophyll reflects green light.",
                "explanation": "Chlorophyll absorbs red and blue."
            }],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    client
        .post(format!("{}/api/classes/{}/assignments", address, class_id))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({ "quiz_id": quiz_id }))
        .send()
        .await
        .unwrap();

    client
        .post(format!("{}/api/student/join", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({ "code": code }))
        .send()
        .await
        .unwrap();

    let result: Value = client
        .post(format!("{}/api/student/attempts", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({
            "quiz_id": quiz_id,
            "class_id": class_id,
            "answers": { "0": "Because of chlorophyll" },
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(result["score"].as_f64().unwrap(), 100.0);
    assert_eq!(result["feedback"]["0"]["score"], 80);
    assert_eq!(result["feedback"]["0"]["is_ai_graded"], true);
}

#[tokio::test]
async fn test_ai_grading_failure_substitutes_zero() {
    // The AI endpoint is unreachable: the submission must still complete,
    // with a zero-score substitute for the designated short answer.
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();

    let (teacher_token, _) = register_and_login(&client, &address, "teacher").await;
    let (student_token, _) = register_and_login(&client, &address, "student").await;

    let class: Value = client
        .post(format!("{}/api/classes", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({ "name": "Offline grading" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let class_id = class["id"].as_i64().unwrap();
    let code = class["code"].as_str().unwrap().to_string();

    let quiz: Value = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({
            "title": "Resilient submission",
            "questions": [
                {
                    "type": "MCQ",
                    "question": "2 + 2 = ?",
                    "options": ["3", "4", "5"],
                    "correctAnswer": "4",
                    "correctIndex": 1,
                    "explanation": "Basic arithmetic."
                },
                {
                    "type": "ShortAnswer",
                    "question": "Explain addition.",
                    "correctAnswer": "Combining quantities.",
                    "explanation": "Sum of parts."
                }
            ],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    client
        .post(format!("{}/api/classes/{}/assignments", address, class_id))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({ "quiz_id": quiz_id }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/api/student/join", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({ "code": code }))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/student/attempts", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&json!({
            "quiz_id": quiz_id,
            "class_id": class_id,
            "answers": { "0": "1", "1": "combining" },
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    let result: Value = response.json().await.unwrap();
    // MCQ correct, short answer gets the substitute zero: 50%.
    assert_eq!(result["score"].as_f64().unwrap(), 50.0);
    assert_eq!(result["feedback"]["1"]["score"], 0);
    assert_eq!(result["feedback"]["1"]["is_ai_graded"], false);
}

#[tokio::test]
async fn test_quiz_generation_via_mock_ai() {
    let generated = r#"```json
    [
        {
            "type": "MCQ",
            "question": "Which gas do plants absorb?",
            "options": ["Oxygen", "Carbon dioxide", "Nitrogen", "Helium"],
            "correctAnswer": "Carbon dioxide",
            "correctIndex": 1,
            "explanation": "CO2 is fixed during photosynthesis."
        }
    ]
    ```"#;
    let ai_url = spawn_mock_ai(generated).await;
    let address = spawn_app(&ai_url).await;
    let client = reqwest::Client::new();

    let (teacher_token, _) = register_and_login(&client, &address, "teacher").await;

    let response = client
        .post(format!("{}/api/quizzes/generate", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({
            "title": "Photosynthesis basics",
            "topic": "Photosynthesis",
            "difficulty": "Easy",
            "type_counts": { "mcq": 1 },
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let questions: Vec<Value> = response.json().await.unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["type"], "MCQ");
    assert_eq!(questions[0]["correctIndex"], 1);
}

#[tokio::test]
async fn test_generation_requires_topic_or_content() {
    let address = spawn_app(NO_AI).await;
    let client = reqwest::Client::new();
    let (teacher_token, _) = register_and_login(&client, &address, "teacher").await;

    let response = client
        .post(format!("{}/api/quizzes/generate", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&json!({
            "title": "Empty quiz",
            "difficulty": "Easy",
            "type_counts": { "mcq": 2 },
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}
