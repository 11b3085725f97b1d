// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Default base URL of the AI generation endpoint. The API key is appended
/// directly, matching the generateContent query-string convention.
pub const DEFAULT_AI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-05-20:generateContent?key=";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub ai_api_url: String,
    pub ai_api_key: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let ai_api_url = env::var("AI_API_URL").unwrap_or_else(|_| DEFAULT_AI_API_URL.to_string());

        let ai_api_key = env::var("AI_API_KEY").unwrap_or_default();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            ai_api_url,
            ai_api_key,
        }
    }
}
