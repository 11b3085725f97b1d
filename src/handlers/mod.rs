pub mod attempts;
pub mod auth;
pub mod classes;
pub mod profile;
pub mod quizzes;
pub mod student;
