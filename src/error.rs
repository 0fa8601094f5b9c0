// ============================================
// src/error.rs
// アプリ全体で使うエラー型
// ============================================

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Save data encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Save data decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("HTTP error: {0}")]
    Http(Box<reqwest::Error>),

    /// Open Trivia DB の response_code が 0 以外
    #[error("Question API returned response code {0}")]
    Api(u8),

    #[error("Invalid question payload: {0}")]
    Payload(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No completed quiz session found")]
    NoCompletedSession,
}

impl From<reqwest::Error> for QuizError {
    fn from(error: reqwest::Error) -> Self {
        QuizError::Http(Box::new(error))
    }
}
