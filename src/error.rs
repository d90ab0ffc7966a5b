//! Error types for the chart analysis bot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential check failed: {0}")]
    Credential(String),

    #[error("OpenAI API error: {0}")]
    OpenAi(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("User store error: {0}")]
    Store(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<teloxide::RequestError> for Error {
    fn from(err: teloxide::RequestError) -> Self {
        Error::Telegram(err.to_string())
    }
}
