//! External API clients.

pub mod openai;

pub use openai::OpenAIClient;
