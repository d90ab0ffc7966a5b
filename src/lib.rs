//! ChartWatch — Telegram chart analysis bot
//!
//! This library provides:
//! - An OpenAI vision client and a model router with custom-deployment
//!   fallback and refusal scrubbing
//! - A Telegram HTML reformatter for raw model analyses
//! - A JSON-backed allow-list with admin/allowed partitions
//! - The teloxide dispatch layer and Prometheus metrics around them

pub mod access;
pub mod bot;
pub mod config;
pub mod error;
pub mod formatter;
pub mod integrations;
pub mod metrics;
pub mod prompts;
pub mod router;

// Re-export common types
pub use access::{AccessPolicy, UserStore};
pub use config::Config;
pub use error::{Error, Result};
pub use formatter::{ResponseFormatter, Style};
pub use integrations::OpenAIClient;
pub use prompts::TimeframeProfile;
pub use router::{AnalysisRequest, ModelInvocationResult, ModelRouter, VisionApi};
