//! Model selection and fallback policy for chart analysis.
//!
//! One request = one analysis. The router tries the configured custom GPT
//! deployment first (when one is set), falls back at most once to the
//! standard model, and scrubs refusal preambles from whatever comes back.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{CUSTOM_MODEL_PREFIX, STANDARD_MODEL};
use crate::prompts::{placeholder_analysis, TimeframeProfile, ANALYSIS_BANNER, REFUSAL_MARKERS};
use crate::{Error, Result};

/// Chat-completion capability the router drives. Implemented by
/// [`crate::integrations::OpenAIClient`]; swapped for a counting mock in
/// tests.
#[async_trait]
pub trait VisionApi: Send + Sync {
    /// Send one instruction plus a base64 JPEG to the given model.
    async fn analyze_chart(
        &self,
        model: &str,
        system: Option<&str>,
        instruction: &str,
        image_base64: &str,
        max_tokens: u32,
    ) -> Result<String>;

    /// Minimal text call used to distinguish invalid credentials from an
    /// unavailable model.
    async fn connectivity_check(&self, model: &str) -> Result<String>;
}

/// One incoming chart image. Built per update, discarded after the response.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image_data: Vec<u8>,
    pub instruction: String,
    pub preferred_model: String,
    pub allow_fallback: bool,
}

/// Outcome of a routed analysis.
#[derive(Debug, Clone)]
pub struct ModelInvocationResult {
    pub raw_text: String,
    pub model_used: String,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl ModelInvocationResult {
    pub fn success(model: &str, text: String) -> Self {
        Self {
            raw_text: text,
            model_used: model.to_string(),
            succeeded: true,
            error_detail: None,
        }
    }

    /// A failed result always carries a non-empty detail and no text.
    pub fn failure(model: &str, detail: String) -> Self {
        let detail = if detail.trim().is_empty() {
            "unknown model error".to_string()
        } else {
            detail
        };

        Self {
            raw_text: String::new(),
            model_used: model.to_string(),
            succeeded: false,
            error_detail: Some(detail),
        }
    }
}

/// Whether a model id denotes a custom GPT deployment.
pub fn is_custom_model(model: &str) -> bool {
    model.starts_with(CUSTOM_MODEL_PREFIX)
}

/// Routes analysis requests to the right model with one-shot fallback.
pub struct ModelRouter<A: VisionApi> {
    api: A,
    standard_model: String,
    system_prompt: String,
    fallback_instruction: String,
    max_tokens: u32,
    /// Set after the first successful connectivity check; a failed check is
    /// re-probed on the next request.
    ready: OnceCell<()>,
    analyses: AtomicU64,
}

impl<A: VisionApi> ModelRouter<A> {
    pub fn new(api: A, profile: TimeframeProfile, max_tokens: u32) -> Self {
        Self {
            api,
            standard_model: STANDARD_MODEL.to_string(),
            system_prompt: profile.system_prompt(),
            fallback_instruction: profile.fallback_instruction(),
            max_tokens,
            ready: OnceCell::new(),
            analyses: AtomicU64::new(0),
        }
    }

    /// Analyze one chart image.
    ///
    /// Returns `Err` for pre-flight failures (unreadable image, bad
    /// credentials) and for a pinned custom model that failed with fallback
    /// disabled. Exhausting the fallback is reported in-band as a result
    /// with `succeeded == false`.
    pub async fn route(&self, request: &AnalysisRequest) -> Result<ModelInvocationResult> {
        if request.image_data.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "empty image payload",
            )));
        }

        self.ensure_api_ready().await?;

        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&request.image_data);
        let custom = is_custom_model(&request.preferred_model);
        let first_model = if request.preferred_model.is_empty() {
            self.standard_model.as_str()
        } else {
            request.preferred_model.as_str()
        };

        let sequence = self.analyses.fetch_add(1, Ordering::Relaxed) + 1;
        info!(model = first_model, custom, sequence, "Requesting chart analysis");

        let first = self
            .api
            .analyze_chart(
                first_model,
                Some(&self.system_prompt),
                &request.instruction,
                &image_base64,
                self.max_tokens,
            )
            .await;

        let first_err = match first {
            Ok(text) => {
                return Ok(ModelInvocationResult::success(first_model, clean_analysis(&text)))
            }
            Err(err) => err,
        };

        if custom && !request.allow_fallback {
            warn!(model = first_model, error = %first_err, "Custom model failed, fallback disabled");
            return Err(first_err);
        }

        info!(
            from = first_model,
            to = %self.standard_model,
            error = %first_err,
            "Falling back to standard model"
        );

        match self
            .api
            .analyze_chart(
                &self.standard_model,
                Some(&self.system_prompt),
                &self.fallback_instruction,
                &image_base64,
                self.max_tokens,
            )
            .await
        {
            Ok(text) => Ok(ModelInvocationResult::success(
                &self.standard_model,
                clean_analysis(&text),
            )),
            Err(fallback_err) => {
                warn!(model = %self.standard_model, error = %fallback_err, "Fallback attempt failed");
                Ok(ModelInvocationResult::failure(
                    &self.standard_model,
                    fallback_err.to_string(),
                ))
            }
        }
    }

    /// Credential pre-flight, cached for the process lifetime. Concurrent
    /// callers share one probe.
    async fn ensure_api_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                debug!(model = %self.standard_model, "Verifying API credentials");
                self.api
                    .connectivity_check(&self.standard_model)
                    .await
                    .map(|_| ())
                    .map_err(|err| Error::Credential(err.to_string()))
            })
            .await
            .map(|_| ())
    }
}

/// Strip a refusal preamble from model output.
///
/// When a refusal marker is present: text from the banner onward survives
/// if the banner exists, otherwise the fixed placeholder template is
/// returned. Clean text passes through untouched.
pub fn clean_analysis(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let refused = REFUSAL_MARKERS.iter().any(|marker| lowered.contains(marker));
    if !refused {
        return raw.to_string();
    }

    match raw.find(ANALYSIS_BANNER) {
        Some(idx) => raw[idx..].to_string(),
        None => placeholder_analysis(),
    }
}

/// Read a chart image from disk. Missing and empty files are IO errors,
/// reported before any network attempt is made.
pub async fn load_chart_image(path: &Path) -> Result<Vec<u8>> {
    let data = tokio::fs::read(path).await?;
    if data.is_empty() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("image file is empty: {}", path.display()),
        )));
    }
    Ok(data)
}
