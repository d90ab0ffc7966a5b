//! Integration tests for the chartwatch library
//!
//! These tests verify the public API and module interactions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chartwatch::config::{parse_admin_ids, parse_bool, parse_style, STANDARD_MODEL};
use chartwatch::prompts::{placeholder_analysis, ANALYSIS_BANNER};
use chartwatch::router::{clean_analysis, is_custom_model};
use chartwatch::{
    AnalysisRequest, Error, ModelInvocationResult, ModelRouter, ResponseFormatter, Style,
    TimeframeProfile, UserStore, VisionApi,
};
use chartwatch::access::AccessPolicy;

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_parse_helpers() {
    assert!(parse_bool("true"));
    assert!(!parse_bool("off"));
    assert_eq!(parse_admin_ids("1, 2,x,3"), vec![1, 2, 3]);
    assert_eq!(parse_style("simple"), Style::Simple);
    assert_eq!(parse_style("anything"), Style::Detailed);
}

#[test]
fn test_profile_parsing_and_prompts() {
    let profile = TimeframeProfile::parse("h1").expect("profile");
    assert_eq!(profile, TimeframeProfile::H1);
    assert!(profile.instruction().contains("1 hour"));
    assert!(profile.fallback_instruction().contains(ANALYSIS_BANNER));
    assert!(TimeframeProfile::parse("weekly").is_err());
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_error_variants_display() {
    let errors = vec![
        Error::Credential("bad key".into()),
        Error::OpenAi("rate limit".into()),
        Error::Telegram("api error".into()),
        Error::Serialization("json error".into()),
        Error::Store("write failed".into()),
        Error::InvalidArgument("bad arg".into()),
    ];

    for err in errors {
        assert!(!err.to_string().is_empty(), "Error message should not be empty");
    }
}

// ============================================================================
// Router Tests
// ============================================================================

/// Vision stub: the custom model always fails, the standard model succeeds.
#[derive(Clone, Default)]
struct FlakyCustom {
    custom_calls: Arc<AtomicUsize>,
    standard_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl VisionApi for FlakyCustom {
    async fn analyze_chart(
        &self,
        model: &str,
        _system: Option<&str>,
        _instruction: &str,
        _image_base64: &str,
        _max_tokens: u32,
    ) -> chartwatch::Result<String> {
        if is_custom_model(model) {
            self.custom_calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::OpenAi("custom deployment offline".to_string()))
        } else {
            self.standard_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}\n\nTrend: bullish", ANALYSIS_BANNER))
        }
    }

    async fn connectivity_check(&self, _model: &str) -> chartwatch::Result<String> {
        Ok("pong".to_string())
    }
}

fn chart_request(allow_fallback: bool) -> AnalysisRequest {
    AnalysisRequest {
        image_data: vec![1, 2, 3],
        instruction: TimeframeProfile::M15.instruction(),
        preferred_model: "g-chartwatch".to_string(),
        allow_fallback,
    }
}

#[tokio::test]
async fn test_router_falls_back_once_through_public_api() {
    let api = FlakyCustom::default();

    let router = ModelRouter::new(api.clone(), TimeframeProfile::M15, 1000);
    let result = router.route(&chart_request(true)).await.expect("route");

    assert!(result.succeeded);
    assert_eq!(result.model_used, STANDARD_MODEL);
    assert_eq!(api.custom_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.standard_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_router_honors_disabled_fallback_through_public_api() {
    let api = FlakyCustom::default();

    let router = ModelRouter::new(api.clone(), TimeframeProfile::M15, 1000);
    let err = router.route(&chart_request(false)).await.unwrap_err();

    assert!(err.to_string().contains("custom deployment offline"));
    assert_eq!(api.standard_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invocation_result_invariant() {
    let failed = ModelInvocationResult::failure("gpt-4o", "".to_string());
    assert!(!failed.succeeded);
    assert!(failed.raw_text.is_empty());
    assert!(failed.error_detail.is_some());

    let ok = ModelInvocationResult::success("gpt-4o", "text".to_string());
    assert!(ok.succeeded);
    assert!(ok.error_detail.is_none());
}

// ============================================================================
// Refusal Remediation Tests
// ============================================================================

#[test]
fn test_refusal_with_banner_truncates() {
    let raw = format!("I'm sorry, I cannot help.\n\n{}\n\nTrend: up", ANALYSIS_BANNER);
    let cleaned = clean_analysis(&raw);
    assert!(cleaned.starts_with(ANALYSIS_BANNER));
    assert!(!cleaned.to_lowercase().contains("i'm sorry"));
}

#[test]
fn test_refusal_without_banner_yields_placeholder() {
    let cleaned = clean_analysis("I'm sorry, I can't assist with that request.");
    assert_eq!(cleaned, placeholder_analysis());
}

// ============================================================================
// Formatter Tests
// ============================================================================

#[test]
fn test_simple_format_never_empty() {
    let fmt = ResponseFormatter::new("ChartWatch AI");
    for input in ["", "x", "Trend: bullish", "random words only"] {
        let out = fmt.format(input, Style::Simple);
        assert!(!out.is_empty());
    }
}

#[test]
fn test_simple_format_trend_polarity() {
    let fmt = ResponseFormatter::new("ChartWatch AI");
    assert!(fmt.format("Trend: bullish", Style::Simple).contains("📈"));
    assert!(fmt.format("Trend: bearish", Style::Simple).contains("📉"));
    assert!(fmt.format("Trend: flat range", Style::Simple).contains("↔️"));
}

#[test]
fn test_format_footer_idempotent() {
    let fmt = ResponseFormatter::new("ChartWatch AI");
    let raw = "Symbol: BTC/USDT\nTimeframe: 15 minutes\n\nTrend: bullish";

    for style in [Style::Simple, Style::Detailed] {
        let once = fmt.format(raw, style);
        let twice = fmt.format(&once, style);
        assert_eq!(twice.matches("💡").count(), 1, "footer duplicated for {:?}", style);
    }
}

// ============================================================================
// User Store Tests
// ============================================================================

#[test]
fn test_user_store_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("users.json");

    {
        let mut store = UserStore::load(&path);
        assert!(store.add_admin(100));
        assert!(store.add_allowed_user(200));
        assert!(store.is_admin(100));
        assert!(store.is_allowed(100));
        assert!(store.is_allowed(200));
        assert!(!store.is_admin(200));
        assert!(!store.is_allowed(300));
    }

    let reloaded = UserStore::load(&path);
    assert!(reloaded.is_admin(100));
    assert!(reloaded.is_allowed(200));
}
