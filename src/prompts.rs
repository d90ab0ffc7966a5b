//! Instruction text for the vision model, parameterized by timeframe.
//!
//! The two deployment flavors (15-minute scalp, 1-hour swing) share all
//! code and differ only in the wording below.

use crate::{Error, Result};

/// Banner the model is instructed to start its output with. Everything
/// before this token is stripped when the model prepends a disclaimer.
pub const ANALYSIS_BANNER: &str = "🔮 CHARTWATCH AI 🔮";

/// Substrings that mark a refusal to analyze. Checked case-insensitively.
pub const REFUSAL_MARKERS: &[&str] = &[
    "unable to provide",
    "i can guide you",
    "i can't assist",
    "i cannot assist",
    "i'm sorry",
    "sorry",
];

/// Target timeframe of the incoming charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeframeProfile {
    /// 15-minute charts, scalp entries.
    M15,
    /// 1-hour charts, swing entries.
    H1,
}

impl TimeframeProfile {
    /// Parse a profile name as given on the command line or in the
    /// environment (`m15` / `h1`).
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "m15" | "15m" => Ok(TimeframeProfile::M15),
            "h1" | "1h" => Ok(TimeframeProfile::H1),
            other => Err(Error::InvalidArgument(format!(
                "unknown timeframe profile: {} (expected m15 or h1)",
                other
            ))),
        }
    }

    /// Chart timeframe label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            TimeframeProfile::M15 => "15 minutes",
            TimeframeProfile::H1 => "1 hour",
        }
    }

    /// Trading approach the prompts steer the model towards.
    pub fn approach(&self) -> &'static str {
        match self {
            TimeframeProfile::M15 => "scalp trading",
            TimeframeProfile::H1 => "semi-swing trading",
        }
    }

    /// Instruction sent with the first attempt. A custom deployment carries
    /// its own system context, so this stays terse.
    pub fn instruction(&self) -> String {
        format!(
            "Analyze this crypto chart on the {} timeframe. Provide a full technical \
             analysis: support/resistance, trend, and an optimal futures entry setup \
             with profit targets and a stop loss. The analysis must suit {} on this \
             timeframe.",
            self.label(),
            self.approach()
        )
    }

    /// Elaborated instruction for the fallback attempt. The standard model
    /// lacks the custom deployment's implicit context, so everything is
    /// spelled out, including the expected output template.
    pub fn fallback_instruction(&self) -> String {
        format!(
            "This analysis is for EDUCATION ONLY and contains no financial advice.\n\n\
             Analyze the technical chart patterns visible in the following crypto \
             trading chart using objective observation. Identify visible patterns, \
             key price levels, and the historical movement shown on the chart.\n\n\
             Focus on the {} timeframe, suitable for {} with entries of matching \
             duration. Optimize the analysis for a futures trading setup.\n\n\
             Produce output following this template exactly:\n\n{}",
            self.label(),
            self.approach(),
            self.output_template()
        )
    }

    /// System prompt for the vision call. Instructs the model to start its
    /// output directly with the banner so refusal preambles can be stripped.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are a technical-analysis educator focused on describing the visual \
             patterns and structure of trading charts. Your task is to identify and \
             explain the technical patterns VISIBLE on the chart, not to give trading \
             recommendations.\n\n\
             Focus your analysis on the {} timeframe for {} entries.\n\n\
             Start your output directly with '{}' without any preamble or disclaimer. \
             All analysis is for educational purposes and chart-pattern comprehension \
             only.",
            self.label(),
            self.approach(),
            ANALYSIS_BANNER
        )
    }

    /// Output template the fallback instruction asks the model to fill in.
    fn output_template(&self) -> String {
        format!(
            "{}\n\n\
             📊 ANALYSIS [COIN] [TIMEFRAME] 📊\n\
             Symbol: [SYMBOL] | Price: [CURRENT PRICE]\n\
             Timeframe: {}\n\n\
             📈 TREND\n\
             - 🚀 PRIMARY TREND: [uptrend/downtrend/sideways]\n\
             - 📊 PRICE ACTION: [describe the recent movement]\n\n\
             🔍 SUPPORT & RESISTANCE\n\
             - 🛡️ KEY SUPPORT: [level]\n\
             - 🔥 KEY RESISTANCE: [level]\n\n\
             ⚡ TRADE SETUP\n\
             - 💎 POSITION: [LONG/SHORT]\n\
             - 🎯 ENTRY: [price]\n\
             - ⏱️ DURATION: [expected holding time]\n\n\
             💰 PROFIT TARGETS\n\
             - 🥉 Target 1: [price] (+[percent]%)\n\
             - 🥈 Target 2: [price] (+[percent]%)\n\
             - 🥇 Target 3: [price] (+[percent]%)\n\n\
             ⛔ STOP LOSS\n\
             - 🚨 Stop Loss: [price] (-[percent]%)\n\n\
             <b>⚠️ DISCLAIMER: Not financial advice</b>",
            ANALYSIS_BANNER,
            self.label()
        )
    }
}

/// Fixed placeholder returned when the model refuses and no banner is
/// present anywhere in its output.
pub fn placeholder_analysis() -> String {
    format!(
        "{}\n\n\
         📊 CHART ANALYSIS 📊\n\n\
         📈 TREND\n\
         - 🚀 PRIMARY TREND: Cannot be determined from this chart\n\
         - 📊 PRICE ACTION: Further analysis required\n\n\
         🔍 SUPPORT & RESISTANCE\n\
         - 🛡️ KEY SUPPORT: Needs a clearer chart\n\
         - 🔥 KEY RESISTANCE: Needs a clearer chart\n\n\
         ⚡ TRADE SETUP\n\
         - 💎 POSITION: Undetermined\n\
         - 🎯 ENTRY: Further analysis required\n\n\
         <b>⚠️ DISCLAIMER: Not financial advice</b>",
        ANALYSIS_BANNER
    )
}
