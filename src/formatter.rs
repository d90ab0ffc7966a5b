//! Telegram HTML reformatting of raw model output.
//!
//! Best-effort pattern extraction: recognized fields get bold labels and a
//! glyph, unrecognized ones are left out. Formatting never fails; when
//! nothing can be extracted the input is preserved.

use once_cell::sync::Lazy;
use regex::Regex;

/// Output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Keep the model's paragraphs, upgrade markdown markers to HTML.
    Detailed,
    /// Rebuild a fixed-order section list from extracted fields only.
    Simple,
}

static SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Symbol:[ \t]*(.+?)(?:\n|$)").unwrap());
static TIMEFRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Timeframe:[ \t]*(.+?)(?:\n|$)").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"###\s+([^\n]+)").unwrap());
static TREND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Trend[^:\n]*:[ \t]*(.+?)(?:\n|$)").unwrap());
static SUPPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Support[^:\n]*:[ \t]*(.+?)(?:\n|$|[ \t]*Resistance)").unwrap());
static RESISTANCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Resistance[^:\n]*:[ \t]*(.+?)(?:\n|$)").unwrap());
static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Entry(?: Points?)?[^:\n]*:\s*(.+?)(?:\n\n|$)").unwrap());
static TARGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Target[^:\n]*:[ \t]*(.+?)(?:\n\n|$)").unwrap());
static STOP_LOSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Stop Loss[^:\n]*:[ \t]*(.+?)(?:\n\n|$)").unwrap());
static BUY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(?:Buy|Long)[^:\n]*:?[ \t]*(.+)$").unwrap());
static SELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(?:Sell|Short)[^:\n]*:?[ \t]*(.+)$").unwrap());

/// Reformats model analyses for Telegram.
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    bot_name: String,
}

impl ResponseFormatter {
    pub fn new<S: Into<String>>(bot_name: S) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }

    /// Reformat raw analysis text as Telegram HTML.
    pub fn format(&self, raw: &str, style: Style) -> String {
        match style {
            Style::Detailed => self.format_detailed(raw),
            Style::Simple => self.format_simple(raw),
        }
    }

    fn detailed_footer(&self) -> String {
        format!(
            "<i>💡 Generated by {}. Always apply your own judgement when trading.</i>",
            self.bot_name
        )
    }

    fn simple_footer(&self) -> String {
        format!("<i>💡 Analysis by {}</i>", self.bot_name)
    }

    fn format_detailed(&self, raw: &str) -> String {
        // Formatting an already-formatted text must not stack footers.
        let footer = self.detailed_footer();
        let raw = strip_footer(raw, &footer);

        let symbol = capture(&SYMBOL_RE, &raw).unwrap_or_else(|| "Unknown".to_string());
        let timeframe = capture(&TIMEFRAME_RE, &raw).unwrap_or_else(|| "Unknown".to_string());

        let main = BOLD_RE.replace_all(&raw, "<b>$1</b>");
        let main = HEADING_RE.replace_all(&main, "<b>$1</b>");

        let sections: Vec<String> = main
            .split("\n\n")
            .map(|section| {
                if section.contains("Trend") {
                    section.replace("Trend:", "<b>📈 Trend:</b>")
                } else if section.contains("Entry Points") {
                    section.replace("Entry Points:", "<b>🎯 Entry Points:</b>")
                } else if section.contains("Support and Resistance") {
                    section
                        .replace("Support and Resistance:", "<b>📊 Support and Resistance:</b>")
                        .replace("Support:", "• <b>Support:</b>")
                        .replace("Resistance:", "• <b>Resistance:</b>")
                } else if section.contains("Stop Loss") {
                    section.replace("Stop Loss:", "<b>🛑 Stop Loss:</b>")
                } else if section.contains("Target") {
                    section.replace("Target:", "<b>🏆 Target:</b>")
                } else {
                    section.to_string()
                }
            })
            .collect();

        let header = format!("🔎 <b>ANALYSIS {} ({})</b> 🔍", symbol, timeframe);
        let body = sections.join("\n\n");

        format!("{}\n\n{}\n\n{}", header, body, footer)
    }

    fn format_simple(&self, raw: &str) -> String {
        let footer = self.simple_footer();
        let raw = strip_footer(raw, &footer);

        let symbol = capture(&SYMBOL_RE, &raw).unwrap_or_else(|| "Unknown".to_string());
        let timeframe = capture(&TIMEFRAME_RE, &raw).unwrap_or_else(|| "Unknown".to_string());

        let header = format!("📊 <b>ANALYSIS {} ({})</b>", symbol, timeframe);
        let mut sections = vec![header];

        if let Some(trend) = capture(&TREND_RE, &raw) {
            sections.push(format!("<b>Trend:</b> {} {}", trend_glyph(&trend), trend));
        }

        if let Some(support) = capture(&SUPPORT_RE, &raw) {
            sections.push(format!("<b>Support:</b> 🟢 {}", support));
        }

        if let Some(resistance) = capture(&RESISTANCE_RE, &raw) {
            sections.push(format!("<b>Resistance:</b> 🔴 {}", resistance));
        }

        if let Some(entry) = capture(&ENTRY_RE, &raw) {
            let entry = BUY_RE.replace_all(&entry, "<b>Buy:</b> 💚 $1");
            let entry = SELL_RE.replace_all(&entry, "<b>Sell:</b> ❤️ $1");
            sections.push(format!("<b>Entry Points:</b>\n{}", entry));
        }

        if let Some(target) = capture(&TARGET_RE, &raw) {
            sections.push(format!("<b>Target:</b> 🎯 {}", target));
        }

        if let Some(stop_loss) = capture(&STOP_LOSS_RE, &raw) {
            sections.push(format!("<b>Stop Loss:</b> 🛑 {}", stop_loss));
        }

        let body = sections.join("\n\n");

        format!("{}\n\n{}", body, footer)
    }
}

/// Drop a previously appended footer so re-formatting stays idempotent.
fn strip_footer(raw: &str, footer: &str) -> String {
    if raw.contains(footer) {
        raw.replace(footer, "").trim_end().to_string()
    } else {
        raw.to_string()
    }
}

/// First capture group of a pattern, trimmed; `None` when absent or blank.
fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Trend polarity glyph: up, down, or sideways.
fn trend_glyph(trend: &str) -> &'static str {
    let trend = trend.to_lowercase();
    if trend.contains("bullish") || trend.contains("up") {
        "📈"
    } else if trend.contains("bearish") || trend.contains("down") {
        "📉"
    } else {
        "↔️"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Symbol: BTC/USDT\n\
                          Timeframe: 1 hour\n\n\
                          Trend: bullish continuation above the 20 EMA\n\n\
                          Support and Resistance:\n\
                          Support: 63,800\n\
                          Resistance: 65,400\n\n\
                          Entry Points:\n\
                          Long: 64,050 on retest\n\
                          Short: 65,450 on rejection\n\n\
                          Target: 65,400 then 66,100\n\n\
                          Stop Loss: 63,500";

    fn formatter() -> ResponseFormatter {
        ResponseFormatter::new("ChartWatch AI")
    }

    #[test]
    fn simple_extracts_header_fields() {
        let out = formatter().format(SAMPLE, Style::Simple);
        assert!(out.contains("📊 <b>ANALYSIS BTC/USDT (1 hour)</b>"));
    }

    #[test]
    fn simple_never_returns_empty_for_non_empty_input() {
        let out = formatter().format("no recognizable fields here", Style::Simple);
        assert!(!out.is_empty());
        assert!(out.contains("ANALYSIS Unknown (Unknown)"));
    }

    #[test]
    fn simple_omits_unmatched_fields() {
        let out = formatter().format("Trend: ranging drift", Style::Simple);
        assert!(out.contains("<b>Trend:</b>"));
        assert!(!out.contains("Stop Loss"));
        assert!(!out.contains("Support"));
        assert!(!out.contains("Target"));
    }

    #[test]
    fn bullish_trend_gets_up_glyph() {
        let out = formatter().format("Trend: bullish breakout", Style::Simple);
        assert!(out.contains("<b>Trend:</b> 📈 bullish breakout"));
    }

    #[test]
    fn bearish_trend_gets_down_glyph() {
        let out = formatter().format("Trend: bearish rejection", Style::Simple);
        assert!(out.contains("<b>Trend:</b> 📉 bearish rejection"));
    }

    #[test]
    fn neutral_trend_gets_sideways_glyph() {
        let out = formatter().format("Trend: ranging between levels", Style::Simple);
        assert!(out.contains("<b>Trend:</b> ↔️ ranging between levels"));
    }

    #[test]
    fn simple_marks_support_and_resistance() {
        let out = formatter().format(SAMPLE, Style::Simple);
        assert!(out.contains("<b>Support:</b> 🟢 63,800"));
        assert!(out.contains("<b>Resistance:</b> 🔴 65,400"));
    }

    #[test]
    fn simple_colors_entry_sides() {
        let out = formatter().format(SAMPLE, Style::Simple);
        assert!(out.contains("<b>Buy:</b> 💚 64,050 on retest"));
        assert!(out.contains("<b>Sell:</b> ❤️ 65,450 on rejection"));
    }

    #[test]
    fn simple_marks_target_and_stop_loss() {
        let out = formatter().format(SAMPLE, Style::Simple);
        assert!(out.contains("<b>Target:</b> 🎯 65,400 then 66,100"));
        assert!(out.contains("<b>Stop Loss:</b> 🛑 63,500"));
    }

    #[test]
    fn simple_footer_is_not_duplicated_on_reformat() {
        let fmt = formatter();
        let once = fmt.format(SAMPLE, Style::Simple);
        let twice = fmt.format(&once, Style::Simple);
        assert_eq!(twice.matches("💡 Analysis by ChartWatch AI").count(), 1);
    }

    #[test]
    fn detailed_footer_is_not_duplicated_on_reformat() {
        let fmt = formatter();
        let once = fmt.format(SAMPLE, Style::Detailed);
        let twice = fmt.format(&once, Style::Detailed);
        assert_eq!(twice.matches("💡 Generated by ChartWatch AI").count(), 1);
    }

    #[test]
    fn detailed_converts_markdown_emphasis_and_headings() {
        let raw = "### Overview\nSymbol: ETH/USDT\n\n**strong move** expected";
        let out = formatter().format(raw, Style::Detailed);
        assert!(out.contains("<b>Overview</b>"));
        assert!(out.contains("<b>strong move</b>"));
        assert!(!out.contains("**"));
        assert!(!out.contains("###"));
    }

    #[test]
    fn detailed_wraps_section_labels() {
        let out = formatter().format(SAMPLE, Style::Detailed);
        assert!(out.contains("<b>📈 Trend:</b>"));
        assert!(out.contains("• <b>Support:</b>"));
        assert!(out.contains("• <b>Resistance:</b>"));
        assert!(out.contains("<b>🛑 Stop Loss:</b>"));
        assert!(out.contains("<b>🏆 Target:</b>"));
    }

    #[test]
    fn detailed_keeps_paragraph_count() {
        let out = formatter().format(SAMPLE, Style::Detailed);
        // header + original paragraphs + footer
        let original_paragraphs = SAMPLE.split("\n\n").count();
        assert_eq!(out.split("\n\n").count(), original_paragraphs + 2);
    }

    #[test]
    fn detailed_header_carries_extracted_fields() {
        let out = formatter().format(SAMPLE, Style::Detailed);
        assert!(out.starts_with("🔎 <b>ANALYSIS BTC/USDT (1 hour)</b> 🔍"));
    }

    #[test]
    fn trend_glyph_polarity() {
        assert_eq!(trend_glyph("strong uptrend"), "📈");
        assert_eq!(trend_glyph("Bearish divergence"), "📉");
        assert_eq!(trend_glyph("sideways consolidation"), "↔️");
    }
}
