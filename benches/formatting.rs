use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chartwatch::prompts::ANALYSIS_BANNER;
use chartwatch::router::clean_analysis;
use chartwatch::{ResponseFormatter, Style};

fn sample_analysis() -> String {
    format!(
        "{}\n\n\
         Symbol: BTC/USDT\n\
         Timeframe: 15 minutes\n\n\
         Trend: bullish continuation above the 20 EMA with rising volume\n\n\
         Support and Resistance:\n\
         Support: 63,800\n\
         Resistance: 65,400\n\n\
         Entry Points:\n\
         Long: 64,050 on retest of the breakout level\n\
         Short: 65,450 on a clean rejection wick\n\n\
         Target: 65,400 then 66,100\n\n\
         Stop Loss: 63,500\n\n\
         ### Extended notes\n\
         **Momentum** stays constructive while the price holds the channel. \
         Watch the funding rate into the close of the session.",
        ANALYSIS_BANNER
    )
}

fn detailed_benchmark(c: &mut Criterion) {
    let formatter = ResponseFormatter::new("ChartWatch AI");
    let raw = sample_analysis();

    c.bench_function("format_detailed_full_analysis", |b| {
        b.iter(|| {
            let out = formatter.format(black_box(raw.as_str()), Style::Detailed);
            black_box(out.len());
        });
    });
}

fn simple_benchmark(c: &mut Criterion) {
    let formatter = ResponseFormatter::new("ChartWatch AI");
    let raw = sample_analysis();

    c.bench_function("format_simple_full_analysis", |b| {
        b.iter(|| {
            let out = formatter.format(black_box(raw.as_str()), Style::Simple);
            black_box(out.len());
        });
    });
}

fn refusal_scrub_benchmark(c: &mut Criterion) {
    let raw = format!("I'm sorry, I cannot assist with that.\n\n{}", sample_analysis());

    c.bench_function("clean_analysis_refusal_preamble", |b| {
        b.iter(|| {
            let out = clean_analysis(black_box(raw.as_str()));
            black_box(out.len());
        });
    });
}

criterion_group!(
    formatting,
    detailed_benchmark,
    simple_benchmark,
    refusal_scrub_benchmark
);
criterion_main!(formatting);
