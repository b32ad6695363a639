//! Runs every collection scenario against a JSON fixture and prints the results.
//!
//! Usage: `collect_demo [fixture.json]` (default `tests/fixtures/posts.json`).
//! Logs follow `RUST_LOG`; defaults to `collect=info,warn`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trendit_collector::source::fixture::FixtureSource;
use trendit_collector::telemetry::install_prometheus;
use trendit_collector::{
    Clock, Collector, CollectorConfig, DateRange, KeywordSearch, RankBy, SortKind, TimeWindow,
    TrendingRequest, UserActivityRequest,
};

const DEFAULT_FIXTURE: &str = "tests/fixtures/posts.json";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("collect=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> Result<()> {
    println!("== {label}");
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();
    let prom = install_prometheus()?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_FIXTURE.to_string());
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading fixture {path}"))?;
    let source = FixtureSource::from_fixture(&content);
    let clock = match source.anchor()? {
        Some(t) => Clock::Fixed(t),
        None => Clock::System,
    };

    let cfg = CollectorConfig::load_default()?;
    let collector = Collector::new(Arc::new(source), cfg).with_clock(clock);

    let search = KeywordSearch::new("python", vec!["fastapi", "api"], DateRange::LastDays(7))
        .limit(5)
        .debug(true);
    print_json(
        "keyword + date search",
        &collector.search_by_keyword_and_date(&search).await?,
    )?;

    let trending = TrendingRequest::new(vec!["python", "rust", "golang"], TimeWindow::Week, 5);
    match collector.trending_across_scopes(&trending).await {
        Ok(c) => print_json("trending across scopes", &c)?,
        Err(e) => warn!(error = %e, "trending failed"),
    }

    print_json(
        "global top posts",
        &collector
            .global_top_posts(SortKind::Hot, TimeWindow::Day, 3, RankBy::Score)
            .await?,
    )?;

    print_json(
        "most popular today",
        &collector.most_popular_today("python", RankBy::Score).await?,
    )?;

    let comments = KeywordSearch::new("python", vec!["django"], DateRange::LastDays(7)).limit(5);
    print_json(
        "top comments",
        &collector.top_comments_by_criteria(&comments).await?,
    )?;

    let users = UserActivityRequest::new(vec!["python", "rust"], 7, 5);
    print_json("top users", &collector.top_users_by_activity(&users).await?)?;

    println!("== metrics\n{}", prom.render());
    Ok(())
}
