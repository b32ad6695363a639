// tests/collect_keyword_search.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use trendit_collector::{
    Clock, CollectError, Collector, CollectorConfig, ContentSource, DateRange, DateRangeFilter,
    DateSpan, Item, KeywordSearch, RankBy, RawTimestamp, SearchQuery, SourceError, TimeWindow,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

/// Returns the same batch for every call, like a remote that ignores precise dates.
struct MockProvider {
    items: Vec<Item>,
}

#[async_trait]
impl ContentSource for MockProvider {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<Item>, SourceError> {
        Ok(self.items.clone())
    }
    fn name(&self) -> &'static str {
        "MockProvider"
    }
}

struct FailingProvider(SourceError);

#[async_trait]
impl ContentSource for FailingProvider {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<Item>, SourceError> {
        Err(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "FailingProvider"
    }
}

struct SlowProvider;

#[async_trait]
impl ContentSource for SlowProvider {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<Item>, SourceError> {
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        Ok(Vec::new())
    }
    fn name(&self) -> &'static str {
        "SlowProvider"
    }
}

fn collector(src: impl ContentSource + 'static) -> Collector {
    Collector::new(Arc::new(src), CollectorConfig::default()).with_clock(Clock::Fixed(now()))
}

/// 233 posts aged 8–14 days plus 5 posts aged 1–5 days.
fn attrition_batch() -> Vec<Item> {
    let mut items = Vec::new();
    for i in 0..233i64 {
        let age = Duration::days(8 + (i % 7));
        items.push(
            Item::post(format!("post_{i}"), format!("Post {i} about flask"))
                .with_score(10 + i)
                .with_created(now() - age),
        );
    }
    for i in 0..5i64 {
        items.push(
            Item::post(format!("recent_{i}"), format!("Recent post {i} about flask"))
                .with_score(100 + i)
                .with_created(now() - Duration::days(i + 1)),
        );
    }
    items
}

#[tokio::test]
async fn buffered_week_keeps_recent_and_drops_far_out_items() {
    let c = collector(MockProvider {
        items: attrition_batch(),
    });
    let req = KeywordSearch::new("flask", vec!["flask"], DateRange::LastDays(7))
        .buffer(Duration::hours(4))
        .limit(300);
    let out = c.search_by_keyword_and_date(&req).await.unwrap();

    assert_eq!(out.window, TimeWindow::Week);
    assert_eq!(out.items.len(), 5);
    assert!(out.items.iter().all(|it| it.id.starts_with("recent_")));
    // ranked by score desc
    let ids: Vec<&str> = out.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["recent_4", "recent_3", "recent_2", "recent_1", "recent_0"]
    );
    assert_eq!(out.report.total_in, 238);
    assert_eq!(out.report.excluded_date, 233);
    assert_eq!(out.report.final_count, 5);
}

#[tokio::test]
async fn exact_filter_only_keeps_items_strictly_inside_span() {
    let span = DateSpan::last_days(now(), 7);
    let strict = DateRangeFilter::exact(span).evaluated_at(now());
    let (kept, report) = strict.apply(attrition_batch(), false);
    assert!(kept
        .iter()
        .all(|it| span.contains(it.created_at().unwrap())));
    assert_eq!(kept.len(), 5);
    assert_eq!(report.excluded_date, 233);
}

fn edge_batch() -> Vec<Item> {
    let mut items = attrition_batch();
    items.push(
        Item::post("edge", "Edge post about flask")
            .with_score(1)
            .with_created(now() - Duration::days(7) - Duration::hours(2)),
    );
    items.push(
        Item::post("ahead", "Clock-skewed flask post")
            .with_score(2)
            .with_created(now() + Duration::hours(1)),
    );
    items
}

#[tokio::test]
async fn exact_search_drops_what_the_buffer_keeps() {
    let req = KeywordSearch::new("flask", vec!["flask"], DateRange::LastDays(7)).limit(300);

    let buffered = collector(MockProvider { items: edge_batch() });
    let out = buffered.search_by_keyword_and_date(&req).await.unwrap();
    assert_eq!(out.items.len(), 7);
    assert_eq!(out.report.excluded_date, 233);
    assert_eq!(out.report.future_dated, 1);

    let strict = collector(MockProvider { items: edge_batch() });
    let out = strict
        .search_by_keyword_and_date(&req.clone().exact())
        .await
        .unwrap();
    assert_eq!(out.items.len(), 5);
    assert!(out.items.iter().all(|it| it.id.starts_with("recent_")));
    assert_eq!(out.report.excluded_date, 235);
    assert_eq!(out.report.future_dated, 0);
}

#[tokio::test]
async fn report_accounts_for_limit_cut() {
    let c = collector(MockProvider {
        items: attrition_batch(),
    });
    let req = KeywordSearch::new("flask", vec!["flask"], DateRange::LastDays(7)).limit(2);
    let out = c.search_by_keyword_and_date(&req).await.unwrap();

    let r = &out.report;
    assert_eq!(r.excluded_date, 233);
    assert_eq!(r.truncated, 3);
    assert_eq!(r.final_count, 2);
    assert_eq!(r.total_in, r.excluded() + r.truncated + r.final_count);
}

#[tokio::test]
async fn huge_day_count_means_all_time() {
    let c = collector(MockProvider {
        items: attrition_batch(),
    });
    let req = KeywordSearch::new("flask", vec!["flask"], DateRange::LastDays(u32::MAX)).limit(500);
    let out = c.search_by_keyword_and_date(&req).await.unwrap();
    assert_eq!(out.window, TimeWindow::All);
    assert_eq!(out.items.len(), 238);
    assert_eq!(out.report.excluded_date, 0);
}

#[tokio::test]
async fn keyword_and_date_stages_are_both_accounted() {
    let items = vec![
        Item::post("a", "FastAPI tips").with_score(5).with_created(now() - Duration::hours(1)),
        Item::post("b", "Unrelated").with_score(50).with_created(now() - Duration::hours(2)),
        Item::post("c", "Old FastAPI").with_score(70).with_created(now() - Duration::days(40)),
        Item::post("d", "fastapi, no date").with_score(90),
        Item::post("e", "api body")
            .with_body("see the API docs")
            .with_score(20)
            .with_created(RawTimestamp::Epoch((now() - Duration::hours(5)).timestamp() as f64)),
    ];
    let c = collector(MockProvider { items });
    let req = KeywordSearch::new("python", vec!["fastapi", "API"], DateRange::LastDays(3))
        .debug(true);
    let out = c.search_by_keyword_and_date(&req).await.unwrap();

    let ids: Vec<&str> = out.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["e", "a"]);
    assert_eq!(out.report.excluded_date, 1);
    assert_eq!(out.report.invalid_timestamp, 1);
    assert_eq!(out.report.excluded_keyword, 1);
    let detail = out.report.detail.as_ref().unwrap();
    assert_eq!(detail.invalid_ids, vec!["d"]);
    assert_eq!(detail.keyword_ids, vec!["b"]);
}

#[tokio::test]
async fn explicit_span_and_comment_count_ranking() {
    let from = now() - Duration::days(20);
    let items = vec![
        Item::post("x", "rust").with_comments(3).with_created(now() - Duration::days(10)),
        Item::post("y", "rust").with_comments(9).with_created(now() - Duration::days(15)),
        Item::post("z", "rust").with_comments(9).with_created(now() - Duration::days(1)),
    ];
    let c = collector(MockProvider { items });
    let span = DateSpan::new(from, now()).unwrap();
    let req = KeywordSearch::new("rust", vec!["rust"], DateRange::Between(span))
        .rank_by(RankBy::CommentCount)
        .limit(2);
    let out = c.search_by_keyword_and_date(&req).await.unwrap();
    assert_eq!(out.window, TimeWindow::Month);
    let ids: Vec<&str> = out.items.iter().map(|i| i.id.as_str()).collect();
    // tie on 9 comments keeps arrival order
    assert_eq!(ids, vec!["y", "z"]);
}

#[tokio::test]
async fn remote_failure_is_an_error_not_an_empty_result() {
    let c = collector(FailingProvider(SourceError::Transient("reset".into())));
    let req = KeywordSearch::new("python", vec!["x"], DateRange::LastDays(7));
    let err = c.search_by_keyword_and_date(&req).await.unwrap_err();
    assert!(matches!(
        err,
        CollectError::RemoteUnavailable { ref scope, .. } if scope.as_deref() == Some("python")
    ));
    assert!(err.is_retryable());

    let c = collector(FailingProvider(SourceError::RateLimited { retry_after: None }));
    let err = c.search_by_keyword_and_date(&req).await.unwrap_err();
    assert!(matches!(err, CollectError::RemoteRateLimited { .. }));
}

#[tokio::test(start_paused = true)]
async fn slow_remote_times_out() {
    let cfg = CollectorConfig {
        request_timeout_secs: 2,
        ..Default::default()
    };
    let c = Collector::new(Arc::new(SlowProvider), cfg).with_clock(Clock::Fixed(now()));
    let req = KeywordSearch::new("python", vec!["x"], DateRange::LastDays(7));
    let err = c.search_by_keyword_and_date(&req).await.unwrap_err();
    assert!(matches!(err, CollectError::TimedOut { .. }));
}
