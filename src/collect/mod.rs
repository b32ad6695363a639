// src/collect/mod.rs
//! Collection orchestrator: one operation per query scenario.
//!
//! Every operation is single-shot. It picks a remote window, issues one or
//! more calls to the [`ContentSource`], narrows the results client-side
//! (date, then keywords), ranks, and returns a [`Collection`] carrying the
//! [`FilterReport`]. No retries happen here; errors are typed so an outer
//! layer can decide.

mod fanout;
pub mod users;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::date_filter::{buffer_from_hours, DateRangeFilter, Exclusion, FilterReport};
use crate::error::{CollectError, Result, ScopeFailure, SourceError};
use crate::item::{DateSpan, Item, ItemKind};
use crate::keywords::{search_query, KeywordMatcher};
use crate::ranker::{rank, RankBy};
use crate::source::{ContentSource, SearchQuery, SortKind};
use crate::telemetry::{
    ensure_metrics_described, DROPPED_TOTAL, KEPT_TOTAL, LAST_RUN_TS, REMOTE_ITEMS_TOTAL,
    REMOTE_MS, SCOPE_ERRORS_TOTAL,
};
use crate::window::{select_time_window, TimeWindow};

pub use users::{UserActivity, UserActivityRequest};

/// Source of "now" for span derivation and future-dated accounting.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// Caller's date range for a keyword search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Between(DateSpan),
    /// `[now - days, now]`.
    LastDays(u32),
}

impl DateRange {
    fn resolve(&self, now: DateTime<Utc>) -> DateSpan {
        match self {
            DateRange::Between(span) => *span,
            DateRange::LastDays(days) => DateSpan::last_days(now, *days),
        }
    }
}

/// Keyword + date search within one scope (posts or comments).
#[derive(Debug, Clone)]
pub struct KeywordSearch {
    pub scope: String,
    pub keywords: Vec<String>,
    pub range: DateRange,
    /// `None` uses the configured default; `Some(zero)` is an exact filter.
    pub buffer: Option<Duration>,
    pub limit: usize,
    pub rank_by: RankBy,
    pub debug: Option<bool>,
}

impl KeywordSearch {
    pub fn new<S: Into<String>>(scope: impl Into<String>, keywords: Vec<S>, range: DateRange) -> Self {
        Self {
            scope: scope.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            range,
            buffer: None,
            limit: 25,
            rank_by: RankBy::Score,
            debug: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn rank_by(mut self, by: RankBy) -> Self {
        self.rank_by = by;
        self
    }

    pub fn buffer(mut self, buffer: Duration) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Zero-tolerance date filtering.
    pub fn exact(self) -> Self {
        self.buffer(Duration::zero())
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = Some(on);
        self
    }
}

/// Merge of per-scope listings.
#[derive(Debug, Clone)]
pub struct TrendingRequest {
    pub scopes: Vec<String>,
    pub window: TimeWindow,
    pub sort: SortKind,
    /// Items fetched per scope; `None` uses the configured default.
    pub per_scope_limit: Option<usize>,
    pub limit: usize,
    pub rank_by: RankBy,
}

impl TrendingRequest {
    pub fn new<S: Into<String>>(scopes: Vec<S>, window: TimeWindow, limit: usize) -> Self {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            window,
            sort: SortKind::Hot,
            per_scope_limit: None,
            limit,
            rank_by: RankBy::Score,
        }
    }
}

/// Ordered result of an operation. Order is the ranking order.
#[derive(Debug, Clone, Serialize)]
pub struct Collection<T = Item> {
    pub items: Vec<T>,
    pub report: FilterReport,
    pub window: TimeWindow,
    /// Scopes that could not be collected (multi-scope operations only).
    pub failures: Vec<ScopeFailure>,
}

impl<T> Collection<T> {
    /// Some scopes are missing from the result.
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Single best item, or an explicit "nothing qualified".
#[derive(Debug, Clone, Serialize)]
pub struct PopularPick {
    pub item: Option<Item>,
    pub report: FilterReport,
    pub window: TimeWindow,
}

pub struct Collector {
    source: Arc<dyn ContentSource>,
    cfg: CollectorConfig,
    clock: Clock,
}

impl Collector {
    pub fn new(source: Arc<dyn ContentSource>, cfg: CollectorConfig) -> Self {
        ensure_metrics_described();
        Self {
            source,
            cfg: cfg.sanitized(),
            clock: Clock::System,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.cfg
    }

    /// Posts in `scope` matching any keyword inside the date range.
    pub async fn search_by_keyword_and_date(&self, req: &KeywordSearch) -> Result<Collection> {
        self.keyword_pipeline(req, ItemKind::Post).await
    }

    /// Comments in `scope`, same pipeline as posts.
    pub async fn top_comments_by_criteria(&self, req: &KeywordSearch) -> Result<Collection> {
        self.keyword_pipeline(req, ItemKind::Comment).await
    }

    /// Listings from several scopes merged into one ranking.
    ///
    /// Failed scopes are reported in `failures`; the call only errors when
    /// no scope produced a result.
    pub async fn trending_across_scopes(&self, req: &TrendingRequest) -> Result<Collection> {
        let scopes = clean_scopes(&req.scopes)?;
        let per_scope = req.per_scope_limit.unwrap_or(self.cfg.per_scope_limit);
        let per_scope = per_scope.min(self.cfg.fetch_ceiling);

        let queries: Vec<SearchQuery> = scopes
            .iter()
            .map(|s| SearchQuery::listing(Some(s), req.sort, req.window, per_scope))
            .collect();
        let (batches, failures) = self.fetch_many(&queries).await?;

        let mut merged = Vec::new();
        for batch in batches {
            merged.extend(batch);
        }
        let mut report = FilterReport::new(merged.len(), false);
        let merged = dedup_by_id(merged, &mut report);
        let before = merged.len();
        let items = rank(merged, req.rank_by, req.limit);
        report.ranked(before, items.len());

        info!(
            target: "collect",
            scopes = scopes.len(),
            failed = failures.len(),
            window = %req.window,
            returned = items.len(),
            "trending merge"
        );
        record_report(&report);

        Ok(Collection {
            items,
            report,
            window: req.window,
            failures,
        })
    }

    /// Unscoped listing with sort and window passed through.
    pub async fn global_top_posts(
        &self,
        sort: SortKind,
        window: TimeWindow,
        limit: usize,
        rank_by: RankBy,
    ) -> Result<Collection> {
        let query = SearchQuery::listing(None, sort, window, limit.min(self.cfg.fetch_ceiling));
        let fetched = self.fetch_with_deadline(&query).await?;

        let mut report = FilterReport::new(fetched.len(), false);
        let items = rank(fetched, rank_by, limit);
        report.ranked(report.total_in, items.len());

        info!(
            target: "collect",
            sort = sort.as_str(),
            window = %window,
            returned = items.len(),
            "global top posts"
        );
        record_report(&report);

        Ok(Collection {
            items,
            report,
            window,
            failures: Vec::new(),
        })
    }

    /// Best item of the last day in `scope`, or `item: None`.
    pub async fn most_popular_today(&self, scope: &str, rank_by: RankBy) -> Result<PopularPick> {
        let req = KeywordSearch::new(scope, Vec::<String>::new(), DateRange::LastDays(1))
            .limit(self.cfg.popular_fetch_limit)
            .rank_by(rank_by);
        let mut found = self.keyword_pipeline(&req, ItemKind::Post).await?;

        let before = found.items.len();
        let item = rank(found.items, rank_by, 1).into_iter().next();
        found.report.ranked(before, usize::from(item.is_some()));
        if item.is_none() {
            info!(target: "collect", scope, "no qualifying item today");
        }
        Ok(PopularPick {
            item,
            report: found.report,
            window: found.window,
        })
    }

    /// Authors ranked by recency-weighted activity across `scopes`.
    pub async fn top_users_by_activity(
        &self,
        req: &UserActivityRequest,
    ) -> Result<Collection<UserActivity>> {
        users::collect(self, req).await
    }

    async fn keyword_pipeline(&self, req: &KeywordSearch, kind: ItemKind) -> Result<Collection> {
        let scope = req.scope.trim();
        if scope.is_empty() {
            return Err(CollectError::InvalidArgument("scope must not be empty".into()));
        }
        let now = self.clock.now();
        let span = req.range.resolve(now);
        let window = select_time_window(span.day_span())?;
        let buffer = match req.buffer {
            Some(b) => b,
            None => buffer_from_hours(self.cfg.default_buffer_hours)?,
        };
        let filter = DateRangeFilter::new(span, buffer)?.evaluated_at(now);
        let debug = req.debug.unwrap_or(self.cfg.debug_filtering);

        if req.limit == 0 {
            return Ok(Collection {
                items: Vec::new(),
                report: FilterReport::new(0, debug),
                window,
                failures: Vec::new(),
            });
        }

        let matcher = KeywordMatcher::new(&req.keywords);
        let sort = if matcher.is_empty() {
            SortKind::Top
        } else {
            SortKind::Relevance
        };
        let query = SearchQuery::listing(Some(scope), sort, window, self.cfg.fetch_size(req.limit))
            .with_query(search_query(matcher.keywords()))
            .with_kind(kind);

        info!(
            target: "collect",
            scope,
            kind = ?kind,
            from = %span.from(),
            to = %span.to(),
            buffer_h = buffer.num_minutes() as f64 / 60.0,
            window = %window,
            "keyword search"
        );

        let fetched = self.fetch_with_deadline(&query).await?;
        if fetched.is_empty() {
            info!(target: "collect", scope, query = %query.query, "remote returned nothing");
        }

        let mut report = FilterReport::new(fetched.len(), debug);
        // date first: it is known before text is inspected
        let dated = filter.apply_into(fetched, &mut report);
        let matched = matcher.apply_into(dated, &mut report);
        let before = matched.len();
        let items = rank(matched, req.rank_by, req.limit);
        report.ranked(before, items.len());

        info!(
            target: "collect",
            scope,
            total_in = report.total_in,
            excluded_date = report.excluded_date,
            excluded_keyword = report.excluded_keyword,
            invalid_timestamp = report.invalid_timestamp,
            future_dated = report.future_dated,
            truncated = report.truncated,
            returned = report.final_count,
            "filtering done"
        );
        if let Some(detail) = report.detail.as_ref() {
            debug!(
                target: "collect",
                earliest = ?detail.earliest,
                latest = ?detail.latest,
                date_ids = ?detail.date_ids,
                keyword_ids = ?detail.keyword_ids,
                invalid_ids = ?detail.invalid_ids,
                "filter detail"
            );
        }
        record_report(&report);

        Ok(Collection {
            items,
            report,
            window,
            failures: Vec::new(),
        })
    }

    /// One remote call under the operation deadline; failures are fatal.
    async fn fetch_with_deadline(&self, query: &SearchQuery) -> Result<Vec<Item>> {
        let after = self.cfg.request_timeout();
        match tokio::time::timeout(after, self.fetch(query)).await {
            Ok(Ok(items)) => Ok(items),
            Ok(Err(e)) => Err(CollectError::from_source(query.scope.as_deref(), e)),
            Err(_) => {
                warn!(target: "collect", scope = query.scope_label(), ?after, "remote call timed out");
                Err(CollectError::TimedOut { after })
            }
        }
    }

    /// Concurrent calls, one per query. Returns successful batches in query
    /// order and a failure record per failed or unfinished query.
    pub(crate) async fn fetch_many(
        &self,
        queries: &[SearchQuery],
    ) -> Result<(Vec<Vec<Item>>, Vec<ScopeFailure>)> {
        let after = self.cfg.request_timeout();
        let out = fanout::fan_out(queries.len(), self.cfg.max_concurrency, after, |i| {
            self.fetch(&queries[i])
        })
        .await;

        if out.timed_out() {
            warn!(
                target: "collect",
                finished = out.done.len(),
                abandoned = out.unfinished.len(),
                ?after,
                "deadline hit during fan-out"
            );
        }

        let mut batches = Vec::with_capacity(out.done.len());
        let mut failures = Vec::new();
        for (i, res) in out.done {
            match res {
                Ok(items) => batches.push(items),
                Err(error) => {
                    warn!(target: "collect", scope = queries[i].scope_label(), %error, "scope failed");
                    failures.push(ScopeFailure {
                        scope: queries[i].scope_label().to_string(),
                        error,
                    });
                }
            }
        }
        for &i in &out.unfinished {
            warn!(target: "collect", scope = queries[i].scope_label(), ?after, "scope abandoned at deadline");
            failures.push(ScopeFailure {
                scope: queries[i].scope_label().to_string(),
                error: SourceError::Transient(format!("no response within {after:?}")),
            });
        }

        if batches.is_empty() && !queries.is_empty() {
            if failures.len() == out.unfinished.len() {
                return Err(CollectError::TimedOut { after });
            }
            return Err(CollectError::AllScopesFailed { failures });
        }
        Ok((batches, failures))
    }

    /// Raw remote call with telemetry. Missing scope ids are filled from the query.
    async fn fetch(&self, query: &SearchQuery) -> std::result::Result<Vec<Item>, SourceError> {
        let t0 = std::time::Instant::now();
        let res = self.source.search(query).await;
        histogram!(REMOTE_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(mut items) => {
                counter!(REMOTE_ITEMS_TOTAL).increment(items.len() as u64);
                if let Some(scope) = query.scope.as_deref() {
                    for it in items.iter_mut().filter(|it| it.scope.is_none()) {
                        it.scope = Some(scope.to_string());
                    }
                }
                info!(
                    target: "collect",
                    source = self.source.name(),
                    scope = query.scope_label(),
                    window = %query.window,
                    requested = query.limit,
                    returned = items.len(),
                    "remote call"
                );
                Ok(items)
            }
            Err(e) => {
                counter!(SCOPE_ERRORS_TOTAL).increment(1);
                Err(e)
            }
        }
    }

    pub(crate) fn clock(&self) -> Clock {
        self.clock
    }
}

/// Trimmed, non-empty, case-insensitively unique scope names.
pub(crate) fn clean_scopes(scopes: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(scopes.len());
    for s in scopes {
        let t = s.trim();
        if t.is_empty() {
            return Err(CollectError::InvalidArgument("scope names must not be empty".into()));
        }
        if seen.insert(t.to_ascii_lowercase()) {
            out.push(t.to_string());
        }
    }
    if out.is_empty() {
        return Err(CollectError::InvalidArgument("at least one scope is required".into()));
    }
    Ok(out)
}

/// Keep the first occurrence of each id.
pub(crate) fn dedup_by_id(items: Vec<Item>, report: &mut FilterReport) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        if seen.insert(it.id.clone()) {
            out.push(it);
        } else {
            report.record(Exclusion::Duplicate, &it.id);
        }
    }
    out
}

pub(crate) fn record_report(report: &FilterReport) {
    counter!(KEPT_TOTAL).increment(report.final_count as u64);
    for (reason, n) in [
        (Exclusion::Date, report.excluded_date),
        (Exclusion::Keyword, report.excluded_keyword),
        (Exclusion::InvalidTimestamp, report.invalid_timestamp),
        (Exclusion::Duplicate, report.duplicates),
    ] {
        if n > 0 {
            counter!(DROPPED_TOTAL, "reason" => reason.as_str()).increment(n as u64);
        }
    }
    if report.truncated > 0 {
        counter!(DROPPED_TOTAL, "reason" => "limit").increment(report.truncated as u64);
    }
    gauge!(LAST_RUN_TS).set(Utc::now().timestamp() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct StubSource {
        items: Vec<Item>,
        seen: Mutex<Vec<SearchQuery>>,
    }

    impl StubSource {
        fn new(items: Vec<Item>) -> Arc<Self> {
            Arc::new(Self {
                items,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ContentSource for StubSource {
        async fn search(&self, query: &SearchQuery) -> std::result::Result<Vec<Item>, SourceError> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(self.items.clone())
        }
        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn collector(src: Arc<StubSource>) -> Collector {
        Collector::new(src, CollectorConfig::default()).with_clock(Clock::Fixed(now()))
    }

    #[tokio::test]
    async fn remote_query_uses_window_overfetch_and_or_query() {
        let src = StubSource::new(Vec::new());
        let c = collector(src.clone());
        let req = KeywordSearch::new("python", vec!["fastapi", "api"], DateRange::LastDays(30))
            .limit(10);
        let out = c.search_by_keyword_and_date(&req).await.unwrap();
        assert!(out.items.is_empty());
        assert_eq!(out.window, TimeWindow::Year);

        let seen = src.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query, "fastapi OR api");
        assert_eq!(seen[0].limit, 30);
        assert_eq!(seen[0].sort, SortKind::Relevance);
        assert_eq!(seen[0].scope.as_deref(), Some("python"));
        assert_eq!(seen[0].kind, ItemKind::Post);
    }

    #[tokio::test]
    async fn comment_search_asks_for_comments() {
        let src = StubSource::new(vec![Item::comment("c1", "django tip")
            .with_created(now() - Duration::hours(3))
            .with_score(4)]);
        let c = collector(src.clone());
        let req = KeywordSearch::new("python", vec!["django"], DateRange::LastDays(7));
        let out = c.top_comments_by_criteria(&req).await.unwrap();
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].scope.as_deref(), Some("python"));
        assert_eq!(src.seen.lock().unwrap()[0].kind, ItemKind::Comment);
    }

    #[tokio::test]
    async fn empty_scope_is_invalid() {
        let c = collector(StubSource::new(Vec::new()));
        let req = KeywordSearch::new("  ", vec!["x"], DateRange::LastDays(1));
        assert!(matches!(
            c.search_by_keyword_and_date(&req).await,
            Err(CollectError::InvalidArgument(_))
        ));
        let t = TrendingRequest::new(Vec::<String>::new(), TimeWindow::Day, 5);
        assert!(matches!(
            c.trending_across_scopes(&t).await,
            Err(CollectError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn zero_limit_skips_remote() {
        let src = StubSource::new(Vec::new());
        let c = collector(src.clone());
        let req = KeywordSearch::new("python", vec!["x"], DateRange::LastDays(1)).limit(0);
        let out = c.search_by_keyword_and_date(&req).await.unwrap();
        assert!(out.items.is_empty());
        assert!(src.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let items = vec![
            Item::post("a", "1").with_scope("x"),
            Item::post("b", "2"),
            Item::post("a", "1").with_scope("y"),
        ];
        let mut report = FilterReport::new(3, false);
        let out = dedup_by_id(items, &mut report);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].scope.as_deref(), Some("x"));
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn scope_cleaning() {
        let s = vec!["Python".to_string(), " python ".into(), "rust".into()];
        assert_eq!(clean_scopes(&s).unwrap(), vec!["Python", "rust"]);
        assert!(clean_scopes(&["ok".into(), "".into()]).is_err());
    }
}
