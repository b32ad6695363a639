// src/collect/users.rs
//! Per-author activity over a look-back window.
//!
//! Each matched item adds `decay(age) * (1 + ln(1 + max(score, 0)))` to its
//! author's weighted score, where `decay` halves every `timeframe / 2`.
//! Future-dated items count with full weight.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use super::{clean_scopes, record_report, Collection, Collector};
use crate::date_filter::{buffer_from_hours, date_range_with_buffer, DateRangeFilter, FilterReport};
use crate::error::Result;
use crate::item::{Item, ItemKind};
use crate::ranker::rank_with;
use crate::source::{SearchQuery, SortKind};
use crate::window::select_time_window;

/// Accounts whose activity is not user activity.
const IGNORED_AUTHORS: [&str; 2] = ["[deleted]", "AutoModerator"];

#[derive(Debug, Clone)]
pub struct UserActivityRequest {
    pub scopes: Vec<String>,
    pub timeframe_days: u32,
    pub limit: usize,
    pub debug: Option<bool>,
}

impl UserActivityRequest {
    pub fn new<S: Into<String>>(scopes: Vec<S>, timeframe_days: u32, limit: usize) -> Self {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            timeframe_days,
            limit,
            debug: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserActivity {
    pub author: String,
    /// Posts + comments in the window.
    pub activity: usize,
    pub posts: usize,
    pub comments: usize,
    pub total_score: i64,
    pub weighted_score: f64,
    pub last_active: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl UserActivity {
    fn new(author: &str) -> Self {
        Self {
            author: author.to_string(),
            activity: 0,
            posts: 0,
            comments: 0,
            total_score: 0,
            weighted_score: 0.0,
            last_active: None,
            scopes: Vec::new(),
        }
    }
}

/// `0.5^(age / half_life)`; non-positive ages weigh 1.
pub fn recency_weight(age: Duration, half_life: Duration) -> f64 {
    if age <= Duration::zero() {
        return 1.0;
    }
    let hl = half_life.num_seconds().max(3_600) as f64;
    0.5f64.powf(age.num_seconds() as f64 / hl)
}

/// Group items by author in first-appearance order.
pub fn aggregate_users(items: &[Item], now: DateTime<Utc>, timeframe: Duration) -> Vec<UserActivity> {
    let half_life = timeframe / 2;
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<UserActivity> = Vec::new();

    for it in items {
        let Some(author) = it.author.as_deref().map(str::trim) else {
            continue;
        };
        if author.is_empty() || IGNORED_AUTHORS.contains(&author) {
            continue;
        }
        let slot = *index.entry(author).or_insert_with(|| {
            out.push(UserActivity::new(author));
            out.len() - 1
        });
        let u = &mut out[slot];

        u.activity += 1;
        match it.kind {
            ItemKind::Post => u.posts += 1,
            ItemKind::Comment => u.comments += 1,
        }
        u.total_score += it.score;

        let at = it.created_at();
        let decay = at.map_or(0.0, |t| recency_weight(now - t, half_life));
        u.weighted_score += decay * (1.0 + (it.score.max(0) as f64).ln_1p());
        if let Some(t) = at {
            u.last_active = Some(u.last_active.map_or(t, |l| l.max(t)));
        }
        if let Some(scope) = it.scope.as_deref() {
            if !u.scopes.iter().any(|s| s == scope) {
                u.scopes.push(scope.to_string());
            }
        }
    }
    out
}

pub(super) async fn collect(
    collector: &Collector,
    req: &UserActivityRequest,
) -> Result<Collection<UserActivity>> {
    let scopes = clean_scopes(&req.scopes)?;
    let cfg = collector.config();
    let now = collector.clock().now();
    let window = select_time_window(i64::from(req.timeframe_days))?;
    let buffer = buffer_from_hours(cfg.default_buffer_hours)?;
    let debug = req.debug.unwrap_or(cfg.debug_filtering);
    let fetch = cfg.fetch_size(cfg.per_scope_limit);

    let mut queries = Vec::with_capacity(scopes.len() * 2);
    for s in &scopes {
        for kind in [ItemKind::Post, ItemKind::Comment] {
            queries.push(SearchQuery::listing(Some(s), SortKind::New, window, fetch).with_kind(kind));
        }
    }
    let (batches, failures) = collector.fetch_many(&queries).await?;
    let fetched: Vec<Item> = batches.into_iter().flatten().collect();

    let span = date_range_with_buffer(now, req.timeframe_days, buffer);
    let filter = DateRangeFilter::exact(span).evaluated_at(now);
    let mut report = FilterReport::new(fetched.len(), debug);
    let dated = filter.apply_into(fetched, &mut report);

    let timeframe = Duration::days(i64::from(req.timeframe_days.max(1)));
    let users = aggregate_users(&dated, now, timeframe);
    let authors = users.len();
    let users = rank_with(users, req.limit, |u| u.weighted_score);
    report.ranked(authors, users.len());

    info!(
        target: "collect",
        scopes = scopes.len(),
        failed = failures.len(),
        items = dated.len(),
        returned = users.len(),
        "user activity"
    );
    record_report(&report);

    Ok(Collection {
        items: users,
        report,
        window,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn by(author: &str, id: &str, age_h: i64, score: i64) -> Item {
        Item::post(id, id)
            .with_author(author)
            .with_score(score)
            .with_created(now() - Duration::hours(age_h))
            .with_scope("python")
    }

    #[test]
    fn weight_halves_every_half_life() {
        let hl = Duration::hours(12);
        assert!((recency_weight(Duration::zero(), hl) - 1.0).abs() < 1e-9);
        assert!((recency_weight(Duration::hours(12), hl) - 0.5).abs() < 1e-9);
        assert!((recency_weight(Duration::hours(24), hl) - 0.25).abs() < 1e-9);
        assert!((recency_weight(Duration::hours(-3), hl) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn groups_by_author_and_skips_bots() {
        let mut items = vec![
            by("alice", "1", 1, 10),
            by("bob", "2", 2, 3),
            by("alice", "3", 30, 0),
            by("[deleted]", "4", 1, 100),
            by("AutoModerator", "5", 1, 1),
            Item::post("6", "anon").with_created(now()),
        ];
        items[2].kind = ItemKind::Comment;
        items[2].scope = Some("rust".into());

        let users = aggregate_users(&items, now(), Duration::days(7));
        assert_eq!(users.len(), 2);
        let alice = &users[0];
        assert_eq!(alice.author, "alice");
        assert_eq!(alice.activity, 2);
        assert_eq!((alice.posts, alice.comments), (1, 1));
        assert_eq!(alice.total_score, 10);
        assert_eq!(alice.scopes, vec!["python", "rust"]);
        assert_eq!(alice.last_active, Some(now() - Duration::hours(1)));
        assert_eq!(users[1].author, "bob");
    }

    #[test]
    fn recent_activity_outweighs_old_activity() {
        let items = vec![
            by("old", "1", 150, 5),
            by("old", "2", 160, 5),
            by("fresh", "3", 1, 5),
        ];
        let users = aggregate_users(&items, now(), Duration::days(7));
        let ranked = rank_with(users, 2, |u| u.weighted_score);
        assert_eq!(ranked[0].author, "fresh");
    }
}
