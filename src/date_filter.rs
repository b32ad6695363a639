// src/date_filter.rs
//! # Date Range Filter
//!
//! Client-side re-filter of remote results against the caller's date span.
//!
//! - The span is widened by a tolerance buffer on both ends, because the
//!   remote's notion of "created" can lag or lead the caller's window by hours.
//!   A zero buffer is only used when the caller explicitly asks for it.
//! - Items without a usable timestamp are excluded and counted as invalid;
//!   they never abort the pass and are never treated as "now".
//! - Future-dated items inside the widened span are kept and counted.
//! - Output keeps input order; ranking happens later.
//!
//! Every pass produces a [`FilterReport`] so callers can see where attrition
//! happened instead of digging through logs.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::CollectError;
use crate::item::{DateSpan, Item};

/// Tolerance used when the caller does not supply one.
pub const DEFAULT_BUFFER_HOURS: f64 = 4.0;

/// Max excluded ids kept per reason in [`FilterDetail`].
const DETAIL_ID_CAP: usize = 20;

/// Attrition accounting for one collection call.
///
/// For item operations `total_in == excluded() + truncated + final_count`.
/// User activity counts authors in `truncated` and `final_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub total_in: usize,
    pub excluded_date: usize,
    pub excluded_keyword: usize,
    pub invalid_timestamp: usize,
    pub duplicates: usize,
    /// Kept items whose timestamp lies after the evaluation instant.
    pub future_dated: usize,
    /// Qualifying entries cut by the caller's limit after ranking.
    pub truncated: usize,
    pub final_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<FilterDetail>,
}

/// Extra diagnostics, only collected when `debug` is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterDetail {
    /// Range of valid timestamps seen in the input.
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub date_ids: Vec<String>,
    pub keyword_ids: Vec<String>,
    pub invalid_ids: Vec<String>,
}

/// Why an item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Date,
    Keyword,
    InvalidTimestamp,
    Duplicate,
}

impl Exclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exclusion::Date => "date",
            Exclusion::Keyword => "keyword",
            Exclusion::InvalidTimestamp => "invalid_timestamp",
            Exclusion::Duplicate => "duplicate",
        }
    }
}

impl FilterReport {
    pub fn new(total_in: usize, debug: bool) -> Self {
        Self {
            total_in,
            final_count: total_in,
            detail: debug.then(FilterDetail::default),
            ..Default::default()
        }
    }

    pub fn is_debug(&self) -> bool {
        self.detail.is_some()
    }

    /// Total items dropped by any stage.
    pub fn excluded(&self) -> usize {
        self.excluded_date + self.excluded_keyword + self.invalid_timestamp + self.duplicates
    }

    pub fn record(&mut self, reason: Exclusion, id: &str) {
        match reason {
            Exclusion::Date => self.excluded_date += 1,
            Exclusion::Keyword => self.excluded_keyword += 1,
            Exclusion::InvalidTimestamp => self.invalid_timestamp += 1,
            Exclusion::Duplicate => self.duplicates += 1,
        }
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        let ids = match reason {
            Exclusion::Date => &mut detail.date_ids,
            Exclusion::Keyword => &mut detail.keyword_ids,
            Exclusion::InvalidTimestamp => &mut detail.invalid_ids,
            Exclusion::Duplicate => return,
        };
        if ids.len() < DETAIL_ID_CAP {
            ids.push(id.to_string());
        }
    }

    /// Account for a ranking pass that kept `after` of `before` entries.
    pub fn ranked(&mut self, before: usize, after: usize) {
        self.truncated += before.saturating_sub(after);
        self.final_count = after;
    }

    fn observe(&mut self, at: DateTime<Utc>) {
        if let Some(d) = self.detail.as_mut() {
            d.earliest = Some(d.earliest.map_or(at, |e| e.min(at)));
            d.latest = Some(d.latest.map_or(at, |l| l.max(at)));
        }
    }

    /// Fold another report (e.g. one per scope) into this one.
    pub fn absorb(&mut self, other: &FilterReport) {
        self.total_in += other.total_in;
        self.excluded_date += other.excluded_date;
        self.excluded_keyword += other.excluded_keyword;
        self.invalid_timestamp += other.invalid_timestamp;
        self.duplicates += other.duplicates;
        self.future_dated += other.future_dated;
        self.truncated += other.truncated;
        self.final_count += other.final_count;
        if let (Some(mine), Some(theirs)) = (self.detail.as_mut(), other.detail.as_ref()) {
            mine.earliest = min_opt(mine.earliest, theirs.earliest);
            mine.latest = max_opt(mine.latest, theirs.latest);
            extend_capped(&mut mine.date_ids, &theirs.date_ids);
            extend_capped(&mut mine.keyword_ids, &theirs.keyword_ids);
            extend_capped(&mut mine.invalid_ids, &theirs.invalid_ids);
        }
    }
}

fn min_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn max_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

fn extend_capped(dst: &mut Vec<String>, src: &[String]) {
    let room = DETAIL_ID_CAP.saturating_sub(dst.len());
    dst.extend(src.iter().take(room).cloned());
}

/// Convert a buffer in hours to a duration. Rejects negative and non-finite input.
pub fn buffer_from_hours(hours: f64) -> Result<Duration, CollectError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(CollectError::InvalidArgument(format!(
            "buffer hours must be a finite value >= 0, got {hours}"
        )));
    }
    Ok(Duration::milliseconds((hours * 3_600_000.0).round() as i64))
}

/// `[now - days - buffer, now + buffer]`: the default range for "last N days".
pub fn date_range_with_buffer(now: DateTime<Utc>, days: u32, buffer: Duration) -> DateSpan {
    DateSpan::last_days(now, days).widened(buffer)
}

/// Buffered inclusion test over a fixed span.
#[derive(Debug, Clone)]
pub struct DateRangeFilter {
    span: DateSpan,
    buffer: Duration,
    evaluated_at: DateTime<Utc>,
}

impl DateRangeFilter {
    pub fn new(span: DateSpan, buffer: Duration) -> Result<Self, CollectError> {
        if buffer < Duration::zero() {
            return Err(CollectError::InvalidArgument(
                "date filter buffer must be >= 0".into(),
            ));
        }
        Ok(Self {
            span,
            buffer,
            evaluated_at: Utc::now(),
        })
    }

    pub fn with_buffer_hours(span: DateSpan, hours: f64) -> Result<Self, CollectError> {
        Self::new(span, buffer_from_hours(hours)?)
    }

    /// Zero-tolerance filter. Only for callers that asked for an exact span.
    pub fn exact(span: DateSpan) -> Self {
        Self {
            span,
            buffer: Duration::zero(),
            evaluated_at: Utc::now(),
        }
    }

    /// Instant used to classify future-dated items (defaults to creation time).
    pub fn evaluated_at(mut self, now: DateTime<Utc>) -> Self {
        self.evaluated_at = now;
        self
    }

    /// Effective inclusive bounds after widening.
    pub fn bounds(&self) -> DateSpan {
        self.span.widened(self.buffer)
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    /// Filter `items` and return the survivors with a fresh report.
    pub fn apply(&self, items: Vec<Item>, debug: bool) -> (Vec<Item>, FilterReport) {
        let mut report = FilterReport::new(items.len(), debug);
        let kept = self.apply_into(items, &mut report);
        (kept, report)
    }

    /// Filter `items`, accounting into an existing report.
    pub fn apply_into(&self, items: Vec<Item>, report: &mut FilterReport) -> Vec<Item> {
        let bounds = self.bounds();
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let Some(at) = item.created_at() else {
                report.record(Exclusion::InvalidTimestamp, &item.id);
                continue;
            };
            report.observe(at);
            if !bounds.contains(at) {
                report.record(Exclusion::Date, &item.id);
                continue;
            }
            if at > self.evaluated_at {
                report.future_dated += 1;
            }
            kept.push(item);
        }
        report.final_count = kept.len();
        kept
    }
}
