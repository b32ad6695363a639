// src/item.rs
//! Retrieved content items and the instant intervals they are filtered against.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CollectError;

/// Post or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Post,
    Comment,
}

/// Creation time as the content API delivered it.
///
/// Kept raw so that a bad value is reported as "invalid timestamp" by the
/// date filter instead of failing deserialization of the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Unix seconds (`created_utc` style, may carry a fraction).
    Epoch(f64),
    /// RFC 3339 text or a numeric string.
    Text(String),
    /// Any other JSON shape (bool, object, array). Never resolves.
    Other(serde_json::Value),
}

impl RawTimestamp {
    /// Resolve to an absolute instant; `None` when the value is unusable.
    pub fn to_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Epoch(secs) => epoch_to_instant(*secs),
            RawTimestamp::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return None;
                }
                if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
                    return Some(dt.with_timezone(&Utc));
                }
                t.parse::<f64>().ok().and_then(epoch_to_instant)
            }
            RawTimestamp::Other(_) => None,
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Text(dt.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}

fn epoch_to_instant(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp(whole as i64, nanos)
}

/// A retrieved post or comment. Immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub kind: ItemKind,
    /// Comments carry an empty title; their text lives in `body`.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub created: Option<RawTimestamp>,
    /// Scope the item was retrieved from, e.g. a subreddit name.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Item {
    pub fn post(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Post,
            title: title.into(),
            body: None,
            score: 0,
            num_comments: 0,
            created: None,
            scope: None,
            author: None,
            url: None,
        }
    }

    pub fn comment(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Comment,
            body: Some(body.into()),
            ..Self::post(id, "")
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn with_comments(mut self, n: u64) -> Self {
        self.num_comments = n;
        self
    }

    pub fn with_created(mut self, at: impl Into<RawTimestamp>) -> Self {
        self.created = Some(at.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Creation instant, or `None` when absent or unparsable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created.as_ref().and_then(RawTimestamp::to_instant)
    }

    /// Title and body joined for text matching (absent body = empty).
    pub fn text(&self) -> String {
        match self.body.as_deref() {
            Some(b) if !b.is_empty() && !self.title.is_empty() => format!("{} {}", self.title, b),
            Some(b) if !b.is_empty() => b.to_string(),
            _ => self.title.clone(),
        }
    }
}

/// Closed instant interval `[from, to]`, `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl DateSpan {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, CollectError> {
        if from > to {
            return Err(CollectError::InvalidArgument(format!(
                "date span starts after it ends ({from} > {to})"
            )));
        }
        Ok(Self { from, to })
    }

    /// `[now - days, now]`. Saturates at the earliest representable instant.
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            from: now
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            to: now,
        }
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// Whole days covered, rounded down.
    pub fn day_span(&self) -> i64 {
        (self.to - self.from).num_days()
    }

    /// Span extended by `buffer` on both ends. Saturates at the representable range.
    pub fn widened(&self, buffer: Duration) -> Self {
        Self {
            from: self.from.checked_sub_signed(buffer).unwrap_or(DateTime::<Utc>::MIN_UTC),
            to: self.to.checked_add_signed(buffer).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }
}
