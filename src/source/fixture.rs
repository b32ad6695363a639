// src/source/fixture.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::error::SourceError;
use crate::item::Item;
use crate::keywords::KeywordMatcher;
use crate::ranker::{rank, RankBy};
use crate::source::{ContentSource, SearchQuery, SortKind};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureDoc {
    Wrapped {
        #[serde(default)]
        now: Option<DateTime<Utc>>,
        items: Vec<Item>,
    },
    Bare(Vec<Item>),
}

/// Content source that serves items from a JSON document.
///
/// Accepts either a bare array of items or `{"now": <rfc3339>, "items": [...]}`.
/// `now` anchors the time windows; without it the wall clock is used.
/// No HTTP; parsing happens per call so a broken document surfaces as
/// [`SourceError::Malformed`].
pub struct FixtureSource {
    pub json_content: String,
}

impl FixtureSource {
    pub fn from_fixture(content: &str) -> Self {
        Self {
            json_content: content.to_string(),
        }
    }

    pub fn from_items(items: &[Item]) -> Result<Self, SourceError> {
        Ok(Self {
            json_content: serde_json::to_string(items)?,
        })
    }

    /// Anchor instant declared by the document, if any.
    pub fn anchor(&self) -> Result<Option<DateTime<Utc>>, SourceError> {
        Ok(self.parse()?.0)
    }

    fn parse(&self) -> Result<(Option<DateTime<Utc>>, Vec<Item>), SourceError> {
        let doc: FixtureDoc = serde_json::from_str(&self.json_content)?;
        Ok(match doc {
            FixtureDoc::Wrapped { now, items } => (now, items),
            FixtureDoc::Bare(items) => (None, items),
        })
    }
}

fn sort_key(sort: SortKind) -> RankBy {
    match sort {
        SortKind::Hot | SortKind::Top | SortKind::Relevance => RankBy::Score,
        SortKind::New | SortKind::Rising => RankBy::Recency,
        SortKind::Comments => RankBy::CommentCount,
    }
}

#[async_trait]
impl ContentSource for FixtureSource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Item>, SourceError> {
        let t0 = std::time::Instant::now();
        let (anchor, items) = self.parse()?;
        let now = anchor.unwrap_or_else(Utc::now);

        if let Some(scope) = query.scope.as_deref() {
            let known = items
                .iter()
                .any(|it| it.scope.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(scope)));
            if !known {
                return Err(SourceError::ScopeNotFound(scope.to_string()));
            }
        }

        let matcher = KeywordMatcher::new(query.query.split(" OR "));
        let cutoff = query.window.lookback().map(|lb| now - lb);

        let selected: Vec<Item> = items
            .into_iter()
            .filter(|it| it.kind == query.kind)
            .filter(|it| match query.scope.as_deref() {
                Some(scope) => it.scope.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(scope)),
                None => true,
            })
            .filter(|it| matcher.matches(it))
            // The remote does not validate timestamps; undated items pass the window.
            .filter(|it| match (cutoff, it.created_at()) {
                (Some(c), Some(at)) => at >= c,
                _ => true,
            })
            .collect();

        let out = rank(selected, sort_key(query.sort), query.limit);

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("fixture_search_ms").record(ms);
        counter!("fixture_items_served_total").increment(out.len() as u64);

        Ok(out)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
