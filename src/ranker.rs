// src/ranker.rs
//! Stable descending ranking with truncation after sorting.
//!
//! Ties keep arrival order (`sort_by` is stable), which makes fixtures
//! reproducible.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    Score,
    CommentCount,
    Recency,
}

impl RankBy {
    /// Sort key for an item under this criterion. Items without a usable
    /// timestamp rank last by recency.
    pub fn key(&self, item: &Item) -> f64 {
        match self {
            RankBy::Score => item.score as f64,
            RankBy::CommentCount => item.num_comments as f64,
            RankBy::Recency => item
                .created_at()
                .map(|t| t.timestamp_millis() as f64)
                .unwrap_or(f64::NEG_INFINITY),
        }
    }
}

/// Sort `items` descending by `by` and keep the first `limit`.
pub fn rank(items: Vec<Item>, by: RankBy, limit: usize) -> Vec<Item> {
    rank_with(items, limit, |it| by.key(it))
}

/// Generic form for derived records (e.g. per-author aggregates).
pub fn rank_with<T, F>(mut items: Vec<T>, limit: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| desc(key(a), key(b)));
    items.truncate(limit);
    items
}

fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
