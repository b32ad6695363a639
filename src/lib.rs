// src/lib.rs
// Public library surface for the collector binary and integration tests.

pub mod collect;
pub mod config;
pub mod date_filter;
pub mod error;
pub mod item;
pub mod keywords;
pub mod ranker;
pub mod source;
pub mod telemetry;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::collect::{
    Clock, Collection, Collector, DateRange, KeywordSearch, PopularPick, TrendingRequest,
    UserActivity, UserActivityRequest,
};
pub use crate::config::CollectorConfig;
pub use crate::date_filter::{DateRangeFilter, FilterReport};
pub use crate::error::{CollectError, ScopeFailure, SourceError};
pub use crate::item::{DateSpan, Item, ItemKind, RawTimestamp};
pub use crate::keywords::KeywordMatcher;
pub use crate::ranker::{rank, RankBy};
pub use crate::source::{ContentSource, SearchQuery, SortKind};
pub use crate::window::{select_time_window, TimeWindow};
