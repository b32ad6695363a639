// src/source/mod.rs
//! Boundary to the remote content API.
//!
//! The collector only sees this trait; the HTTP client that implements it
//! lives outside this crate. [`fixture::FixtureSource`] serves canned items.

pub mod fixture;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::item::{Item, ItemKind};
use crate::window::TimeWindow;

/// Remote sort order, passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
    Hot,
    New,
    #[default]
    Top,
    Rising,
    Relevance,
    Comments,
}

impl SortKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKind::Hot => "hot",
            SortKind::New => "new",
            SortKind::Top => "top",
            SortKind::Rising => "rising",
            SortKind::Relevance => "relevance",
            SortKind::Comments => "comments",
        }
    }
}

/// One remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// OR-joined keyword query; empty means "list the scope".
    pub query: String,
    /// `None` targets the unscoped/global space.
    pub scope: Option<String>,
    pub kind: ItemKind,
    pub sort: SortKind,
    pub window: TimeWindow,
    pub limit: usize,
}

impl SearchQuery {
    pub fn listing(scope: Option<&str>, sort: SortKind, window: TimeWindow, limit: usize) -> Self {
        Self {
            query: String::new(),
            scope: scope.map(str::to_string),
            kind: ItemKind::Post,
            sort,
            window,
            limit,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    /// Scope label for logs and errors.
    pub fn scope_label(&self) -> &str {
        self.scope.as_deref().unwrap_or("all")
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Item>, SourceError>;
    fn name(&self) -> &'static str;
}
