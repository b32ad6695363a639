// src/keywords.rs
//! Case-insensitive OR keyword matching over title + body.

use crate::date_filter::{Exclusion, FilterReport};
use crate::item::Item;

/// Pre-lowercased keyword set. An empty set matches everything.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    needles: Vec<String>,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut needles: Vec<String> = Vec::new();
        for k in keywords {
            let k = k.as_ref().trim().to_lowercase();
            if !k.is_empty() && !needles.contains(&k) {
                needles.push(k);
            }
        }
        Self { needles }
    }

    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.needles
    }

    /// True if any keyword occurs in the item's title or body.
    pub fn matches(&self, item: &Item) -> bool {
        if self.needles.is_empty() {
            return true;
        }
        let hay = item.text().to_lowercase();
        self.needles.iter().any(|k| hay.contains(k.as_str()))
    }

    /// Keep matching items in order, accounting the rest into `report`.
    pub fn apply_into(&self, items: Vec<Item>, report: &mut FilterReport) -> Vec<Item> {
        if self.needles.is_empty() {
            return items;
        }
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if self.matches(&item) {
                kept.push(item);
            } else {
                report.record(Exclusion::Keyword, &item.id);
            }
        }
        report.final_count = kept.len();
        kept
    }
}

/// One-shot form of [`KeywordMatcher::matches`].
pub fn matches<S: AsRef<str>>(item: &Item, keywords: &[S]) -> bool {
    KeywordMatcher::new(keywords).matches(item)
}

/// Remote query string: keywords joined with ` OR `.
pub fn search_query<S: AsRef<str>>(keywords: &[S]) -> String {
    keywords
        .iter()
        .map(|k| k.as_ref().trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(" OR ")
}
