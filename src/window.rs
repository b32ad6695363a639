// src/window.rs
//! Coarse remote time windows and the day-span → window mapping.
//!
//! The content API only accepts a fixed set of time filters. We pick the
//! narrowest window that still covers the requested span and narrow further
//! on the client side.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CollectError;

/// Remote time filter, ordered by breadth (`Day < Week < ... < All`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    /// Value the remote API expects (`t=` parameter).
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }

    /// Approximate look-back the remote applies; `None` for `All`.
    pub fn lookback(&self) -> Option<Duration> {
        match self {
            TimeWindow::Day => Some(Duration::days(1)),
            TimeWindow::Week => Some(Duration::days(7)),
            TimeWindow::Month => Some(Duration::days(30)),
            TimeWindow::Year => Some(Duration::days(365)),
            TimeWindow::All => None,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a requested span in whole days to a remote window.
///
/// | days    | window |
/// |---------|--------|
/// | 0–2     | day    |
/// | 3–13    | week   |
/// | 14–29   | month  |
/// | 30–364  | year   |
/// | ≥365    | all    |
pub fn select_time_window(day_span: i64) -> Result<TimeWindow, CollectError> {
    let w = match day_span {
        d if d < 0 => {
            return Err(CollectError::InvalidArgument(format!(
                "day span must be >= 0, got {d}"
            )))
        }
        0..=2 => TimeWindow::Day,
        3..=13 => TimeWindow::Week,
        14..=29 => TimeWindow::Month,
        30..=364 => TimeWindow::Year,
        _ => TimeWindow::All,
    };
    Ok(w)
}
