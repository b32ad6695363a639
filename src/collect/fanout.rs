// src/collect/fanout.rs
//! Bounded concurrent remote calls with a join barrier and a deadline.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

/// Outcome of a fan-out: finished branches in branch order, plus the
/// branches still in flight when the deadline hit (already abandoned).
pub(crate) struct FanOut<T> {
    pub done: Vec<(usize, Result<T, SourceError>)>,
    pub unfinished: Vec<usize>,
}

impl<T> FanOut<T> {
    pub fn timed_out(&self) -> bool {
        !self.unfinished.is_empty()
    }
}

/// Run `call(0..count)` with at most `concurrency` in flight and wait for
/// all of them, or until `deadline` elapses.
pub(crate) async fn fan_out<T, F, Fut>(
    count: usize,
    concurrency: usize,
    deadline: Duration,
    call: F,
) -> FanOut<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut branches = stream::iter((0..count).map(|i| {
        let fut = call(i);
        async move { (i, fut.await) }
    }))
    .buffer_unordered(concurrency.max(1));

    let until = tokio::time::Instant::now() + deadline;
    let mut done = Vec::with_capacity(count);
    while let Ok(Some(branch)) = tokio::time::timeout_at(until, branches.next()).await {
        done.push(branch);
    }
    // dropping the stream cancels whatever is still pending
    drop(branches);

    done.sort_by_key(|(i, _)| *i);
    let finished: HashSet<usize> = done.iter().map(|(i, _)| *i).collect();
    let unfinished = (0..count).filter(|i| !finished.contains(i)).collect();

    FanOut { done, unfinished }
}
