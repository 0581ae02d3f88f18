//! Secondary calls whose failure must never fail the request that issued them.

use std::fmt::Display;
use std::future::Future;

/// Outcome of a best-effort call.
///
/// Callers read it to log or to pass an optional id along, never to branch on.
#[derive(Debug, Clone, PartialEq)]
pub enum BestEffort<T> {
    Done(T),
    Failed(String),
}

impl<T> BestEffort<T> {
    /// Awaits `task`, logging a failure under `label` instead of propagating it.
    pub async fn run<E, F>(label: &str, task: F) -> Self
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        match task.await {
            Ok(value) => {
                tracing::debug!("{} succeeded", label);
                BestEffort::Done(value)
            }
            Err(err) => {
                tracing::warn!("{} failed (ignored): {}", label, err);
                BestEffort::Failed(err.to_string())
            }
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            BestEffort::Done(value) => Some(value),
            BestEffort::Failed(_) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, BestEffort::Done(_))
    }
}
