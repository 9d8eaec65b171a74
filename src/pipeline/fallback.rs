//! Ordered fallback strategies.
//!
//! A [`FallbackChain`] tries named strategies in order and returns the first
//! success. Every failure is logged and kept; when all strategies fail the
//! chain returns [`AppError::Exhausted`] listing each reason.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::{AppError, Result};

/// Boxed future produced by one strategy.
pub type StrategyFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

type Strategy<'a, T> = Box<dyn FnOnce() -> StrategyFuture<'a, T> + Send + 'a>;

/// Failure of one strategy, kept for the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    /// Strategy name.
    pub strategy: &'static str,
    /// Rendered error.
    pub reason: String,
}

/// Named strategies tried in order until one succeeds.
pub struct FallbackChain<'a, T> {
    stage: &'static str,
    strategies: Vec<(&'static str, Strategy<'a, T>)>,
}

impl<'a, T: Send + 'a> FallbackChain<'a, T> {
    /// Empty chain for `stage` (used in logs and the exhaustion error).
    #[must_use]
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy.
    #[must_use]
    pub fn then<F>(mut self, name: &'static str, strategy: F) -> Self
    where
        F: FnOnce() -> StrategyFuture<'a, T> + Send + 'a,
    {
        self.strategies.push((name, Box::new(strategy)));
        self
    }

    /// Number of strategies in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the chain has no strategies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run strategies in order; first success wins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Exhausted` when every strategy failed (or the chain
    /// was empty).
    pub async fn run(self) -> Result<T> {
        let stage = self.stage;
        let mut failures: Vec<StrategyFailure> = Vec::new();

        for (strategy, attempt) in self.strategies {
            debug!(stage, strategy, "trying strategy");
            match attempt().await {
                Ok(value) => {
                    if !failures.is_empty() {
                        debug!(stage, strategy, failed = failures.len(), "fallback strategy succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    warn!(stage, strategy, %err, "strategy failed");
                    failures.push(StrategyFailure {
                        strategy,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(exhausted(stage, &failures))
    }
}

fn exhausted(stage: &str, failures: &[StrategyFailure]) -> AppError {
    if failures.is_empty() {
        return AppError::Exhausted(format!("{stage}: no strategies configured"));
    }
    let reasons = failures
        .iter()
        .map(|failure| format!("{}: {}", failure.strategy, failure.reason))
        .collect::<Vec<_>>()
        .join("; ");
    AppError::Exhausted(format!("{stage}: {reasons}"))
}
