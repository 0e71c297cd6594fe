//! Bounded polling that turns eventual consistency into a converging view.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::CarrierConfig;
use crate::error::{RideError, RideResult};

/// Outcome of a reconciliation: the last value observed and whether it satisfied the predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T> {
    pub value: Option<T>,
    pub attempts: u32,
    pub converged: bool,
}

impl<T> Reconciled<T> {
    /// Treat exhaustion as [`RideError::ConsistencyTimeout`].
    pub fn into_result(self) -> RideResult<T> {
        match self.value {
            Some(value) if self.converged => Ok(value),
            _ => Err(RideError::ConsistencyTimeout {
                attempts: self.attempts,
            }),
        }
    }

    /// The last observed value, converged or not.
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Poll a read until it satisfies a predicate or the attempt budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    attempts: u32,
    backoff: Duration,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::from_config(&CarrierConfig::default())
    }
}

impl Reconciler {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Reconciler {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &CarrierConfig) -> Self {
        Self::new(config.reconcile_attempts, config.reconcile_backoff)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `probe` up to `attempts` times, sleeping `backoff` between tries.
    ///
    /// A probe error counts as a non-converged attempt and keeps the last
    /// good value. Exhaustion is not an error here; see
    /// [`Reconciled::into_result`].
    pub async fn poll<T, E, F, Fut, P>(&self, mut probe: F, predicate: P) -> Reconciled<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&T) -> bool,
    {
        let mut last = None;
        for attempt in 1..=self.attempts {
            match probe().await {
                Ok(value) => {
                    if predicate(&value) {
                        return Reconciled {
                            value: Some(value),
                            attempts: attempt,
                            converged: true,
                        };
                    }
                    last = Some(value);
                }
                Err(err) => debug!(attempt, error = %err, "reconcile probe failed"),
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }

        debug!(attempts = self.attempts, "reconciliation budget exhausted");
        Reconciled {
            value: last,
            attempts: self.attempts,
            converged: false,
        }
    }
}
