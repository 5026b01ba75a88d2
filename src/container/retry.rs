//! Bounded retry for remote runtime calls
//!
//! Constant-rate: attempts are issued back to back with no delay.

use chrono_machines::retry::RetryErrorKind;
use chrono_machines::{ConstantBackoff, Retryable};

use crate::error::{Error, Result};

/// Retry policy with a fixed attempt budget
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    backoff: ConstantBackoff,
}

impl Retry {
    /// Create a retry policy; at least one attempt is required
    pub fn new(max_attempts: u8) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::ConfigValidation(
                "retries must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            backoff: ConstantBackoff::new().delay_ms(0).max_attempts(max_attempts),
        })
    }

    /// Run `op` until it succeeds or the attempt budget is spent
    ///
    /// Permanent errors (see [`Error::is_permanent`]) are returned as-is
    /// without consuming the remaining attempts.
    pub fn run<T, F>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let max_attempts = self.backoff.max_attempts;
        let name = operation.to_string();

        let result = op
            .retry(self.backoff)
            .when(|e| !e.is_permanent())
            .notify(move |ctx| {
                if let Some(e) = ctx.error {
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}",
                        name,
                        ctx.attempt,
                        max_attempts,
                        e
                    );
                }
            })
            .call();

        match result {
            Ok(outcome) => Ok(outcome.into_inner()),
            Err(err) => {
                let kind = err.kind();
                let attempts = err.attempts();
                let cause = err.into_cause();

                match (kind, cause) {
                    (RetryErrorKind::PredicateRejected, Some(e)) => Err(e),
                    (_, cause) => {
                        let last = cause.map(|e| e.to_string()).unwrap_or_default();
                        tracing::warn!(
                            "{} failed (attempt {}/{}): {}",
                            operation,
                            attempts,
                            max_attempts,
                            last
                        );
                        Err(Error::RetryExhausted {
                            operation: operation.to_string(),
                            attempts,
                            last,
                        })
                    }
                }
            }
        }
    }
}
