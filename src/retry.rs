//! Bounded retries of recoverable checks.
//!
//! A check is tried up to `max_attempts` times. Between attempts the operator
//! may be asked to continue; a cancel ends the loop at once. When the budget
//! is spent, the details of the last failed attempt become the step report.

use tracing::{debug, warn};

use crate::bench::Bench;
use crate::config::RetrySettings;
use crate::error::{Error, Result};
use crate::operator::Color;
use crate::steps::StepContext;

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// The check passed.
    Done(T),
    /// The check failed in a way worth retrying.
    Retry {
        /// Shown to the operator after the attempt.
        reason: String,
        /// Report lines if this was the last attempt.
        details: Vec<String>,
    },
}

impl<T> Attempt<T> {
    /// Retry whose report is the reason itself.
    pub fn retry(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Attempt::Retry {
            details: vec![reason.clone()],
            reason,
        }
    }
}

/// How many times to try and whether to ask in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts, first one included.
    pub max_attempts: u32,
    /// Ask the operator before each new attempt.
    pub ask_operator: bool,
}

impl RetryPolicy {
    /// Retries the operator has to confirm.
    pub const fn confirmed(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ask_operator: true,
        }
    }

    /// Retries without asking.
    pub const fn automatic(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ask_operator: false,
        }
    }

    /// Operator-confirmed policy from the settings.
    pub fn from_settings(retry: &RetrySettings) -> Self {
        Self::confirmed(retry.max_attempts)
    }

    /// Run `attempt` until it is done, the budget is spent or the operator
    /// cancels.
    ///
    /// `attempt` receives the 1-based attempt number. An `Err` from it is not
    /// retried.
    ///
    /// # Errors
    ///
    /// [`Error::Failed`] with the last attempt's details when no attempt
    /// succeeded.
    pub fn run<T, F>(
        &self,
        bench: &mut Bench,
        ctx: &mut StepContext<'_>,
        title: &str,
        mut attempt: F,
    ) -> Result<T>
    where
        F: FnMut(&mut Bench, &mut StepContext<'_>, u32) -> Result<Attempt<T>>,
    {
        let max = self.max_attempts.max(1);
        let mut number = 1;
        loop {
            if number > 1 {
                ctx.log(format!("Attempt {}/{}", number, max), Color::Yellow);
            }

            let (reason, details) = match attempt(bench, ctx, number)? {
                Attempt::Done(value) => {
                    debug!(check = title, attempt = number, "check passed");
                    return Ok(value);
                }
                Attempt::Retry { reason, details } => (reason, details),
            };

            warn!(check = title, attempt = number, reason = %reason, "check failed");
            ctx.log(&reason, Color::Red);
            if number >= max {
                return Err(Error::Failed(details));
            }

            if self.ask_operator {
                let message = format!(
                    "{}\nAttempt {}/{}.\nRetry? (press Enter to continue or cancel)",
                    reason, number, max
                );
                if bench.prompt.request_input(title, &message).is_none() {
                    return Err(Error::Failed(details));
                }
            }
            number += 1;
        }
    }
}
