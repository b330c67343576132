//! Bounded retry with fixed or exponential backoff.
//!
//! [`RetryExecutor::execute`] runs an operation up to `retry_total + 1`
//! times. Attempts are strictly sequential: the next attempt only starts
//! after the previous failure was classified and its backoff slept out.
//! The backoff sleep is the executor's only suspension point besides the
//! operation itself.
//!
//! Order of checks after a failed attempt:
//!
//! 1. abort signals (`IterationStopped`, `MissingDependency`) propagate;
//! 2. the error is classified, non-retryable errors propagate;
//! 3. the retry count is checked, exhaustion ends the call;
//! 4. only then is the deadline checked against the next backoff.
//!
//! An attempt that both exhausts the retry count and would overrun the
//! deadline therefore reports exhaustion.

use super::config::RetryMode;
use super::errors::{ServiceBusError, ServiceBusResult};
use super::events::{HandlerEvent, HandlerEventSink};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Backoff parameters copied out of the handler configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub retry_total: u32,
    pub mode: RetryMode,
    /// Seconds.
    pub backoff_factor: f64,
    /// Seconds.
    pub backoff_max: f64,
}

impl RetryPolicy {
    /// Backoff in seconds before retry number `retried_times`.
    pub fn backoff_delay(&self, retried_times: u32) -> f64 {
        get_backoff_time(
            self.mode,
            self.backoff_factor,
            self.backoff_max,
            retried_times,
        )
    }
}

/// Deterministic backoff, clamped to `[0, backoff_max]`.
///
/// # Examples
///
/// ```no_run
/// use servicebus::handler::{RetryMode, get_backoff_time};
///
/// assert_eq!(get_backoff_time(RetryMode::Exponential, 0.8, 120.0, 1), 1.6);
/// assert_eq!(get_backoff_time(RetryMode::Fixed, 0.8, 120.0, 5), 0.8);
/// assert_eq!(get_backoff_time(RetryMode::Exponential, 0.8, 120.0, 10), 120.0);
/// ```
pub fn get_backoff_time(
    mode: RetryMode,
    backoff_factor: f64,
    backoff_max: f64,
    retried_times: u32,
) -> f64 {
    let value = match mode {
        RetryMode::Fixed => backoff_factor,
        RetryMode::Exponential => {
            let exponent = i32::try_from(retried_times).unwrap_or(i32::MAX);
            backoff_factor * 2f64.powi(exponent)
        }
    };
    let upper = backoff_max.max(0.0);
    // NaN compares false everywhere; treat it as no delay
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, upper)
}

/// What an attempt is told about the call it belongs to.
#[derive(Clone, Debug, Default)]
pub struct RetryContext {
    /// Zero based attempt index.
    pub attempt: u32,
    /// Remaining budget, set only when the call has a deadline.
    pub timeout: Option<Duration>,
    /// Previous classified error, when the caller asked for it.
    pub last_error: Option<ServiceBusError>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RetryOptions {
    /// Overall budget for all attempts together.
    pub timeout: Option<Duration>,
    /// The deadline only applies when this is set.
    pub operation_requires_timeout: bool,
    /// Hand the previous classified error to the next attempt.
    pub require_last_error: bool,
}

impl RetryOptions {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            operation_requires_timeout: true,
            require_last_error: false,
        }
    }
}

/// Classifies a failed attempt.
///
/// `Ok(error)` means the error may be retried; `Err(error)` ends the call
/// immediately with that error.
#[async_trait]
pub trait ExceptionHandler: Send + Sync {
    async fn handle_exception(
        &self,
        error: ServiceBusError,
    ) -> Result<ServiceBusError, ServiceBusError>;
}

/// Runs operations under a [`RetryPolicy`].
pub struct RetryExecutor {
    policy: RetryPolicy,
    entity_name: String,
    events: Arc<dyn HandlerEventSink>,
}

impl RetryExecutor {
    pub fn new(
        policy: RetryPolicy,
        entity_name: impl Into<String>,
        events: Arc<dyn HandlerEventSink>,
    ) -> Self {
        Self {
            policy,
            entity_name: entity_name.into(),
            events,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `operation` until it succeeds, fails terminally, or the
    /// retry budget or deadline is spent.
    ///
    /// The caller sees either the result or exactly one error: the last
    /// classified failure. A timeout that ends the call is wrapped with
    /// remediation guidance and keeps the original as its cause.
    pub async fn execute<T, F, Fut, H>(
        &self,
        handler: &H,
        options: RetryOptions,
        mut operation: F,
    ) -> ServiceBusResult<T>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = ServiceBusResult<T>>,
        H: ExceptionHandler + ?Sized,
    {
        let deadline = match (options.operation_requires_timeout, options.timeout) {
            (true, Some(timeout)) if !timeout.is_zero() => Some(Instant::now() + timeout),
            _ => None,
        };
        let max_retries = self.policy.retry_total;
        let mut retried_times: u32 = 0;
        let mut last_error: Option<ServiceBusError> = None;

        loop {
            let context = RetryContext {
                attempt: retried_times,
                timeout: deadline.map(|d| d.saturating_duration_since(Instant::now())),
                last_error: if options.require_last_error {
                    last_error.take()
                } else {
                    None
                },
            };

            let error = match operation(context).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_abort_signal() => return Err(error),
                Err(error) => error,
            };

            let error = handler.handle_exception(error).await?;
            retried_times += 1;

            if retried_times > max_retries {
                self.events.emit(&HandlerEvent::RetryExhausted {
                    entity: &self.entity_name,
                    attempts: retried_times,
                    error: &error,
                });
                return Err(terminal_error(error));
            }

            self.backoff(retried_times, &error, deadline).await?;
            last_error = Some(error);
        }
    }

    async fn backoff(
        &self,
        retried_times: u32,
        last_error: &ServiceBusError,
        deadline: Option<Instant>,
    ) -> ServiceBusResult<()> {
        let backoff = self.policy.backoff_delay(retried_times);
        let delay = Duration::try_from_secs_f64(backoff).unwrap_or(Duration::ZERO);

        let fits_deadline = deadline.is_none_or(|deadline| Instant::now() + delay <= deadline);
        if backoff <= self.policy.backoff_max && fits_deadline {
            self.events.emit(&HandlerEvent::Retrying {
                entity: &self.entity_name,
                attempt: retried_times,
                delay,
                error: last_error,
            });
            sleep(delay).await;
            return Ok(());
        }

        self.events.emit(&HandlerEvent::RetryTimedOut {
            entity: &self.entity_name,
            error: last_error,
        });
        Err(terminal_error(last_error.clone()))
    }
}

fn terminal_error(error: ServiceBusError) -> ServiceBusError {
    if error.is_timeout() {
        ServiceBusError::timeout_with_remediation(error)
    } else {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_doubles() {
        let policy = RetryPolicy {
            retry_total: 3,
            mode: RetryMode::Exponential,
            backoff_factor: 0.5,
            backoff_max: 60.0,
        };
        assert_eq!(policy.backoff_delay(0), 0.5);
        assert_eq!(policy.backoff_delay(1), 1.0);
        assert_eq!(policy.backoff_delay(2), 2.0);
        assert_eq!(policy.backoff_delay(3), 4.0);
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        for retried_times in 0..10 {
            assert_eq!(get_backoff_time(RetryMode::Fixed, 2.0, 60.0, retried_times), 2.0);
        }
    }

    #[test]
    fn test_backoff_is_clamped() {
        assert_eq!(get_backoff_time(RetryMode::Exponential, 0.8, 5.0, 10), 5.0);
        assert_eq!(get_backoff_time(RetryMode::Fixed, 10.0, 5.0, 0), 5.0);
        assert_eq!(get_backoff_time(RetryMode::Exponential, 1.0, 30.0, u32::MAX), 30.0);
        assert_eq!(get_backoff_time(RetryMode::Fixed, -1.0, 5.0, 0), 0.0);
    }
}
