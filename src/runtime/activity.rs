//! Activity scheduling: turning an activity call into a command and a future.

use std::time::Duration;

use crate::command::CommandKind;
use crate::error::WorkflowError;
use crate::futures::DurableFuture;
use crate::payload::{DefaultConverter, IntoPayloads};
use crate::runtime::context::WorkflowContext;
use crate::runtime::limits::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use crate::runtime::state::CompletionKind;
use crate::runtime::timers;
use crate::workflow_warn;

/// Wait between failed attempts of a retried activity.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Retry immediately.
    None,
    Fixed { delay: Duration },
    /// `base * attempt`, capped at `max`.
    Linear { base: Duration, max: Duration },
    /// `base * multiplier^(attempt - 1)`, capped at `max`.
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::None => Duration::ZERO,
            BackoffStrategy::Fixed { delay } => *delay,
            BackoffStrategy::Linear { base, max } => base.saturating_mul(attempt).min(*max),
            BackoffStrategy::Exponential { base, multiplier, max } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let nanos = base.as_nanos() as f64 * multiplier.powi(exponent);
                if !nanos.is_finite() || nanos >= max.as_nanos() as f64 {
                    *max
                } else {
                    Duration::from_nanos(nanos.round().max(0.0) as u64)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffStrategy::Fixed { delay: DEFAULT_BACKOFF },
        }
    }
}

impl RetryOptions {
    /// # Panics
    ///
    /// If `max_attempts` is zero.
    pub fn new(max_attempts: u32) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivityOptions {
    pub retry_options: RetryOptions,
}

impl ActivityOptions {
    pub fn with_retry(retry_options: RetryOptions) -> Self {
        Self { retry_options }
    }
}

/// Schedule one execution of `activity`.
///
/// The returned future resolves with the activity's result or failure once the
/// completion event is replayed. If `args` cannot be converted, the future is
/// already resolved with a conversion error and no command is produced.
/// `options` only matter to [`execute_activity_with_retry`].
pub fn execute_activity(
    ctx: &WorkflowContext,
    _options: &ActivityOptions,
    activity: &str,
    args: impl IntoPayloads,
) -> DurableFuture {
    let inputs = match args.into_payloads(&DefaultConverter::default()) {
        Ok(inputs) => inputs,
        Err(e) => return DurableFuture::resolved(Err(WorkflowError::conversion("execute_activity", e))),
    };
    let kind = CommandKind::ScheduleActivityTask {
        name: activity.to_string(),
        version: String::new(),
        inputs,
    };
    ctx.schedule_command(
        kind,
        CompletionKind::Activity {
            name: activity.to_string(),
        },
    )
}

/// Execute `activity` up to `options.retry_options.max_attempts` times.
///
/// Runs as its own logical task. Each attempt is a separate command with a
/// fresh event id, and the wait between attempts is a durable timer, so replay
/// reproduces the same attempts without sleeping. Cancellation and conversion
/// failures end the loop immediately; otherwise the last failure is reported.
pub fn execute_activity_with_retry(
    ctx: &WorkflowContext,
    options: &ActivityOptions,
    activity: &str,
    args: impl IntoPayloads,
) -> DurableFuture {
    let outer = DurableFuture::new();
    let inputs = match args.into_payloads(&DefaultConverter::default()) {
        Ok(inputs) => inputs,
        Err(e) => {
            outer.set(Err(WorkflowError::conversion("execute_activity_with_retry", e)));
            return outer;
        }
    };

    let max_attempts = options.retry_options.max_attempts.max(1);
    let backoff = options.retry_options.backoff.clone();
    let attempt_options = options.clone();
    let name = activity.to_string();
    let task_ctx = ctx.clone();
    let resolve = outer.clone();

    ctx.spawner().spawn(format!("retry:{activity}"), async move {
        let mut attempt = 1;
        let result = loop {
            if task_ctx.is_canceled() {
                break Err(WorkflowError::Canceled);
            }
            let error = match execute_activity(&task_ctx, &attempt_options, &name, inputs.clone())
                .result()
                .await
            {
                Ok(value) => break Ok(value),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => break Err(e),
                Err(e) => e,
            };

            let delay = backoff.delay_for_attempt(attempt);
            workflow_warn!(
                task_ctx,
                activity = %name,
                attempt,
                max_attempts,
                delay_ms = timers::delay_millis(delay),
                error = %error,
                "activity attempt failed, retrying"
            );
            if !delay.is_zero()
                && let Err(e) = timers::sleep(&task_ctx, delay).await
            {
                break Err(e);
            }
            attempt += 1;
        };
        resolve.set(result);
    });

    outer
}
