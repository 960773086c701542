//! Durable in-workflow timers.
//!
//! A timer is a `ScheduleTimer` command resolved by a `TimerFired` event. The
//! host decides when the timer fires; replay never waits on a clock.

use std::future::Future;
use std::time::Duration;

use crate::command::CommandKind;
use crate::error::WorkflowError;
use crate::futures::DurableFuture;
use crate::runtime::context::WorkflowContext;
use crate::runtime::state::CompletionKind;

/// Whole milliseconds, saturating. History records timer delays at this resolution.
pub(crate) fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Schedule a timer. The future resolves with an empty payload when it fires,
/// or with [`WorkflowError::Canceled`] if canceled before being recorded.
pub fn schedule_timer(ctx: &WorkflowContext, delay: Duration) -> DurableFuture {
    let kind = CommandKind::ScheduleTimer {
        delay_ms: delay_millis(delay),
    };
    ctx.schedule_command(kind, CompletionKind::Timer)
}

/// Suspend the calling task until a timer of `delay` fires.
pub fn sleep(ctx: &WorkflowContext, delay: Duration) -> impl Future<Output = Result<(), WorkflowError>> + Send + use<> {
    schedule_timer(ctx, delay).wait()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_are_recorded_in_millis() {
        assert_eq!(delay_millis(Duration::from_secs(2)), 2000);
        assert_eq!(delay_millis(Duration::from_micros(1500)), 1);
        assert_eq!(delay_millis(Duration::MAX), u64::MAX);
    }
}
