//! Runtime limits and defaults.
//!
//! Collected in one place so they are easy to find and reference from both the
//! executor and workflow-facing option types.

use std::time::Duration;

/// Attempts made by `execute_activity_with_retry` when the caller does not say otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed wait between retry attempts when the caller does not say otherwise.
///
/// Realized as an in-workflow timer, never as elapsed wall-clock time during replay.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Upper bound on task polls in a single scheduler drain.
///
/// A workflow that keeps yielding without ever blocking on history would
/// otherwise spin the executor forever.
pub const DEFAULT_MAX_SCHEDULER_STEPS: usize = 10_000;

/// Target of the replay-aware workflow logging macros.
pub const WORKFLOW_LOG_TARGET: &str = "duroflow::workflow";
