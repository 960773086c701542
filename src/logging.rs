//! Replay-aware logging for workflow code.
//!
//! Workflow code runs again on every replay. These macros only emit while the
//! context is not replaying, so a message logged once by the workflow appears
//! once in the logs. Events carry the instance and use the `duroflow::workflow`
//! target.
//!
//! ```rust,ignore
//! duroflow::workflow_info!(ctx, order_id = %id, "order accepted");
//! ```

#[macro_export]
macro_rules! workflow_info {
    ($ctx:expr, $($arg:tt)+) => {{
        let __ctx = &$ctx;
        if !__ctx.is_replaying() {
            $crate::__private::tracing::info!(target: $crate::runtime::limits::WORKFLOW_LOG_TARGET, instance = %__ctx.instance(), $($arg)+);
        }
    }};
}

#[macro_export]
macro_rules! workflow_warn {
    ($ctx:expr, $($arg:tt)+) => {{
        let __ctx = &$ctx;
        if !__ctx.is_replaying() {
            $crate::__private::tracing::warn!(target: $crate::runtime::limits::WORKFLOW_LOG_TARGET, instance = %__ctx.instance(), $($arg)+);
        }
    }};
}

#[macro_export]
macro_rules! workflow_error {
    ($ctx:expr, $($arg:tt)+) => {{
        let __ctx = &$ctx;
        if !__ctx.is_replaying() {
            $crate::__private::tracing::error!(target: $crate::runtime::limits::WORKFLOW_LOG_TARGET, instance = %__ctx.instance(), $($arg)+);
        }
    }};
}

#[macro_export]
macro_rules! workflow_debug {
    ($ctx:expr, $($arg:tt)+) => {{
        let __ctx = &$ctx;
        if !__ctx.is_replaying() {
            $crate::__private::tracing::debug!(target: $crate::runtime::limits::WORKFLOW_LOG_TARGET, instance = %__ctx.instance(), $($arg)+);
        }
    }};
}
