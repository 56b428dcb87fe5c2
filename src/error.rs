//! Unified error hierarchy for the core.
//!
//! Almost nothing in the steady-state frame loop returns `Result` — by the time a
//! component is mid-update, the ordering/invariant guarantees already make a
//! failure a programmer error rather than something recoverable. `CoreError`
//! exists for the handful of fallible entry points plus as the payload logged by
//! the panic-isolation boundary in [`crate::scheduler::Scheduler`].

/// The crate's unified error type.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// A debug-only assertion: misuse of the API (syncing incompatible VNodes,
    /// missing keys under track-by-key, double-cancelling a subscription,
    /// disposing a component twice). Only ever constructed behind
    /// `cfg!(debug_assertions)`; release builds skip the check entirely.
    #[error("precondition violated: {message}")]
    PreconditionViolation { message: String },

    /// Non-fatal: the naive children diff detected a prefix/suffix mismatch at
    /// equal list lengths, which usually indicates a dynamic children shape that
    /// should be using track-by-key instead.
    #[error("children shape warning: {message}")]
    ChildrenShapeWarning { message: String },

    /// A component lifecycle callback, invalidator subscription callback, or
    /// scheduled frame task panicked. Caught via `catch_unwind` at the scheduler
    /// boundary; host mutations already performed are not rolled back.
    #[error("handler panicked during {context}")]
    HandlerException { context: String },
}

impl CoreError {
    pub fn precondition(message: impl Into<String>) -> Self {
        CoreError::PreconditionViolation {
            message: message.into(),
        }
    }

    pub fn children_shape(message: impl Into<String>) -> Self {
        CoreError::ChildrenShapeWarning {
            message: message.into(),
        }
    }

    pub fn handler_exception(context: impl Into<String>) -> Self {
        CoreError::HandlerException {
            context: context.into(),
        }
    }
}

/// Logs a [`CoreError::PreconditionViolation`] and panics, compiled out
/// entirely in release builds — the crate's "debug-only assertion" mechanism
/// (misuse of the API: syncing incompatible VNodes, a malformed attribute
/// key, double-cancelling a subscription, disposing a component twice).
#[macro_export]
macro_rules! precondition {
    ($cond:expr, $($arg:tt)*) => {
        if cfg!(debug_assertions) && !$cond {
            let violation = $crate::error::CoreError::precondition(format!($($arg)*));
            log::error!("{}", violation);
            panic!("{}", violation);
        }
    };
}

/// Runs `f`, catching any panic and converting it into a logged
/// [`CoreError::HandlerException`] instead of unwinding through the scheduler.
pub(crate) fn isolate_handler<F, R>(context: &str, f: F) -> Option<R>
where
    F: FnOnce() -> R + std::panic::UnwindSafe,
{
    match std::panic::catch_unwind(f) {
        Ok(value) => Some(value),
        Err(payload) => {
            let reason = panic_payload_message(&payload);
            log::error!("{}", CoreError::handler_exception(context));
            log::error!("panic payload: {}", reason);
            None
        }
    }
}

fn panic_payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
