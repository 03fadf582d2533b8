//! Invoking host callables: completion handles and fault capture.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Asynchronous callables receive a [`Done`] handle and may complete it from
//! any thread or task, at any time. The engine thread blocks on the paired
//! [`Pending`] until the handle fires. `Done` is consumed on use, so it
//! fires at most once; dropping it unfired fails the call rather than
//! stalling the job.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::oneshot;

use crate::error::{CallFailure, ErrorKind, HostError};

/// One-shot completion handle given to asynchronous callables.
#[derive(Debug)]
pub struct Done<T> {
    tx: oneshot::Sender<Result<T, HostError>>,
}

impl<T> Done<T> {
    pub(crate) fn channel() -> (Done<T>, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        (Done { tx }, Pending { rx })
    }

    /// Deliver the outcome of the call.
    pub fn complete(self, result: Result<T, HostError>) {
        // The receiver is gone only if the job already failed; nothing to report to.
        let _ = self.tx.send(result);
    }

    /// Deliver a successful result.
    pub fn ok(self, value: impl Into<T>) {
        self.complete(Ok(value.into()));
    }

    /// Deliver a failure.
    pub fn fail(self, err: impl Into<HostError>) {
        self.complete(Err(err.into()));
    }
}

/// Engine-side half of a [`Done`] handle.
#[derive(Debug)]
pub(crate) struct Pending<T> {
    rx: oneshot::Receiver<Result<T, HostError>>,
}

impl<T> Pending<T> {
    /// Block the engine thread until the handle fires.
    ///
    /// Must not be called from inside an async task.
    pub(crate) fn wait(self) -> Result<T, HostError> {
        self.rx.blocking_recv().unwrap_or_else(|_| {
            Err(HostError::fault(
                "Completion handle was dropped without delivering a result",
            ))
        })
    }
}

/// Run a host callable, turning a panic into a [`HostError`].
pub(crate) fn guarded<R>(f: impl FnOnce() -> Result<R, HostError>) -> Result<R, HostError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(panic_fault(payload)))
}

/// Classify a callable's error. Value constructor rejections keep their own
/// kind; every other fault is reported as `fault_kind`.
pub(crate) fn classify(err: HostError, fault_kind: ErrorKind) -> CallFailure {
    match err {
        HostError::Value(value_err) => {
            CallFailure::new(ErrorKind::ValueConstruction, value_err.to_string())
        }
        other => CallFailure::new(fault_kind, other.to_string()),
    }
}

fn panic_fault(payload: Box<dyn Any + Send>) -> HostError {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        HostError::fault(*msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        HostError::fault(msg.as_str())
    } else {
        HostError::Opaque
    }
}
