//! Custom function registry and dispatcher.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Each registration states up front whether the callable is synchronous
//! (returns its result) or asynchronous (completes a [`Done`] handle).
//! The dispatcher never infers the mode at call time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::call::{classify, guarded};
use crate::context::JobContext;
use crate::error::{CallFailure, ErrorKind, HostError, SignatureError, UNEXPECTED_ERROR};
use crate::host::HostValue;
use crate::signature::{FunctionSignature, normalize_name};
use crate::value::SassValue;

pub use crate::call::Done;

/// A custom function that returns its result directly.
pub type SyncFunction =
    dyn Fn(&JobContext, &[SassValue]) -> Result<HostValue, HostError> + Send + Sync;

/// A custom function that delivers its result through a completion handle.
pub type AsyncFunction = dyn Fn(&JobContext, Vec<SassValue>, Done<HostValue>) + Send + Sync;

/// A registered callable together with its declared mode.
#[derive(Clone)]
pub enum Callable {
    Sync(Arc<SyncFunction>),
    Async(Arc<AsyncFunction>),
}

impl Callable {
    pub fn is_async(&self) -> bool {
        matches!(self, Callable::Async(_))
    }
}

#[derive(Clone)]
struct Registration {
    signature: String,
    callable: Callable,
}

/// Custom functions keyed by signature, in registration order.
///
/// Signatures are kept as written and parsed when a job starts, so a
/// malformed one is reported as an options error for that job.
#[derive(Clone, Default)]
pub struct Functions {
    entries: Vec<Registration>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sync<F>(&mut self, signature: &str, f: F)
    where
        F: Fn(&JobContext, &[SassValue]) -> Result<HostValue, HostError> + Send + Sync + 'static,
    {
        self.entries.push(Registration {
            signature: signature.to_string(),
            callable: Callable::Sync(Arc::new(f)),
        });
    }

    pub fn register_async<F>(&mut self, signature: &str, f: F)
    where
        F: Fn(&JobContext, Vec<SassValue>, Done<HostValue>) + Send + Sync + 'static,
    {
        self.entries.push(Registration {
            signature: signature.to_string(),
            callable: Callable::Async(Arc::new(f)),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw signatures in registration order.
    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|r| r.signature.as_str())
    }
}

impl std::fmt::Debug for Functions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|r| {
                let mode = if r.callable.is_async() { "async" } else { "sync" };
                format!("{} [{}]", r.signature, mode)
            }))
            .finish()
    }
}

struct Entry {
    signature: FunctionSignature,
    callable: Callable,
}

/// Routes engine function calls to host callables for one job.
pub struct FunctionDispatcher {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

impl FunctionDispatcher {
    /// Parse every registered signature. A later registration of the same
    /// name replaces the earlier one.
    pub fn new(functions: &Functions) -> Result<Self, SignatureError> {
        let mut entries: Vec<Entry> = Vec::with_capacity(functions.len());
        let mut by_name = HashMap::new();

        for registration in &functions.entries {
            let signature = FunctionSignature::parse(&registration.signature)?;
            let entry = Entry {
                signature,
                callable: registration.callable.clone(),
            };
            match by_name.get(&entry.signature.lookup_key()) {
                Some(&index) => entries[index] = entry,
                None => {
                    by_name.insert(entry.signature.lookup_key(), entries.len());
                    entries.push(entry);
                }
            }
        }

        Ok(Self { entries, by_name })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parsed signatures the engine should declare.
    pub fn signatures(&self) -> Vec<FunctionSignature> {
        self.entries.iter().map(|e| e.signature.clone()).collect()
    }

    /// Invoke the function registered under `name`.
    ///
    /// Blocks until an asynchronous callable completes its handle, so this
    /// must run on the engine thread, never inside an async task.
    pub fn dispatch(
        &self,
        ctx: &JobContext,
        name: &str,
        args: Vec<SassValue>,
    ) -> Result<SassValue, CallFailure> {
        let Some(entry) = self
            .by_name
            .get(&normalize_name(name))
            .map(|&index| &self.entries[index])
        else {
            return Err(CallFailure::new(
                ErrorKind::Compile,
                format!("Undefined function: {}", name),
            ));
        };

        let arity = entry.signature.arity();
        if let Some(arity) = arity.filter(|&arity| args.len() > arity) {
            return Err(CallFailure::new(
                ErrorKind::Compile,
                format!(
                    "Only {} argument(s) allowed for {}, but {} were passed",
                    arity,
                    entry.signature.name(),
                    args.len()
                ),
            ));
        }

        tracing::debug!(
            function = entry.signature.name(),
            args = args.len(),
            is_async = entry.callable.is_async(),
            "Dispatching custom function"
        );

        let returned = match &entry.callable {
            Callable::Sync(f) => guarded(|| f(ctx, &args)),
            Callable::Async(f) => {
                let (done, pending) = Done::channel();
                guarded(|| {
                    f(ctx, args, done);
                    Ok(())
                })
                .and_then(|()| pending.wait())
            }
        }
        .map_err(|e| classify(e, ErrorKind::HostFault))?;

        let value = returned
            .into_sass()
            .map_err(|e| CallFailure::new(ErrorKind::Value, e.to_string()))?;

        match value {
            SassValue::Error(message) if message.trim().is_empty() => {
                Err(CallFailure::new(ErrorKind::HostFault, UNEXPECTED_ERROR))
            }
            SassValue::Error(message) => Err(CallFailure::new(ErrorKind::HostFault, message)),
            value => Ok(value),
        }
    }
}
