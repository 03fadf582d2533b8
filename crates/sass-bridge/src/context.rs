//! Job-scoped context shared by custom functions and importers.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Every render job owns exactly one `JobContext`. It exposes the job's
//! options read-only and carries a mutable JSON record that callables use
//! to persist state between invocations. Clones are handles to the same
//! record, so a caller can keep one before the job runs and inspect the
//! record afterwards. Two different jobs never share a record.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::options::RenderOptions;

/// Handle to one job's options and state record.
#[derive(Clone)]
pub struct JobContext {
    options: Arc<RenderOptions>,
    record: Arc<Mutex<Map<String, Value>>>,
}

impl JobContext {
    pub(crate) fn new(options: Arc<RenderOptions>) -> Self {
        Self {
            options,
            record: Arc::new(Mutex::new(Map::new())),
        }
    }

    /// The options this job was started with.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Read one entry of the state record.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.update(|record| record.get(key).cloned())
    }

    /// Write one entry, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        self.update(move |record| record.insert(key, value))
    }

    /// Run `f` with exclusive access to the state record.
    pub fn update<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut record)
    }

    /// A copy of the whole state record.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.update(|record| record.clone())
    }

    /// Whether both handles belong to the same job.
    pub fn same_job(&self, other: &JobContext) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("options", &self.options)
            .field("record", &self.snapshot())
            .finish()
    }
}
