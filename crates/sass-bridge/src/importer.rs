//! Importer chain and resolution bridge.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Importers intercept `@import` requests before the engine touches the
//! filesystem. They run in registration order; the first one that does not
//! decline wins. Declining is per request: an importer that passed on one
//! URL is still asked about the next.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::call::{classify, guarded};
use crate::context::JobContext;
use crate::error::{CallFailure, ErrorKind, HostError, ValueError};
use crate::function::Done;

/// `prev` reported for imports issued from inline source text.
pub const STDIN_PREV: &str = "stdin";

/// One import request as seen by an importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// The URL exactly as written in the `@import` rule
    pub url: String,
    /// Path of the importing file, or [`STDIN_PREV`]
    pub prev: String,
}

/// What an importer returns. Both fields empty means "decline".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportResult {
    pub file: Option<PathBuf>,
    pub contents: Option<String>,
}

impl ImportResult {
    /// Pass the request on to the next importer.
    pub fn decline() -> Self {
        Self::default()
    }

    /// Redirect to another file; the engine reads it.
    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            contents: None,
        }
    }

    /// Supply the source text directly.
    pub fn contents(contents: impl Into<String>) -> Self {
        Self {
            file: None,
            contents: Some(contents.into()),
        }
    }

    /// Supply the source text, keeping `file` as the base for nested imports.
    pub fn file_and_contents(file: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            contents: Some(contents.into()),
        }
    }

    pub fn is_declined(&self) -> bool {
        self.file.is_none() && self.contents.is_none()
    }

    /// Accept a host object of the shape `{file?, contents?}`.
    ///
    /// `null` is treated like `{}` and other keys are ignored. An error value
    /// (`{"type": "error", "message": ..}`) fails the import with its message.
    /// Anything else is a value error.
    pub fn from_host(value: &Value) -> Result<Self, HostError> {
        match value {
            Value::Null => Ok(Self::decline()),
            Value::Object(record) if record.get("type").and_then(Value::as_str) == Some("error") => {
                let message = record
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Err(HostError::fault(message))
            }
            Value::Object(_) => serde_json::from_value(value.clone()).map_err(|e| {
                ValueError::type_error(format!(
                    "Importer results must be objects with `file` and/or `contents`: {}",
                    e
                ))
                .into()
            }),
            other => Err(ValueError::type_error(format!(
                "Importer results must be objects with `file` and/or `contents`, got {}",
                other
            ))
            .into()),
        }
    }

    fn into_resolution(self) -> Option<ImportResolution> {
        match (self.file, self.contents) {
            (None, None) => None,
            (Some(file), None) => Some(ImportResolution::File(file)),
            (None, Some(contents)) => Some(ImportResolution::Contents(contents)),
            (Some(file), Some(contents)) => {
                Some(ImportResolution::FileAndContents { file, contents })
            }
        }
    }
}

/// An importer that returns its result directly.
pub type SyncImporter =
    dyn Fn(&JobContext, &ImportRequest) -> Result<ImportResult, HostError> + Send + Sync;

/// An importer that delivers its result through a completion handle.
pub type AsyncImporter = dyn Fn(&JobContext, ImportRequest, Done<ImportResult>) + Send + Sync;

#[derive(Clone)]
enum Importer {
    Sync(Arc<SyncImporter>),
    Async(Arc<AsyncImporter>),
}

/// Ordered importer chain.
#[derive(Clone, Default)]
pub struct Importers {
    chain: Vec<Importer>,
}

impl Importers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sync<F>(&mut self, f: F)
    where
        F: Fn(&JobContext, &ImportRequest) -> Result<ImportResult, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.chain.push(Importer::Sync(Arc::new(f)));
    }

    pub fn push_async<F>(&mut self, f: F)
    where
        F: Fn(&JobContext, ImportRequest, Done<ImportResult>) + Send + Sync + 'static,
    {
        self.chain.push(Importer::Async(Arc::new(f)));
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl std::fmt::Debug for Importers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.chain.iter().map(|i| match i {
                Importer::Sync(_) => "sync",
                Importer::Async(_) => "async",
            }))
            .finish()
    }
}

/// How an import was resolved by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResolution {
    /// The engine should load this file instead
    File(PathBuf),
    /// Literal source with no file identity
    Contents(String),
    /// Literal source; nested imports resolve relative to `file`
    FileAndContents { file: PathBuf, contents: String },
}

/// Runs the importer chain for one job.
pub struct ImporterBridge {
    importers: Importers,
}

impl ImporterBridge {
    pub fn new(importers: &Importers) -> Self {
        Self {
            importers: importers.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }

    /// Resolve one request.
    ///
    /// `Ok(None)` means every importer declined and the engine should fall
    /// back to its own filesystem lookup.
    pub fn resolve(
        &self,
        ctx: &JobContext,
        url: &str,
        prev: &str,
    ) -> Result<Option<ImportResolution>, CallFailure> {
        let request = ImportRequest {
            url: url.to_string(),
            prev: prev.to_string(),
        };

        for (index, importer) in self.importers.chain.iter().enumerate() {
            let result = match importer {
                Importer::Sync(f) => guarded(|| f(ctx, &request)),
                Importer::Async(f) => {
                    let (done, pending) = Done::channel();
                    let request = request.clone();
                    guarded(|| {
                        f(ctx, request, done);
                        Ok(())
                    })
                    .and_then(|()| pending.wait())
                }
            }
            .map_err(|e| classify(e, ErrorKind::Importer))?;

            match result.into_resolution() {
                Some(resolution) => {
                    tracing::debug!(url, prev, importer = index, "Import resolved by importer");
                    return Ok(Some(resolution));
                }
                None => {
                    tracing::debug!(url, prev, importer = index, "Importer declined");
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RenderOptions;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> JobContext {
        JobContext::new(Arc::new(RenderOptions::from_data("@import 'a';")))
    }

    #[test]
    fn test_from_host_shapes() {
        assert!(ImportResult::from_host(&json!({})).unwrap().is_declined());
        assert!(ImportResult::from_host(&json!(null)).unwrap().is_declined());
        assert_eq!(
            ImportResult::from_host(&json!({"file": "/a/b.scss"})).unwrap(),
            ImportResult::file("/a/b.scss")
        );
        assert_eq!(
            ImportResult::from_host(&json!({"file": "/a/b.scss", "contents": "div{}"})).unwrap(),
            ImportResult::file_and_contents("/a/b.scss", "div{}")
        );
        assert_eq!(
            ImportResult::from_host(&json!({"contents": "a{}", "syntax": "scss"})).unwrap(),
            ImportResult::contents("a{}")
        );
        assert!(matches!(
            ImportResult::from_host(&json!("div{}")),
            Err(HostError::Value(_))
        ));
        assert!(matches!(
            ImportResult::from_host(&json!({"file": 42})),
            Err(HostError::Value(_))
        ));
    }

    #[test]
    fn test_from_host_error_value_fails_with_its_message() {
        let err = ImportResult::from_host(&json!({"type": "error", "message": "doesn't exist!"}))
            .unwrap_err();
        assert!(matches!(&err, HostError::Fault(msg) if msg == "doesn't exist!"));

        let failure = classify(err, ErrorKind::Importer);
        assert_eq!(failure.kind, ErrorKind::Importer);
        assert_eq!(failure.message, "doesn't exist!");
    }

    #[test]
    fn test_declining_importer_falls_through() {
        let seen_by_second = Arc::new(AtomicUsize::new(0));
        let counter = seen_by_second.clone();

        let mut importers = Importers::new();
        importers.push_sync(|_, _| Ok(ImportResult::decline()));
        importers.push_sync(move |_, request| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ImportResult::file(format!("/styles/{}.scss", request.url)))
        });
        let bridge = ImporterBridge::new(&importers);

        for url in ["a", "b"] {
            let resolution = bridge.resolve(&ctx(), url, STDIN_PREV).unwrap();
            assert_eq!(
                resolution,
                Some(ImportResolution::File(PathBuf::from(format!("/styles/{}.scss", url))))
            );
        }
        assert_eq!(seen_by_second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_all_declined_means_default_lookup() {
        let mut importers = Importers::new();
        importers.push_sync(|_, _| Ok(ImportResult::decline()));
        let bridge = ImporterBridge::new(&importers);

        assert_eq!(bridge.resolve(&ctx(), "a", STDIN_PREV).unwrap(), None);
    }

    #[test]
    fn test_async_importer() {
        let mut importers = Importers::new();
        importers.push_async(|_, request, done| {
            std::thread::spawn(move || {
                done.ok(ImportResult::contents(format!(
                    "/* {} from {} */",
                    request.url, request.prev
                )));
            });
        });
        let bridge = ImporterBridge::new(&importers);

        let resolution = bridge.resolve(&ctx(), "a", STDIN_PREV).unwrap();
        assert_eq!(
            resolution,
            Some(ImportResolution::Contents("/* a from stdin */".to_string()))
        );
    }

    #[test]
    fn test_importer_errors_short_circuit() {
        let mut importers = Importers::new();
        importers.push_sync(|_, _| Err(HostError::fault("doesn't exist!")));
        importers.push_sync(|_, _| Ok(ImportResult::contents("div{}")));
        let bridge = ImporterBridge::new(&importers);

        let failure = bridge.resolve(&ctx(), "a", STDIN_PREV).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Importer);
        assert_eq!(failure.message, "doesn't exist!");
    }

    #[test]
    fn test_importer_value_errors() {
        let mut importers = Importers::new();
        importers.push_sync(|_, _| Ok(ImportResult::from_host(&json!(42))?));
        let bridge = ImporterBridge::new(&importers);

        let failure = bridge.resolve(&ctx(), "a", STDIN_PREV).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ValueConstruction);
    }

    #[test]
    fn test_importers_see_job_options_and_state() {
        let mut importers = Importers::new();
        importers.push_sync(|ctx, _| {
            ctx.set("seen", true);
            Ok(ImportResult::contents(
                ctx.options().data.clone().unwrap_or_default(),
            ))
        });
        let bridge = ImporterBridge::new(&importers);
        let ctx = ctx();

        let resolution = bridge.resolve(&ctx, "a", STDIN_PREV).unwrap();
        assert_eq!(
            resolution,
            Some(ImportResolution::Contents("@import 'a';".to_string()))
        );
        assert_eq!(ctx.get("seen"), Some(json!(true)));
    }
}
