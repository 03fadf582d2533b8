//! Render job orchestration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A [`Renderer`] owns the engine capability. Each call to
//! [`Renderer::job`] validates one set of options and produces a
//! [`RenderJob`] that is run exactly once, either blocking
//! ([`RenderJob::run_sync`]) or offloaded to the blocking thread pool
//! ([`RenderJob::run`]). Both report the same result and error shapes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::Value;

use crate::context::JobContext;
use crate::engine::{Engine, EngineHooks, EngineInput, EngineLocator, EngineOutput, EngineRequest};
use crate::error::{CallFailure, EngineError, ErrorKind, RenderError, UNEXPECTED_ERROR};
use crate::function::FunctionDispatcher;
use crate::importer::{ImportResolution, ImporterBridge};
use crate::info;
use crate::options::{Input, RenderOptions};
use crate::paths::{self, SourceMapPlan};
use crate::signature::FunctionSignature;
use crate::value::SassValue;

/// `stats.entry` for inline input.
pub const DATA_ENTRY: &str = "data";

/// Timing and file bookkeeping for one successful render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStats {
    /// `data` for inline input, otherwise the absolute entry path
    pub entry: String,
    /// Milliseconds since the Unix epoch
    pub start: u64,
    pub end: u64,
    /// `end - start`, in milliseconds
    pub duration: u64,
    /// Absolute paths with `/` separators, first-encountered order
    pub included_files: Vec<String>,
}

/// A successful render.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub css: Vec<u8>,
    pub map: Option<Value>,
    pub stats: RenderStats,
}

impl RenderResult {
    pub fn css_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.css)
    }

    /// The source map as JSON text.
    pub fn map_json(&self) -> Option<String> {
        self.map.as_ref().map(Value::to_string)
    }
}

/// Entry point for rendering. Locates the engine once and reuses it.
pub struct Renderer {
    locator: Arc<dyn EngineLocator>,
    engine: Arc<EngineSlot>,
    working_dir: Option<PathBuf>,
}

/// The memoized outcome of locating the engine.
type EngineSlot = OnceLock<Result<Arc<dyn Engine>, EngineError>>;

impl Renderer {
    pub fn new(locator: impl EngineLocator + 'static) -> Self {
        Self {
            locator: Arc::new(locator),
            engine: Arc::new(OnceLock::new()),
            working_dir: None,
        }
    }

    /// A renderer around an engine that is already at hand.
    pub fn with_engine(engine: Arc<dyn Engine>) -> Self {
        Self::new(move || -> Result<Arc<dyn Engine>, EngineError> { Ok(engine.clone()) })
    }

    /// Anchor relative paths at `dir` instead of the process working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The engine, located on first use.
    ///
    /// Locating may block (the external executable is probed with a
    /// subprocess); [`Renderer::render`] does it on the blocking pool.
    pub fn engine(&self) -> Result<Arc<dyn Engine>, RenderError> {
        locate_once(self.locator.as_ref(), &self.engine)
    }

    /// Wrapper and engine version descriptor.
    pub fn info(&self) -> Result<String, RenderError> {
        Ok(info::info(self.engine()?.as_ref()))
    }

    /// Validate `options` and prepare a job.
    pub fn job(&self, options: RenderOptions) -> Result<RenderJob, RenderError> {
        let cwd = self.cwd()?;

        let (input, entry) = match options.input()? {
            Input::Data(data) => (EngineInput::Data(data.to_string()), DATA_ENTRY.to_string()),
            Input::File(file) => {
                let file = paths::normalize(file, &cwd);
                let entry = file.to_string_lossy().into_owned();
                (EngineInput::File(file), entry)
            }
        };

        let engine = self.engine()?;
        let dispatcher = FunctionDispatcher::new(&options.functions)?;
        let importers = ImporterBridge::new(&options.importers);
        let source_map = paths::plan_source_map(&options, &cwd);
        check_capabilities(
            engine.as_ref(),
            &dispatcher,
            &importers,
            source_map.as_ref(),
        )?;

        let request = EngineRequest {
            input,
            indented_syntax: options.indented_syntax,
            include_paths: options
                .include_paths
                .iter()
                .map(|p| paths::normalize(p, &cwd))
                .collect(),
            precision: options.precision,
            output_style: options.output_style,
            indent: options.indent(),
            linefeed: options.linefeed,
            source_map,
        };

        Ok(RenderJob {
            engine,
            request,
            context: JobContext::new(Arc::new(options)),
            dispatcher,
            importers,
            entry,
            cwd,
        })
    }

    /// Render and block until done.
    pub fn render_sync(&self, options: RenderOptions) -> Result<RenderResult, RenderError> {
        self.job(options)?.run_sync()
    }

    /// Render on the blocking thread pool. The first call also locates the
    /// engine there.
    pub async fn render(&self, options: RenderOptions) -> Result<RenderResult, RenderError> {
        if self.engine.get().is_none() {
            let locator = Arc::clone(&self.locator);
            let slot = Arc::clone(&self.engine);
            tokio::task::spawn_blocking(move || {
                let _ = locate_once(locator.as_ref(), &slot);
            })
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Engine lookup task did not complete");
                RenderError::new(ErrorKind::HostFault, UNEXPECTED_ERROR)
            })?;
        }
        self.job(options)?.run().await
    }

    fn cwd(&self) -> Result<PathBuf, RenderError> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().map_err(|e| {
                RenderError::options(format!("Cannot determine the working directory: {}", e))
            }),
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("located", &self.engine.get().map(Result::is_ok))
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

fn locate_once(
    locator: &dyn EngineLocator,
    slot: &EngineSlot,
) -> Result<Arc<dyn Engine>, RenderError> {
    slot.get_or_init(|| {
        let located = locator.locate();
        match &located {
            Ok(engine) => tracing::debug!(
                engine = engine.name(),
                version = engine.version(),
                "Located SASS engine"
            ),
            Err(e) => tracing::debug!(error = %e, "SASS engine not available"),
        }
        located
    })
    .clone()
    .map_err(RenderError::from)
}

fn check_capabilities(
    engine: &dyn Engine,
    dispatcher: &FunctionDispatcher,
    importers: &ImporterBridge,
    source_map: Option<&SourceMapPlan>,
) -> Result<(), RenderError> {
    let capabilities = engine.capabilities();
    if source_map.is_some() && !capabilities.source_maps {
        return Err(RenderError::options(format!(
            "The {} engine does not support source maps",
            engine.name()
        )));
    }
    if !dispatcher.is_empty() && !capabilities.functions {
        return Err(RenderError::options(format!(
            "The {} engine does not support custom functions",
            engine.name()
        )));
    }
    if !importers.is_empty() && !capabilities.importers {
        return Err(RenderError::options(format!(
            "The {} engine does not support custom importers",
            engine.name()
        )));
    }
    Ok(())
}

/// One validated render, ready to run.
pub struct RenderJob {
    engine: Arc<dyn Engine>,
    request: EngineRequest,
    context: JobContext,
    dispatcher: FunctionDispatcher,
    importers: ImporterBridge,
    entry: String,
    cwd: PathBuf,
}

impl RenderJob {
    /// Handle to this job's context. Clone it to inspect state afterwards.
    pub fn context(&self) -> &JobContext {
        &self.context
    }

    /// The fully resolved request the engine will see.
    pub fn request(&self) -> &EngineRequest {
        &self.request
    }

    /// Run on the current thread.
    ///
    /// Asynchronous callables are awaited by blocking this thread, so this
    /// must not be called from inside an async task when any are registered.
    /// Use [`RenderJob::run`] there instead.
    pub fn run_sync(self) -> Result<RenderResult, RenderError> {
        let start = SystemTime::now();
        let clock = Instant::now();

        tracing::debug!(
            engine = self.engine.name(),
            entry = %self.entry,
            functions = self.dispatcher.signatures().len(),
            importers = !self.importers.is_empty(),
            "Invoking SASS engine"
        );

        let mut hooks = JobHooks {
            context: &self.context,
            dispatcher: &self.dispatcher,
            importers: &self.importers,
            failure: None,
        };
        let compiled = self.engine.compile(&self.request, &mut hooks);
        let elapsed = clock.elapsed();
        let failure = hooks.failure;

        let output = match compiled {
            Ok(output) => output,
            Err(err) => {
                // A hook failure is the root cause of whatever the engine reported.
                let err = match failure {
                    Some(failure) => RenderError::from(failure),
                    None => RenderError::from(err),
                };
                tracing::debug!(status = err.status, message = %err.message, "Render failed");
                return Err(err);
            }
        };

        let stats = self.stats(&output, start, elapsed);
        let (css, map) = self.finalize(output)?;

        tracing::info!(
            entry = %stats.entry,
            duration_ms = stats.duration,
            included = stats.included_files.len(),
            "Render complete"
        );

        Ok(RenderResult {
            css: css.into_bytes(),
            map,
            stats,
        })
    }

    /// Run on the blocking thread pool and resume once the engine is done.
    pub async fn run(self) -> Result<RenderResult, RenderError> {
        tokio::task::spawn_blocking(move || self.run_sync())
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Render task did not complete");
                Err(RenderError::new(ErrorKind::HostFault, UNEXPECTED_ERROR))
            })
    }

    fn stats(&self, output: &EngineOutput, start: SystemTime, elapsed: Duration) -> RenderStats {
        let start = start
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let duration = elapsed.as_millis() as u64;

        let mut included_files: Vec<String> = Vec::with_capacity(output.included_files.len() + 1);
        if let EngineInput::File(entry) = &self.request.input {
            included_files.push(paths::to_slash(entry));
        }
        for file in &output.included_files {
            let file = stats_path(file, &self.cwd);
            if !included_files.contains(&file) {
                included_files.push(file);
            }
        }

        RenderStats {
            entry: self.entry.clone(),
            start,
            end: start + duration,
            duration,
            included_files,
        }
    }

    fn finalize(&self, output: EngineOutput) -> Result<(String, Option<Value>), RenderError> {
        let EngineOutput { mut css, map, .. } = output;

        let Some(plan) = &self.request.source_map else {
            return Ok((css, None));
        };
        let Some(map) = map else {
            tracing::warn!(
                engine = self.engine.name(),
                "Engine produced no source map; ignoring source map options"
            );
            return Ok((css, None));
        };

        let map = finalize_map(map, plan)?;
        if !plan.omit_url {
            let url = if plan.embed {
                format!(
                    "data:application/json;base64,{}",
                    BASE64.encode(map.to_string())
                )
            } else {
                plan.url.clone()
            };
            if !css.is_empty() && !css.ends_with('\n') {
                css.push_str(self.request.linefeed.as_str());
            }
            css.push_str(&format!("/*# sourceMappingURL={} */", url));
        }

        Ok((css, Some(map)))
    }
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("engine", &self.engine.name())
            .field("entry", &self.entry)
            .field("request", &self.request)
            .finish()
    }
}

/// Fill in the path fields the engine cannot know about.
fn finalize_map(map: Value, plan: &SourceMapPlan) -> Result<Value, RenderError> {
    let Value::Object(mut map) = map else {
        return Err(RenderError::new(
            ErrorKind::Compile,
            "Engine returned a source map that is not a JSON object",
        ));
    };

    match &plan.file {
        Some(file) => {
            map.insert("file".to_string(), Value::String(file.clone()));
        }
        None => {
            map.remove("file");
        }
    }
    if let Some(root) = &plan.root {
        map.insert("sourceRoot".to_string(), Value::String(root.clone()));
    }

    Ok(Value::Object(map))
}

/// Hooks wired into the engine for one job. Remembers the first hook
/// failure so the render error names its real cause.
struct JobHooks<'a> {
    context: &'a JobContext,
    dispatcher: &'a FunctionDispatcher,
    importers: &'a ImporterBridge,
    failure: Option<CallFailure>,
}

impl JobHooks<'_> {
    fn record<T>(&mut self, result: Result<T, CallFailure>) -> Result<T, CallFailure> {
        if let Err(failure) = &result {
            // Compile-kind failures are reported by the engine with a location.
            if failure.kind != ErrorKind::Compile && self.failure.is_none() {
                self.failure = Some(failure.clone());
            }
        }
        result
    }
}

impl EngineHooks for JobHooks<'_> {
    fn functions(&self) -> Vec<FunctionSignature> {
        self.dispatcher.signatures()
    }

    fn call_function(
        &mut self,
        name: &str,
        args: Vec<SassValue>,
    ) -> Result<SassValue, CallFailure> {
        let result = self.dispatcher.dispatch(self.context, name, args);
        self.record(result)
    }

    fn has_importers(&self) -> bool {
        !self.importers.is_empty()
    }

    fn import(&mut self, url: &str, prev: &str) -> Result<Option<ImportResolution>, CallFailure> {
        let result = self.importers.resolve(self.context, url, prev);
        self.record(result)
    }
}

/// Absolute form of a path the way stats report it.
fn stats_path(path: &Path, cwd: &Path) -> String {
    paths::to_slash(&paths::normalize(path, cwd))
}
