//! The native engine interface.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The bridge never compiles anything itself. An [`Engine`] takes a fully
//! assembled [`EngineRequest`] and blocks until it has CSS, a source map and
//! the list of files it touched, or a [`CompileError`]. While it runs it
//! calls back into the job through [`EngineHooks`] for custom functions and
//! importers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{CallFailure, CompileError, EngineError};
use crate::importer::ImportResolution;
use crate::options::{Linefeed, OutputStyle};
use crate::paths::SourceMapPlan;
use crate::signature::FunctionSignature;
use crate::value::SassValue;

/// What the engine compiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineInput {
    /// Inline source text
    Data(String),
    /// Absolute entry path
    File(PathBuf),
}

/// Everything the engine needs for one compile, already resolved.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub input: EngineInput,
    pub indented_syntax: bool,
    pub include_paths: Vec<PathBuf>,
    pub precision: u32,
    pub output_style: OutputStyle,
    /// Indentation unit, already clamped
    pub indent: String,
    pub linefeed: Linefeed,
    /// `None` when no map was requested
    pub source_map: Option<SourceMapPlan>,
}

/// A successful compile.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub css: String,
    /// Raw v3 source map; the orchestrator fills in `file` and `sourceRoot`
    pub map: Option<serde_json::Value>,
    /// Every file the engine read, in the order it read them
    pub included_files: Vec<PathBuf>,
}

/// What an engine supports beyond plain compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCapabilities {
    pub functions: bool,
    pub importers: bool,
    pub source_maps: bool,
}

/// Job callbacks available to the engine while it compiles.
pub trait EngineHooks {
    /// Custom functions the engine should declare before compiling.
    fn functions(&self) -> Vec<FunctionSignature>;

    /// Evaluate a custom function call.
    fn call_function(&mut self, name: &str, args: Vec<SassValue>)
    -> Result<SassValue, CallFailure>;

    fn has_importers(&self) -> bool;

    /// Offer an import to the importer chain. `Ok(None)` means "use the
    /// default filesystem lookup".
    fn import(&mut self, url: &str, prev: &str) -> Result<Option<ImportResolution>, CallFailure>;
}

/// Hooks for a compile with no custom functions and no importers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EngineHooks for NoHooks {
    fn functions(&self) -> Vec<FunctionSignature> {
        Vec::new()
    }

    fn call_function(
        &mut self,
        name: &str,
        _args: Vec<SassValue>,
    ) -> Result<SassValue, CallFailure> {
        Err(CallFailure::new(
            crate::error::ErrorKind::Compile,
            format!("Undefined function: {}", name),
        ))
    }

    fn has_importers(&self) -> bool {
        false
    }

    fn import(&mut self, _url: &str, _prev: &str) -> Result<Option<ImportResolution>, CallFailure> {
        Ok(None)
    }
}

/// A blocking style-sheet compiler.
pub trait Engine: Send + Sync {
    /// Engine name shown in the info string.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Language the engine is written in, for the info string.
    fn implementation_language(&self) -> &str {
        "Rust"
    }

    fn capabilities(&self) -> EngineCapabilities;

    /// Compile one request, calling back through `hooks` as needed.
    fn compile(
        &self,
        request: &EngineRequest,
        hooks: &mut dyn EngineHooks,
    ) -> Result<EngineOutput, CompileError>;
}

/// Finds the engine. Resolution should be idempotent.
pub trait EngineLocator: Send + Sync {
    fn locate(&self) -> Result<Arc<dyn Engine>, EngineError>;
}

impl<F> EngineLocator for F
where
    F: Fn() -> Result<Arc<dyn Engine>, EngineError> + Send + Sync,
{
    fn locate(&self) -> Result<Arc<dyn Engine>, EngineError> {
        self()
    }
}
