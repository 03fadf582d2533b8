//! Bridge between host code and a native SASS engine.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! This crate provides:
//! - The `SassValue` model and its marshaling to and from host data
//! - Custom functions, registered sync or async, dispatched from the engine
//! - Importer chains that rewrite or supply `@import` targets
//! - The render orchestrator: option validation, source-map path planning,
//!   engine invocation, stats and error normalization
//!
//! The engine itself sits behind the [`Engine`] trait; concrete engines live
//! in `sass-bridge-runtime`.
//!
//! ```ignore
//! let renderer = Renderer::with_engine(engine);
//! let result = renderer.render_sync(
//!     RenderOptions::from_data("div { width: foo(); }")
//!         .function("foo()", |_, _| Ok(SassValue::number(66.0, "em").into())),
//! )?;
//! assert!(result.css_str().contains("66em"));
//! ```

mod call;
pub mod context;
pub mod engine;
pub mod error;
pub mod function;
pub mod host;
pub mod importer;
pub mod info;
pub mod options;
pub mod paths;
pub mod render;
pub mod signature;
pub mod value;

pub use context::JobContext;
pub use engine::{
    Engine, EngineCapabilities, EngineHooks, EngineInput, EngineLocator, EngineOutput,
    EngineRequest, NoHooks,
};
pub use error::{
    CallFailure, CompileError, EngineError, ErrorKind, HostError, RenderError, SignatureError,
    ValueError,
};
pub use function::{Done, FunctionDispatcher, Functions};
pub use host::HostValue;
pub use importer::{ImportRequest, ImportResolution, ImportResult, ImporterBridge, Importers};
pub use options::{IndentType, Linefeed, OutputStyle, RenderOptions, SourceMapOption};
pub use paths::SourceMapPlan;
pub use render::{RenderJob, RenderResult, RenderStats, Renderer};
pub use signature::FunctionSignature;
pub use value::{SassColor, SassList, SassMap, SassNumber, SassString, SassValue, Separator};
