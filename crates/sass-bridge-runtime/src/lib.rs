//! Concrete engines for sass-bridge.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! - `GrassEngine`: in-process compilation on the grass crate (default)
//! - `CliEngine`: an external `sass` executable, found by `BinaryLocator`
//!   through `SASS_BINARY_PATH`, `SASS_BINARY_NAME` or `PATH`

mod cli_engine;
mod grass_engine;
mod locator;
mod output;

pub use cli_engine::CliEngine;
pub use grass_engine::{GRASS_VERSION, GrassEngine, RecordingFs};
pub use locator::{
    BINARY_NAME_VAR, BINARY_PATH_VAR, BinaryConfig, BinaryLocator, DEFAULT_BINARY_NAME,
    GrassLocator,
};
pub use output::{apply_linefeed, parse_compile_error, reindent};

use sass_bridge::Renderer;

/// A renderer on the in-process grass engine.
pub fn default_renderer() -> Renderer {
    Renderer::new(GrassLocator)
}

/// A renderer on the external `sass` executable, configured from the
/// environment. Location happens on first use.
pub fn binary_renderer() -> Renderer {
    Renderer::new(BinaryLocator::from_env())
}
