//! Version descriptor for diagnostics.
//!
//! Copyright (c) 2025 Posit, PBC

use crate::engine::Engine;

/// Name of this bridge as it appears in [`info`].
pub const WRAPPER_NAME: &str = "sass-bridge";

/// Version of this bridge.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Two tab-separated lines: the wrapper, then the engine.
pub fn info(engine: &dyn Engine) -> String {
    format!(
        "{}\t{}\t(Wrapper)\t[Rust]\n{}\t{}\t(Sass Compiler)\t[{}]",
        WRAPPER_NAME,
        VERSION,
        engine.name(),
        engine.version(),
        engine.implementation_language()
    )
}
