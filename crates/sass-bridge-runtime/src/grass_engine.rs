//! In-process engine on the grass crate.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! grass is a pure Rust compiler targeting dart-sass semantics. It cannot
//! call back into host code, so it hosts neither custom functions nor
//! importers, and it produces no mappings; the source map it returns only
//! lists its sources. Every file grass reads goes through [`RecordingFs`],
//! which is how `includedFiles` is collected.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use grass::{InputSyntax, Options, OutputStyle};
use serde_json::json;

use sass_bridge::paths::to_slash;
use sass_bridge::{
    CompileError, Engine, EngineCapabilities, EngineHooks, EngineInput, EngineOutput,
    EngineRequest, OutputStyle as BridgeStyle,
};

use crate::output::{apply_linefeed, parse_compile_error, reindent};

/// Version of the grass crate this engine is built against.
pub const GRASS_VERSION: &str = "0.13.4";

/// Precision the bridge defaults to; grass always uses its own.
const DEFAULT_PRECISION: u32 = 5;

/// Adapter that implements `grass::Fs` on the real filesystem and
/// remembers every file read, in order, with its contents.
#[derive(Default)]
pub struct RecordingFs {
    reads: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files read so far, with their contents.
    pub fn into_reads(self) -> Vec<(PathBuf, String)> {
        self.reads
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for RecordingFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reads = self.reads.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("RecordingFs")
            .field("reads", &reads.len())
            .finish()
    }
}

impl grass::Fs for RecordingFs {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let bytes = std::fs::read(path)?;
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_path_buf(), String::from_utf8_lossy(&bytes).into_owned()));
        Ok(bytes)
    }
}

/// The grass-backed engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassEngine;

impl GrassEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for GrassEngine {
    fn name(&self) -> &str {
        "grass"
    }

    fn version(&self) -> &str {
        GRASS_VERSION
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            functions: false,
            importers: false,
            source_maps: true,
        }
    }

    fn compile(
        &self,
        request: &EngineRequest,
        _hooks: &mut dyn EngineHooks,
    ) -> Result<EngineOutput, CompileError> {
        if request.precision != DEFAULT_PRECISION {
            tracing::warn!(
                precision = request.precision,
                "grass does not support the precision option; ignoring it"
            );
        }

        let fs = RecordingFs::new();
        let compressed = request.output_style == BridgeStyle::Compressed;
        let style = match request.output_style {
            BridgeStyle::Compressed => OutputStyle::Compressed,
            // grass only knows expanded and compressed
            BridgeStyle::Nested | BridgeStyle::Expanded | BridgeStyle::Compact => {
                OutputStyle::Expanded
            }
        };
        let syntax = if request.indented_syntax {
            InputSyntax::Sass
        } else {
            InputSyntax::Scss
        };

        let options = Options::default()
            .fs(&fs)
            .load_paths(&request.include_paths)
            .style(style)
            .input_syntax(syntax);

        tracing::debug!(
            style = ?request.output_style,
            include_paths = request.include_paths.len(),
            "Compiling with grass"
        );

        let compiled = match &request.input {
            EngineInput::Data(data) => grass::from_string(data.clone(), &options),
            EngineInput::File(file) => grass::from_path(file, &options),
        };
        let css = compiled.map_err(|e| parse_compile_error(&e.to_string()))?;

        let css = if compressed {
            css
        } else {
            apply_linefeed(&reindent(&css, &request.indent), request.linefeed)
        };

        let reads = fs.into_reads();
        let map = request.source_map.as_ref().map(|plan| {
            let mut sources: Vec<String> = Vec::new();
            let mut contents: Vec<String> = Vec::new();
            if let EngineInput::Data(data) = &request.input {
                sources.push("stdin".to_string());
                contents.push(data.clone());
            }
            for (path, text) in &reads {
                sources.push(to_slash(path));
                contents.push(text.clone());
            }

            let mut map = json!({
                "version": 3,
                "sources": sources,
                "names": [],
                "mappings": "",
            });
            if plan.contents {
                map["sourcesContent"] = json!(contents);
            }
            map
        });

        Ok(EngineOutput {
            css,
            map,
            included_files: reads.into_iter().map(|(path, _)| path).collect(),
        })
    }
}
