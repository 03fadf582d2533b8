//! Render options.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The data half of `RenderOptions` deserializes from the camelCase option
//! record a scripting host passes in (`{"data": "...", "includePaths": [...]}`).
//! Callables cannot travel through JSON, so custom functions and importers
//! are attached with builder methods.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::JobContext;
use crate::error::{HostError, RenderError};
use crate::function::{Done, Functions};
use crate::host::HostValue;
use crate::importer::{ImportRequest, ImportResult, Importers};
use crate::value::SassValue;

/// Largest accepted indent width; wider values are clamped.
pub const MAX_INDENT_WIDTH: usize = 10;

/// Engine formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Nested,
    Expanded,
    Compact,
    Compressed,
}

/// Character used for generated indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndentType {
    #[default]
    Space,
    Tab,
}

/// Generated line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linefeed {
    #[default]
    Lf,
    Cr,
    Lfcr,
    Crlf,
}

impl Linefeed {
    pub fn as_str(self) -> &'static str {
        match self {
            Linefeed::Lf => "\n",
            Linefeed::Cr => "\r",
            Linefeed::Lfcr => "\n\r",
            Linefeed::Crlf => "\r\n",
        }
    }
}

/// The `sourceMap` option: a flag or an explicit map path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceMapOption {
    Flag(bool),
    Path(PathBuf),
}

fn default_precision() -> u32 {
    5
}

fn default_indent_width() -> usize {
    2
}

/// Everything a caller can configure about one render.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Inline source text. Mutually exclusive with `file`.
    pub data: Option<String>,
    /// Entry file path. Mutually exclusive with `data`.
    pub file: Option<PathBuf>,
    /// Use the whitespace-significant syntax
    pub indented_syntax: bool,
    /// Extra directories searched for imports, in order
    pub include_paths: Vec<PathBuf>,
    /// Significant decimal digits in numeric output
    #[serde(default = "default_precision")]
    pub precision: u32,
    pub output_style: OutputStyle,
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
    pub indent_type: IndentType,
    pub linefeed: Linefeed,
    pub source_map: Option<SourceMapOption>,
    /// Target CSS path; only used to compute map paths, never written
    pub out_file: Option<PathBuf>,
    /// Copied verbatim into the map's `sourceRoot`
    pub source_map_root: Option<String>,
    /// Include sources in the map's `sourcesContent`
    pub source_map_contents: bool,
    /// Embed the map as a data URI instead of linking to it
    pub source_map_embed: bool,
    /// Do not append a `sourceMappingURL` comment
    pub omit_source_map_url: bool,
    #[serde(skip)]
    pub functions: Functions,
    #[serde(skip)]
    pub importers: Importers,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            data: None,
            file: None,
            indented_syntax: false,
            include_paths: Vec::new(),
            precision: default_precision(),
            output_style: OutputStyle::default(),
            indent_width: default_indent_width(),
            indent_type: IndentType::default(),
            linefeed: Linefeed::default(),
            source_map: None,
            out_file: None,
            source_map_root: None,
            source_map_contents: false,
            source_map_embed: false,
            omit_source_map_url: false,
            functions: Functions::default(),
            importers: Importers::default(),
        }
    }
}

impl std::fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOptions")
            .field("data", &self.data.as_ref().map(|d| d.len()))
            .field("file", &self.file)
            .field("indented_syntax", &self.indented_syntax)
            .field("include_paths", &self.include_paths)
            .field("precision", &self.precision)
            .field("output_style", &self.output_style)
            .field("indent", &self.indent())
            .field("linefeed", &self.linefeed)
            .field("source_map", &self.source_map)
            .field("out_file", &self.out_file)
            .field("functions", &self.functions)
            .field("importers", &self.importers)
            .finish()
    }
}

impl RenderOptions {
    /// Options compiling inline source text.
    pub fn from_data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Options compiling an entry file.
    pub fn from_file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Default::default()
        }
    }

    /// Parse the data options from a host's JSON option record.
    pub fn from_json(value: serde_json::Value) -> Result<Self, RenderError> {
        serde_json::from_value(value)
            .map_err(|e| RenderError::options(format!("Invalid render options: {}", e)))
    }

    pub fn indented_syntax(mut self, indented: bool) -> Self {
        self.indented_syntax = indented;
        self
    }

    pub fn include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn output_style(mut self, style: OutputStyle) -> Self {
        self.output_style = style;
        self
    }

    pub fn indentation(mut self, width: usize, kind: IndentType) -> Self {
        self.indent_width = width;
        self.indent_type = kind;
        self
    }

    pub fn linefeed(mut self, linefeed: Linefeed) -> Self {
        self.linefeed = linefeed;
        self
    }

    pub fn source_map(mut self, source_map: SourceMapOption) -> Self {
        self.source_map = Some(source_map);
        self
    }

    pub fn out_file(mut self, out_file: impl Into<PathBuf>) -> Self {
        self.out_file = Some(out_file.into());
        self
    }

    pub fn source_map_root(mut self, root: impl Into<String>) -> Self {
        self.source_map_root = Some(root.into());
        self
    }

    pub fn functions(mut self, functions: Functions) -> Self {
        self.functions = functions;
        self
    }

    pub fn importers(mut self, importers: Importers) -> Self {
        self.importers = importers;
        self
    }

    /// Register a synchronous custom function.
    pub fn function<F>(mut self, signature: &str, f: F) -> Self
    where
        F: Fn(&JobContext, &[SassValue]) -> Result<HostValue, HostError> + Send + Sync + 'static,
    {
        self.functions.register_sync(signature, f);
        self
    }

    /// Register an asynchronous custom function.
    pub fn async_function<F>(mut self, signature: &str, f: F) -> Self
    where
        F: Fn(&JobContext, Vec<SassValue>, Done<HostValue>) + Send + Sync + 'static,
    {
        self.functions.register_async(signature, f);
        self
    }

    /// Append a synchronous importer to the chain.
    pub fn importer<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobContext, &ImportRequest) -> Result<ImportResult, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.importers.push_sync(f);
        self
    }

    /// Append an asynchronous importer to the chain.
    pub fn async_importer<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobContext, ImportRequest, Done<ImportResult>) + Send + Sync + 'static,
    {
        self.importers.push_async(f);
        self
    }

    /// The indentation unit, with the width clamped to [`MAX_INDENT_WIDTH`].
    pub fn indent(&self) -> String {
        let unit = match self.indent_type {
            IndentType::Space => " ",
            IndentType::Tab => "\t",
        };
        unit.repeat(self.indent_width.min(MAX_INDENT_WIDTH))
    }

    /// The single input source, or an options error.
    pub fn input(&self) -> Result<Input<'_>, RenderError> {
        let data = self.data.as_deref().filter(|d| !d.is_empty());
        let file = self.file.as_deref().filter(|f| !f.as_os_str().is_empty());
        match (data, file) {
            (Some(data), None) => Ok(Input::Data(data)),
            (None, Some(file)) => Ok(Input::File(file)),
            (Some(_), Some(_)) => Err(RenderError::options(
                "Conflicting input: provide either a file name or a source string, not both",
            )),
            (None, None) => Err(RenderError::options(
                "No input specified: provide a file name or a source string to process",
            )),
        }
    }
}

/// The validated input of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Data(&'a str),
    File(&'a Path),
}
