//! Engine that drives an external `sass` executable.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Inline source goes to the process on stdin, CSS comes back on stdout and
//! diagnostics on stderr. The executable is always asked for an embedded
//! source map with absolute source URLs: the map's `sources` is the only
//! place the command line reports which files a compile loaded, so it is
//! read back for `includedFiles` and then stripped from the CSS.
//!
//! The process boundary leaves no way to call back into the host, so custom
//! functions and importers are not supported.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use sass_bridge::paths::to_slash;
use sass_bridge::{
    CompileError, Engine, EngineCapabilities, EngineError, EngineHooks, EngineInput,
    EngineOutput, EngineRequest, OutputStyle,
};

use crate::output::{apply_linefeed, parse_compile_error, reindent};

const MAP_COMMENT: &str = "/*# sourceMappingURL=";

/// An external `sass` executable that answered `--version`.
#[derive(Debug, Clone)]
pub struct CliEngine {
    path: PathBuf,
    version: String,
}

impl CliEngine {
    /// Probe the executable at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let unusable = |reason: String| EngineError::Unusable {
            path: path.display().to_string(),
            reason,
        };

        let output = Command::new(&path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| unusable(format!("failed to run --version: {}", e)))?;

        if !output.status.success() {
            return Err(unusable(format!(
                "--version exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        if version.is_empty() {
            return Err(unusable("--version printed nothing".to_string()));
        }

        tracing::debug!(path = %path.display(), version = %version, "Probed sass executable");
        Ok(Self { path, version })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn arguments(request: &EngineRequest) -> Vec<String> {
        let mut args = Vec::new();
        if request.indented_syntax {
            args.push("--indented".to_string());
        }

        let style = match request.output_style {
            OutputStyle::Compressed => "compressed",
            OutputStyle::Nested | OutputStyle::Expanded | OutputStyle::Compact => "expanded",
        };
        args.push(format!("--style={}", style));

        for path in &request.include_paths {
            args.push(format!("--load-path={}", path.display()));
        }

        args.push("--embed-source-map".to_string());
        args.push("--source-map-urls=absolute".to_string());
        if request.source_map.as_ref().is_some_and(|plan| plan.contents) {
            args.push("--embed-sources".to_string());
        }
        args.push("--no-error-css".to_string());

        match &request.input {
            EngineInput::Data(_) => args.push("--stdin".to_string()),
            EngineInput::File(file) => args.push(file.display().to_string()),
        }
        args
    }
}

impl Engine for CliEngine {
    fn name(&self) -> &str {
        "dart-sass"
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn implementation_language(&self) -> &str {
        "Dart"
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
        if request.precision != 5 {
            tracing::warn!(
                precision = request.precision,
                "the sass executable does not support the precision option; ignoring it"
            );
        }

        let args = Self::arguments(request);
        tracing::debug!(path = %self.path.display(), args = ?args, "Running sass executable");

        let mut child = Command::new(&self.path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CompileError::new(format!(
                    "Failed to spawn sass ({}): {}",
                    self.path.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let EngineInput::Data(data) = &request.input {
                stdin.write_all(data.as_bytes()).map_err(|e| {
                    CompileError::new(format!("Failed to write to sass stdin: {}", e))
                })?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| CompileError::new(format!("Failed to wait for sass: {}", e)))?;

        if !output.status.success() {
            return Err(parse_compile_error(&String::from_utf8_lossy(
                &output.stderr,
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (css, embedded) = split_embedded_map(&stdout);
        let mut map = embedded;
        let included_files = map.as_mut().map(rewrite_sources).unwrap_or_default();

        let css = match request.output_style {
            OutputStyle::Compressed => css.to_string(),
            _ => apply_linefeed(&reindent(css, &request.indent), request.linefeed),
        };

        Ok(EngineOutput {
            css,
            map: request.source_map.as_ref().and(map),
            included_files,
        })
    }
}

/// Split the trailing embedded map comment off `css`.
fn split_embedded_map(css: &str) -> (&str, Option<Value>) {
    let Some(start) = css.rfind(MAP_COMMENT) else {
        return (css, None);
    };

    let url = css[start + MAP_COMMENT.len()..]
        .trim_end()
        .trim_end_matches("*/")
        .trim();
    let map = decode_data_url(url).and_then(|json| serde_json::from_str(&json).ok());

    let before = &css[..start];
    let end = before.trim_end().len();
    // keep one trailing newline, like the executable's plain output
    let css = if end < before.len() {
        &before[..end + 1]
    } else {
        before
    };
    (css, map)
}

/// Decode a `data:application/json` URL in either base64 or
/// percent-encoded form.
fn decode_data_url(url: &str) -> Option<String> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;

    if header.ends_with(";base64") {
        let bytes = STANDARD.decode(payload).ok()?;
        String::from_utf8(bytes).ok()
    } else {
        Some(percent_decode(payload))
    }
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(byte) = text
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Turn the map's `file:` source URLs into paths, returning the loaded
/// files in order.
fn rewrite_sources(map: &mut Value) -> Vec<PathBuf> {
    let Some(sources) = map.get_mut("sources").and_then(Value::as_array_mut) else {
        return Vec::new();
    };

    let mut files = Vec::new();
    for source in sources.iter_mut() {
        let Some(path) = source.as_str().and_then(file_url_to_path) else {
            continue;
        };
        *source = Value::String(to_slash(&path));
        files.push(path);
    }
    files
}

fn file_url_to_path(url: &str) -> Option<PathBuf> {
    let path = percent_decode(url.strip_prefix("file://")?);
    // file:///C:/x on Windows
    if cfg!(windows) {
        if let Some(stripped) = path.strip_prefix('/') {
            if stripped.as_bytes().get(1) == Some(&b':') {
                return Some(PathBuf::from(stripped));
            }
        }
    }
    Some(PathBuf::from(path))
}
