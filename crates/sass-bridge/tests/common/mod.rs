//! Shared helpers for integration tests.
//!
//! `ToyEngine` stands in for the native engine. It understands just enough
//! of the language to drive every hook: `@import 'url';` lines go through
//! the importer chain (falling back to a filesystem lookup), calls to
//! declared custom functions are evaluated in place, and `@error "msg";`
//! fails the compile at that line. Everything else is copied through.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use sass_bridge::signature::normalize_name;
use sass_bridge::{
    CompileError, Engine, EngineCapabilities, EngineHooks, EngineInput, EngineOutput,
    EngineRequest, ImportResolution, Renderer, SassColor, SassValue,
};

static IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^@import\s+['"]([^'"]+)['"]\s*;?$"#).unwrap());
static ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^@error\s+"([^"]*)"\s*;?$"#).unwrap());
static CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_-]*)\(([^()]*)\)").unwrap());
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-?[0-9]*\.?[0-9]+)([A-Za-z%]*)$").unwrap());

const MAX_DEPTH: usize = 16;

pub struct ToyEngine;

impl Engine for ToyEngine {
    fn name(&self) -> &str {
        "toy"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            functions: true,
            importers: true,
            source_maps: true,
        }
    }

    fn compile(
        &self,
        request: &EngineRequest,
        hooks: &mut dyn EngineHooks,
    ) -> Result<EngineOutput, CompileError> {
        let declared = hooks
            .functions()
            .iter()
            .map(|sig| sig.lookup_key())
            .collect();
        let mut run = Compilation {
            request,
            hooks,
            declared,
            included: Vec::new(),
            sources: Vec::new(),
        };

        let css = match &request.input {
            EngineInput::Data(data) => {
                run.sources.push(("stdin".to_string(), data.clone()));
                run.process(data, "stdin", 0)?
            }
            EngineInput::File(file) => run.load(file, 0)?,
        };

        let map = request.source_map.as_ref().map(|plan| {
            let mut map = json!({
                "version": 3,
                "file": "stdin.css",
                "sources": run.sources.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>(),
                "names": [],
                "mappings": "",
            });
            if plan.contents {
                map["sourcesContent"] =
                    json!(run.sources.iter().map(|(_, text)| text.clone()).collect::<Vec<_>>());
            }
            map
        });

        Ok(EngineOutput {
            css,
            map,
            included_files: run.included,
        })
    }
}

struct Compilation<'a> {
    request: &'a EngineRequest,
    hooks: &'a mut dyn EngineHooks,
    declared: HashSet<String>,
    included: Vec<PathBuf>,
    sources: Vec<(String, String)>,
}

impl Compilation<'_> {
    fn process(&mut self, text: &str, prev: &str, depth: usize) -> Result<String, CompileError> {
        if depth > MAX_DEPTH {
            return Err(CompileError::new("An @import loop has been found"));
        }

        let mut out = String::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(caps) = IMPORT.captures(trimmed) {
                out.push_str(&self.import(&caps[1], prev, depth)?);
                continue;
            }
            if let Some(caps) = ERROR.captures(trimmed) {
                let column = line.len() - line.trim_start().len() + 1;
                return Err(CompileError::new(&caps[1]).at(prev, index + 1, column));
            }
            out.push_str(&self.call_functions(line, prev, index + 1)?);
            out.push('\n');
        }
        Ok(out)
    }

    fn call_functions(
        &mut self,
        line: &str,
        prev: &str,
        line_number: usize,
    ) -> Result<String, CompileError> {
        let mut out = String::new();
        let mut last = 0;
        for caps in CALL.captures_iter(line) {
            let whole = caps.get(0).unwrap();
            let name = &caps[1];
            if !self.declared.contains(&normalize_name(name)) {
                continue;
            }
            let args = parse_args(&caps[2]);
            let value = self
                .hooks
                .call_function(name, args)
                .map_err(|f| CompileError::new(f.message).at(prev, line_number, whole.start() + 1))?;
            out.push_str(&line[last..whole.start()]);
            out.push_str(&value.to_string());
            last = whole.end();
        }
        out.push_str(&line[last..]);
        Ok(out)
    }

    fn import(&mut self, url: &str, prev: &str, depth: usize) -> Result<String, CompileError> {
        if self.hooks.has_importers() {
            let resolution = self
                .hooks
                .import(url, prev)
                .map_err(|f| CompileError::new(f.message))?;
            match resolution {
                Some(ImportResolution::Contents(contents)) => {
                    return self.process(&contents, prev, depth + 1);
                }
                Some(ImportResolution::File(file)) => {
                    let path = self.find(&file.to_string_lossy(), prev).ok_or_else(|| {
                        CompileError::new(format!(
                            "File to import not found or unreadable: {}",
                            file.display()
                        ))
                    })?;
                    return self.load(&path, depth + 1);
                }
                Some(ImportResolution::FileAndContents { file, contents }) => {
                    self.included.push(file.clone());
                    self.sources
                        .push((file.to_string_lossy().into_owned(), contents.clone()));
                    return self.process(&contents, &file.to_string_lossy(), depth + 1);
                }
                None => {}
            }
        }

        let path = self.find(url, prev).ok_or_else(|| {
            CompileError::new(format!("File to import not found or unreadable: {}", url))
        })?;
        self.load(&path, depth + 1)
    }

    fn load(&mut self, path: &Path, depth: usize) -> Result<String, CompileError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CompileError::new(format!("Cannot read {}: {}", path.display(), e))
        })?;
        self.included.push(path.to_path_buf());
        self.sources
            .push((path.to_string_lossy().into_owned(), text.clone()));
        self.process(&text, &path.to_string_lossy(), depth)
    }

    /// Resolve `url` next to `prev`, then in each include path.
    fn find(&self, url: &str, prev: &str) -> Option<PathBuf> {
        let url = Path::new(url);
        if url.is_absolute() && url.is_file() {
            return Some(url.to_path_buf());
        }

        let mut bases = Vec::new();
        if prev != "stdin" {
            if let Some(dir) = Path::new(prev).parent() {
                bases.push(dir.to_path_buf());
            }
        }
        bases.extend(self.request.include_paths.iter().cloned());

        let file_name = url.file_name()?.to_string_lossy().into_owned();
        let parent = url.parent().unwrap_or(Path::new(""));
        for base in bases {
            for candidate in [
                file_name.clone(),
                format!("{}.scss", file_name),
                format!("_{}.scss", file_name),
            ] {
                let path = base.join(parent).join(&candidate);
                if path.is_file() {
                    return Some(path);
                }
            }
        }
        None
    }
}

fn parse_args(list: &str) -> Vec<SassValue> {
    list.split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(parse_value)
        .collect()
}

fn parse_value(arg: &str) -> SassValue {
    if let Some(caps) = NUMBER.captures(arg) {
        if let Ok(value) = caps[1].parse::<f64>() {
            return SassValue::number(value, &caps[2]);
        }
    }
    match arg {
        "null" => return SassValue::NULL,
        "true" => return SassValue::TRUE,
        "false" => return SassValue::FALSE,
        _ => {}
    }
    if let Some(hex) = arg.strip_prefix('#').filter(|h| h.len() == 6) {
        if let Ok(rgb) = u32::from_str_radix(hex, 16) {
            return SassColor::from_argb(0xff00_0000 | rgb).into();
        }
    }
    SassValue::string(arg)
}

/// A renderer on the toy engine, anchored at `cwd`.
pub fn renderer(cwd: impl Into<PathBuf>) -> Renderer {
    init_tracing();
    Renderer::with_engine(Arc::new(ToyEngine)).working_dir(cwd)
}

/// Route `tracing` output to the test harness; `RUST_LOG` filters it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sass_bridge=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Write `files` (relative path, contents) under `dir`.
pub fn write_fixtures(dir: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let path = dir.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

/// Number of non-overlapping occurrences of `needle` in `haystack`.
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
