//! Output and source-map path relationships.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Everything here is string arithmetic on paths. Nothing touches the
//! filesystem: relative paths are anchored at a caller-supplied working
//! directory and `.`/`..` are resolved lexically.

use std::path::{Component, Path, PathBuf};

use crate::options::{RenderOptions, SourceMapOption};

/// Anchor `path` at `cwd` and resolve `.` and `..` lexically.
pub fn normalize(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                // Popping the root is a no-op, so `..` never escapes it
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    normalized
}

/// Relative path from directory `from` to `to`. Both must be normalized.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component);
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

/// Render a path with `/` separators on every platform.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Where the source map goes and what it records about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapPlan {
    /// Absolute map path
    pub path: PathBuf,
    /// The map's `file` field: the CSS file relative to the map
    pub file: Option<String>,
    /// The map's `sourceRoot` field, verbatim
    pub root: Option<String>,
    /// Map location relative to the CSS file, for `sourceMappingURL`
    pub url: String,
    /// Inline the map as a data URI
    pub embed: bool,
    /// Include `sourcesContent`
    pub contents: bool,
    /// Leave out the `sourceMappingURL` comment
    pub omit_url: bool,
}

/// Absolute out-file path, if one was given.
pub fn resolve_out_file(options: &RenderOptions, cwd: &Path) -> Option<PathBuf> {
    options
        .out_file
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| normalize(p, cwd))
}

/// Absolute map path.
///
/// `sourceMap: true` names the map after the out file (`<outFile>.map`),
/// so without an out file there is nothing to name it after.
pub fn resolve_map_path(options: &RenderOptions, cwd: &Path) -> Option<PathBuf> {
    match options.source_map.as_ref()? {
        SourceMapOption::Flag(false) => None,
        SourceMapOption::Flag(true) => {
            let mut path = resolve_out_file(options, cwd)?.into_os_string();
            path.push(".map");
            Some(PathBuf::from(path))
        }
        SourceMapOption::Path(path) if path.as_os_str().is_empty() => None,
        SourceMapOption::Path(path) => Some(normalize(path, cwd)),
    }
}

/// The map's `file` field: the out file relative to the map's directory.
pub fn map_file_field(map_path: &Path, out_file: &Path) -> String {
    let map_dir = map_path.parent().unwrap_or(map_path);
    to_slash(&relative_path(map_dir, out_file))
}

/// Compute every path the source map needs, before the engine runs.
pub fn plan_source_map(options: &RenderOptions, cwd: &Path) -> Option<SourceMapPlan> {
    let path = resolve_map_path(options, cwd)?;
    let out_file = resolve_out_file(options, cwd);

    let file = out_file.as_deref().map(|out| map_file_field(&path, out));
    let css_dir = out_file.as_deref().and_then(Path::parent).unwrap_or(cwd);
    let url = to_slash(&relative_path(css_dir, &path));

    Some(SourceMapPlan {
        path,
        file,
        root: options.source_map_root.clone(),
        url,
        embed: options.source_map_embed,
        contents: options.source_map_contents,
        omit_url: options.omit_source_map_url,
    })
}
