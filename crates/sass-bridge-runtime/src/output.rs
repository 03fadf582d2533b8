//! Output formatting and diagnostics shared by the engines.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Both grass and the `sass` executable emit two-space indentation and `\n`
//! line endings. Their error reports share the same shape, a message line
//! followed by an excerpt and a trace, but write the trace location
//! differently:
//!
//! ```text
//! Error: expected ";".
//!   ╷
//! 1 │ a { b: c }
//!   │           ^
//!   ╵
//!   stdin 1:11  root stylesheet
//! ```
//!
//! where grass prints the last line as `./stdin:1:11`.

use once_cell::sync::Lazy;
use regex::Regex;

use sass_bridge::{CompileError, Linefeed};

/// Indentation unit the engines emit.
pub const ENGINE_INDENT: &str = "  ";

/// A stack-trace line: `<file> <line>:<column>` or `<file>:<line>:<column>`.
static TRACE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:-\s+)?(\S+?)(?::|\s+)(\d+):(\d+)(?:\s|$)").unwrap());

/// Replace the engine's indentation with `indent`, level for level.
pub fn reindent(css: &str, indent: &str) -> String {
    if indent == ENGINE_INDENT {
        return css.to_string();
    }

    css.split('\n')
        .map(|line| {
            let leading = line.len() - line.trim_start_matches(' ').len();
            let depth = leading / ENGINE_INDENT.len();
            format!(
                "{}{}",
                indent.repeat(depth),
                &line[depth * ENGINE_INDENT.len()..]
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `\n` line endings.
pub fn apply_linefeed(css: &str, linefeed: Linefeed) -> String {
    match linefeed {
        Linefeed::Lf => css.to_string(),
        other => css.replace('\n', other.as_str()),
    }
}

/// Turn an engine's error text into a located [`CompileError`].
pub fn parse_compile_error(text: &str) -> CompileError {
    let text = text.trim();
    let mut lines = text.lines();

    let message = lines
        .next()
        .map(|first| first.trim().trim_start_matches("Error:").trim())
        .filter(|m| !m.is_empty())
        .unwrap_or("Unknown compile error");
    let error = CompileError::new(message);

    let location = lines
        .filter(|line| !line.contains('│') && !line.contains('╷') && !line.contains('╵'))
        .find_map(|line| TRACE_LINE.captures(line));

    match location {
        Some(caps) => {
            let line = caps[2].parse().ok();
            let column = caps[3].parse().ok();
            match (line, column) {
                (Some(line), Some(column)) => {
                    let file = caps[1].strip_prefix("./").unwrap_or(&caps[1]);
                    error.at(file, line, column)
                }
                _ => error,
            }
        }
        None => error,
    }
}
