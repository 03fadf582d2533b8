//! Orchestrator behavior: options, paths, stats and error shapes.

mod common;

use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use sass_bridge::{ErrorKind, RenderOptions, SourceMapOption};

use common::{renderer, write_fixtures};

fn include_fixtures() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_fixtures(
        dir.path(),
        &[
            ("include-files/index.scss", "@import 'bar';\n@import 'foo';\n"),
            ("include-files/bar.scss", "bar { a: b; }\n"),
            ("include-files/foo.scss", "foo { a: b; }\n"),
            ("simple/index.scss", "div { color: red; }\n"),
        ],
    );
    dir
}

fn slash(path: PathBuf) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[test]
fn test_stats_for_data_input() {
    let dir = include_fixtures();
    let options = RenderOptions::from_data("@import 'bar';\n@import 'foo';\n")
        .include_path(dir.path().join("include-files"));

    let result = renderer(dir.path()).render_sync(options).unwrap();
    let stats = &result.stats;

    assert_eq!(stats.entry, "data");
    assert!(stats.end >= stats.start);
    assert_eq!(stats.duration, stats.end - stats.start);
    assert_eq!(
        stats.included_files,
        vec![
            slash(dir.path().join("include-files/bar.scss")),
            slash(dir.path().join("include-files/foo.scss")),
        ]
    );
}

#[test]
fn test_stats_for_file_input() {
    let dir = include_fixtures();
    let entry = dir.path().join("include-files/index.scss");

    let result = renderer(dir.path())
        .render_sync(RenderOptions::from_file("include-files/index.scss"))
        .unwrap();

    assert_eq!(result.stats.entry, entry.to_string_lossy());
    assert_eq!(
        result.stats.included_files,
        vec![
            slash(entry.clone()),
            slash(dir.path().join("include-files/bar.scss")),
            slash(dir.path().join("include-files/foo.scss")),
        ]
    );
}

#[test]
fn test_stats_without_imports() {
    let dir = include_fixtures();

    let result = renderer(dir.path())
        .render_sync(RenderOptions::from_file("simple/index.scss"))
        .unwrap();
    assert_eq!(
        result.stats.included_files,
        vec![slash(dir.path().join("simple/index.scss"))]
    );

    let result = renderer(dir.path())
        .render_sync(RenderOptions::from_data("div { color: red; }"))
        .unwrap();
    assert!(result.stats.included_files.is_empty());
}

#[test]
fn test_stats_serialize_camel_case() {
    let result = renderer("/")
        .render_sync(RenderOptions::from_data("a { b: c; }"))
        .unwrap();
    let json = serde_json::to_value(&result.stats).unwrap();

    assert_eq!(json["entry"], "data");
    assert_eq!(json["includedFiles"], json!([]));
}

#[test]
fn test_map_file_with_absolute_out_file() {
    let dir = include_fixtures();
    let options = RenderOptions::from_file("simple/index.scss")
        .source_map(SourceMapOption::Flag(true))
        .out_file(dir.path().join("simple/index-test.css"));

    let result = renderer(dir.path()).render_sync(options).unwrap();
    let map: serde_json::Value = serde_json::from_str(&result.map_json().unwrap()).unwrap();
    assert_eq!(map["file"], "index-test.css");
    assert!(
        result
            .css_str()
            .ends_with("/*# sourceMappingURL=index-test.css.map */")
    );
}

#[test]
fn test_map_file_with_relative_out_file() {
    let dir = include_fixtures();
    let options = RenderOptions::from_file("simple/index.scss")
        .source_map(SourceMapOption::Flag(true))
        .out_file("./index-test.css");

    let result = renderer(dir.path()).render_sync(options).unwrap();
    assert_eq!(result.map.unwrap()["file"], "index-test.css");
}

#[test]
fn test_map_file_with_relative_map_path() {
    let dir = include_fixtures();
    let options = RenderOptions::from_file("simple/index.scss")
        .source_map(SourceMapOption::Path(PathBuf::from("./deep/nested/index.map")))
        .out_file("./index-test.css")
        .source_map_root("http://test.com/");

    let result = renderer(dir.path()).render_sync(options).unwrap();
    let map = result.map.unwrap();
    assert_eq!(map["file"], "../../index-test.css");
    assert_eq!(map["sourceRoot"], "http://test.com/");
}

#[test]
fn test_map_sources_content() {
    let dir = include_fixtures();
    let mut options = RenderOptions::from_file("simple/index.scss")
        .source_map(SourceMapOption::Flag(true))
        .out_file("index-test.css");
    options.source_map_contents = true;

    let result = renderer(dir.path()).render_sync(options).unwrap();
    assert_eq!(
        result.map.unwrap()["sourcesContent"],
        json!(["div { color: red; }\n"])
    );
}

#[test]
fn test_options_from_json_record() {
    let dir = include_fixtures();
    let options = RenderOptions::from_json(json!({
        "file": "simple/index.scss",
        "sourceMap": "./deep/nested/index.map",
        "outFile": "./index-test.css",
    }))
    .unwrap();

    let result = renderer(dir.path()).render_sync(options).unwrap();
    assert_eq!(result.map.unwrap()["file"], "../../index-test.css");
}

#[test]
fn test_missing_and_conflicting_input() {
    let err = renderer("/").render_sync(RenderOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Options);
    assert!(err.status > 0);

    let mut both = RenderOptions::from_data("a { b: c; }");
    both.file = Some(PathBuf::from("index.scss"));
    let err = renderer("/").render_sync(both).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Options);
}

#[test]
fn test_compile_error_location() {
    let err = renderer("/")
        .render_sync(RenderOptions::from_data("a {\n  @error \"invalid property name\";\n}"))
        .unwrap_err();

    assert_eq!(err.status, 1);
    assert_eq!(err.to_json(), json!({
        "message": "invalid property name",
        "status": 1,
        "line": 2,
        "column": 3,
        "file": "stdin",
    }));
    insta::assert_snapshot!(err.formatted(), @r"
    Error: invalid property name
            on line 2:3 of stdin
    ");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_shape_matches_across_entry_points() {
    let options = || RenderOptions::from_data("@error \"boom\";");

    let blocking = renderer("/").render_sync(options()).unwrap_err();
    let non_blocking = renderer("/").render(options()).await.unwrap_err();

    assert_eq!(blocking, non_blocking);
}

#[test]
fn test_unresolved_import() {
    let err = renderer("/")
        .render_sync(RenderOptions::from_data("@import 'nowhere';"))
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Compile);
    assert!(err.message.contains("nowhere"));
}

#[test]
fn test_info() {
    let info = renderer("/").info().unwrap();
    let lines: Vec<&str> = info.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("sass-bridge\t"));
    assert!(lines[0].ends_with("\t(Wrapper)\t[Rust]"));
    assert_eq!(lines[1], "toy\t1.0.0\t(Sass Compiler)\t[Rust]");
}
