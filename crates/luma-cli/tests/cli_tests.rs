//! End-to-end runs of `luma lower` over JSON inputs written to a temp dir.

use luma_cli::args::LowerArgs;
use luma_cli::driver::{self, ExitStatus, LoweringInput};
use luma_source::{CompilationUnit, Modifiers, StmtKind, SyntaxFactory};
use std::path::{Path, PathBuf};

fn greeter_input() -> LoweringInput {
    let mut f = SyntaxFactory::new();
    let mut unit = CompilationUnit::new("Greeter.cs");
    unit.declarations = vec![f.class("Greeter")];
    LoweringInput {
        units: vec![unit],
        oracle: f.into_oracle(),
    }
}

fn broken_input() -> LoweringInput {
    let mut f = SyntaxFactory::new();
    let mut broken = f.class("Broken");
    let jump = f.stmt(StmtKind::Goto("done".into()));
    broken.members = vec![f.method_decl("Run", Modifiers::public(), Vec::new(), None, vec![jump])];
    let mut unit = CompilationUnit::new("Broken.cs");
    unit.declarations = vec![broken];
    let mut ok = CompilationUnit::new("Ok.cs");
    ok.declarations = vec![f.class("Fine")];
    LoweringInput {
        units: vec![unit, ok],
        oracle: f.into_oracle(),
    }
}

fn write_input(dir: &Path, input: &LoweringInput) -> PathBuf {
    let path = dir.join("input.json");
    let json = serde_json::to_string(input).expect("input serializes");
    std::fs::write(&path, json).expect("write input");
    path
}

fn run(args: &LowerArgs) -> (ExitStatus, String) {
    let mut out: Vec<u8> = Vec::new();
    let status = driver::run(args, &mut out).expect("run completes");
    (status, String::from_utf8(out).expect("utf-8 output"))
}

#[test]
fn test_lower_prints_chunk_with_file_header() {
    let dir = tempfile::tempdir().expect("temp dir");
    let args = LowerArgs {
        input: write_input(dir.path(), &greeter_input()),
        no_type_annotations: true,
        no_reflection: true,
        ..LowerArgs::default()
    };
    let (status, out) = run(&args);
    assert_eq!(status, ExitStatus::Success);
    assert!(out.starts_with("-- Greeter.cs\nlocal Greeter\n"), "{out}");
    assert!(out.contains("function Greeter.new("), "{out}");
    assert!(!out.contains("registerType"), "{out}");
}

#[test]
fn test_runtime_library_flag_renames_runtime_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    let args = LowerArgs {
        input: write_input(dir.path(), &greeter_input()),
        runtime_library: Some("Runtime".into()),
        ..LowerArgs::default()
    };
    let (_, out) = run(&args);
    assert!(out.contains("Runtime.Reflection.registerType(Greeter"), "{out}");
    assert!(!out.contains("CS."), "{out}");
}

#[test]
fn test_out_dir_writes_luau_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let out_dir = dir.path().join("build");
    let args = LowerArgs {
        input: write_input(dir.path(), &greeter_input()),
        out_dir: Some(out_dir.clone()),
        ..LowerArgs::default()
    };
    let (status, out) = run(&args);
    assert_eq!(status, ExitStatus::Success);
    assert!(out.is_empty(), "{out}");
    let written = std::fs::read_to_string(out_dir.join("Greeter.luau")).expect("chunk written");
    assert!(written.starts_with("local Greeter\n"), "{written}");
}

#[test]
fn test_failed_file_reports_and_sets_exit_status() {
    let dir = tempfile::tempdir().expect("temp dir");
    let args = LowerArgs {
        input: write_input(dir.path(), &broken_input()),
        ..LowerArgs::default()
    };
    let (status, out) = run(&args);
    assert_eq!(status, ExitStatus::LoweringFailed);
    assert_eq!(status.code(), 1);
    assert!(!out.contains("-- Broken.cs"), "{out}");
    assert!(out.contains("-- Ok.cs\n"), "{out}");
    assert!(out.contains("Broken.cs - error LU9001: "), "{out}");
    assert!(out.contains("\n  Related: Broken.cs - while lowering 'Broken'"), "{out}");
    assert!(out.contains("Found 1 error(s) in 1 file(s)."), "{out}");
}

#[test]
fn test_json_diagnostics() {
    let dir = tempfile::tempdir().expect("temp dir");
    let out_dir = dir.path().join("build");
    let args = LowerArgs {
        input: write_input(dir.path(), &broken_input()),
        out_dir: Some(out_dir),
        json_diagnostics: true,
        ..LowerArgs::default()
    };
    let (_, out) = run(&args);
    let diagnostics: serde_json::Value = serde_json::from_str(&out).expect("json array");
    let diagnostics = diagnostics.as_array().expect("array");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["file"], "Broken.cs");
    assert_eq!(diagnostics[0]["code"], 9001);
}

#[test]
fn test_unreadable_input_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let args = LowerArgs {
        input: dir.path().join("missing.json"),
        ..LowerArgs::default()
    };
    let mut out: Vec<u8> = Vec::new();
    let error = driver::run(&args, &mut out).expect_err("missing input");
    assert!(format!("{error:#}").contains("failed to read lowering input"));
}
