use anyhow::{Context, Result};
use luma_common::Diagnostic;
use luma_lowering::{LoweringOptions, MetadataTable, lower_unit};
use luma_source::{CompilationUnit, TableOracle};
use luma_target::print_chunk;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::args::LowerArgs;
use crate::config::resolve_options;
use crate::reporter::{Reporter, render_json};

/// The front-end's export: resolved units and the oracle table for their nodes.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoweringInput {
    pub units: Vec<CompilationUnit>,
    #[serde(default)]
    pub oracle: TableOracle,
}

pub fn load_input(path: &Path) -> Result<LoweringInput> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read lowering input {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("failed to parse lowering input {}", path.display()))
}

/// Result of lowering one file. `luau` is `None` when the file failed.
#[derive(Clone, Debug)]
pub struct FileOutput {
    pub file: String,
    pub luau: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Debug, Default)]
pub struct LowerOutcome {
    /// In input order.
    pub files: Vec<FileOutput>,
}

impl LowerOutcome {
    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| f.luau.is_none()).count()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.files
            .iter()
            .flat_map(|f| f.diagnostics.iter().cloned())
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    LoweringFailed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::LoweringFailed => 1,
        }
    }
}

/// Collect metadata over every unit, then lower the files in parallel.
pub fn lower_input(input: &LoweringInput, options: &LoweringOptions) -> LowerOutcome {
    let metadata = MetadataTable::collect(&input.units, &input.oracle);
    let files = input
        .units
        .par_iter()
        .map(|unit| {
            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            let result = lower_unit(unit, &input.oracle, &metadata, options, &mut diagnostics);
            FileOutput {
                file: unit.file_name.clone(),
                luau: result.ok().map(|chunk| print_chunk(&chunk)),
                diagnostics,
            }
        })
        .collect();
    LowerOutcome { files }
}

/// `luma lower`: chunks and diagnostics go to `out`.
pub fn run(args: &LowerArgs, out: &mut dyn Write) -> Result<ExitStatus> {
    let _span = tracing::info_span!("lower", input = %args.input.display()).entered();
    let options = resolve_options(args)?;
    let input = load_input(&args.input)?;
    tracing::debug!(units = input.units.len(), resolutions = input.oracle.len(), "[cli] loaded input");

    let outcome = lower_input(&input, &options);

    match &args.out_dir {
        Some(dir) => write_outputs(dir, &outcome)?,
        None => {
            for file in &outcome.files {
                if let Some(luau) = &file.luau {
                    writeln!(out, "-- {}", file.file)?;
                    write!(out, "{luau}")?;
                }
            }
        }
    }

    let diagnostics = outcome.diagnostics();
    if args.json_diagnostics {
        writeln!(out, "{}", render_json(&diagnostics)?)?;
    } else if !diagnostics.is_empty() {
        let mut reporter = Reporter::new(args.pretty);
        for unit in &input.units {
            if let Some(text) = &unit.source_text {
                reporter.add_source(unit.file_name.clone(), text.clone());
            }
        }
        writeln!(out, "{}", reporter.render(&diagnostics))?;
        writeln!(
            out,
            "\nFound {} error(s) in {} file(s).",
            diagnostics.iter().filter(|d| d.is_error()).count(),
            outcome.failed_files()
        )?;
    }

    if outcome.failed_files() > 0 {
        Ok(ExitStatus::LoweringFailed)
    } else {
        Ok(ExitStatus::Success)
    }
}

/// `Game/Player.cs` becomes `<dir>/Game/Player.luau`. Root and parent
/// components are dropped so output stays under `dir`.
pub fn output_path(dir: &Path, file: &str) -> PathBuf {
    let relative: PathBuf = Path::new(file)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    dir.join(relative).with_extension("luau")
}

fn write_outputs(dir: &Path, outcome: &LowerOutcome) -> Result<()> {
    for file in &outcome.files {
        let Some(luau) = &file.luau else {
            continue;
        };
        let path = output_path(dir, &file.file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, luau).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "[cli] wrote chunk");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_keeps_relative_directories() {
        let dir = Path::new("out");
        assert_eq!(output_path(dir, "Game/Player.cs"), PathBuf::from("out/Game/Player.luau"));
        assert_eq!(output_path(dir, "/abs/Main.cs"), PathBuf::from("out/abs/Main.luau"));
        assert_eq!(output_path(dir, "../Up.cs"), PathBuf::from("out/Up.luau"));
    }

    #[test]
    fn test_input_without_oracle_defaults_to_empty() {
        let input: LoweringInput =
            serde_json::from_str(r#"{ "units": [{ "fileName": "A.cs" }] }"#).expect("valid input");
        assert_eq!(input.units.len(), 1);
        assert!(input.oracle.is_empty());
    }
}
