use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the luma binary.
#[derive(Parser, Debug)]
#[command(name = "luma", version, about = "Lower typed C# syntax trees to Luau")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lower a JSON export of resolved compilation units to Luau.
    Lower(LowerArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct LowerArgs {
    /// JSON file holding `{ "units": [...], "oracle": {...} }`.
    pub input: PathBuf,

    // ==================== Options ====================
    /// Lowering options file (camelCase JSON).
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Allow LINQ methods to lower to runtime iterator helpers.
    #[arg(long = "iterator-helpers")]
    pub iterator_helpers: bool,

    /// Name of the global runtime table referenced by lowered code.
    #[arg(long = "runtime-library")]
    pub runtime_library: Option<String>,

    /// Omit Luau type annotations and aliases.
    #[arg(long = "no-type-annotations")]
    pub no_type_annotations: bool,

    /// Omit `registerType` reflection calls.
    #[arg(long = "no-reflection")]
    pub no_reflection: bool,

    // ==================== Output ====================
    /// Write `<stem>.luau` per input file instead of printing to stdout.
    #[arg(short = 'o', long = "out-dir")]
    pub out_dir: Option<PathBuf>,

    /// Print diagnostics as a JSON array.
    #[arg(long = "json-diagnostics")]
    pub json_diagnostics: bool,

    /// Colorize text diagnostics.
    #[arg(long)]
    pub pretty: bool,
}
