//! Command-line driver for the luma lowering engine.
//!
//! Reads a JSON lowering input (compilation units plus the front-end's oracle
//! table), lowers every file in parallel and renders Luau or diagnostics.

// Command-line surface
pub mod args;

// Options file loading and flag overrides
pub mod config;

// Input loading, parallel lowering and output
pub mod driver;
pub use driver::{ExitStatus, FileOutput, LowerOutcome, LoweringInput};

// Diagnostic rendering (text and JSON)
pub mod reporter;

// Subscriber setup for LUMA_LOG / LUMA_LOG_FORMAT
pub mod tracing_config;
