//! Lowering from the typed source AST to the Luau target tree.
//!
//! Two phases:
//! - `metadata`: one pass over every compilation unit that fixes each
//!   type's layout strategy and its emitted member names
//! - `driver`: lowers each file independently against that table
//!
//! Everything stateful for one file lives in `context::LoweringContext`,
//! owned by a `Lowerer`.

// Per-file state: scopes, name allocation, loops, try regions
pub mod context;

// Error kinds and their diagnostics
pub mod error;
pub use error::{LoweringError, LoweringResult};

pub mod options;
pub use options::LoweringOptions;

// Program-wide type layout and member naming
pub mod metadata;
pub use metadata::{LayoutStrategy, MetadataTable, TypeMetadata};

// Runtime library entry points referenced by lowered code
pub mod runtime;
pub use runtime::{ControlTransfer, Runtime};

pub mod lowerer;
pub use lowerer::Lowerer;

pub mod hoisting;
pub use hoisting::declaration_order;

pub mod driver;
pub use driver::{FileFailure, LoweredFile, lower_program, lower_unit};

// Lowerer methods, split by syntax category
mod async_lowering;
mod declarations;
mod expressions;
mod generators;
mod patterns;
mod statements;
mod types;
