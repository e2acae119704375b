//! Typed source AST and semantic oracle interface.
//!
//! The front-end (parser plus semantic resolver) is an external collaborator.
//! It hands lowering a fully resolved tree (`ast`) and a `TypeOracle` that
//! answers questions about its nodes.

pub mod ast;
pub use ast::*;

pub mod types;
pub use types::{CollectionKind, GeneratorShape, PrimitiveKind, TypeInfo, TypeKind};

pub mod oracle;
pub use oracle::{ConstantValue, Resolution, SymbolInfo, SymbolKind, TableOracle, TypeOracle};

// Read-only AST traversal and common queries
pub mod visit;

// Test-facing tree builder
pub mod factory;
pub use factory::SyntaxFactory;
