//! Luau target representation for the luma compiler.
//!
//! - `ir`: the tree lowering produces (`Expr`, `Stmt`, `TypeNode`, `Chunk`)
//! - `printer`: `LuauPrinter`, a debug renderer used by tests and the CLI

pub mod ir;
pub use ir::{
    BinOp, Binding, Block, Chunk, Expr, FunctionBody, Param, PropertyAccess, Stmt, TableField,
    TypeField, TypeNode, UnOp,
};

pub mod printer;
pub use printer::{LuauPrinter, print_block, print_chunk, print_expr, print_type};
