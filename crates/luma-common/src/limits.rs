//! Centralized limits and thresholds for the lowering engine.
//!
//! Shared constants for recursion depths and naming limits used across crates.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum nesting depth for expression lowering.
///
/// Each nested source expression adds a frame to the call stack; beyond this
/// depth lowering reports an unsupported construct instead of overflowing.
pub const MAX_EXPR_LOWERING_DEPTH: u32 = 500;

/// Maximum nesting depth for statement lowering (blocks inside blocks).
pub const MAX_STMT_LOWERING_DEPTH: u32 = 250;

/// Maximum depth for pattern compilation (`{ A: { B: { C: ... } } }`).
pub const MAX_PATTERN_DEPTH: u32 = 100;

// =============================================================================
// Naming Limits
// =============================================================================

/// Upper bound on the disambiguation suffix tried for a shadowed identifier
/// before lowering gives up.
pub const MAX_IDENTIFIER_DISAMBIGUATION: u32 = 10_000;
