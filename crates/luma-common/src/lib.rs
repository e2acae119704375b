//! Common types and utilities for the luma compiler.
//!
//! This crate provides foundational types used across all luma crates:
//! - Source spans (`Span`) attached to every source node
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`, codes and templates)
//! - Centralized limits

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::Span;

// Diagnostics surfaced to the caller's reporting sink
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink, format_message};

// Centralized limits and thresholds
pub mod limits;
