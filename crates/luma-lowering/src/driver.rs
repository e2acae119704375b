//! File and program entry points.
//!
//! Phase one collects the metadata table over every unit; phase two lowers
//! each file independently against it. Files share nothing mutable, so
//! callers may run `lower_unit` in parallel.

use crate::error::LoweringError;
use crate::hoisting::declaration_order;
use crate::lowerer::Lowerer;
use crate::metadata::MetadataTable;
use crate::options::LoweringOptions;
use luma_common::DiagnosticSink;
use luma_source::{CompilationUnit, TypeDecl, TypeDeclKind, TypeOracle};
use luma_target::Chunk;
use thiserror::Error;

/// A file that produced at least one error diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("lowering '{file}' failed with {diagnostics} error(s)")]
pub struct FileFailure {
    pub file: String,
    pub diagnostics: usize,
}

/// Outcome of one file of a program.
#[derive(Debug)]
pub struct LoweredFile {
    pub file: String,
    pub result: Result<Chunk, FileFailure>,
}

/// Lower one compilation unit.
///
/// A `FeatureDisabled` error skips the declaration it occurred in and
/// lowering continues; the file is still reported as failed. Any other
/// error stops the file.
pub fn lower_unit(
    unit: &CompilationUnit,
    oracle: &dyn TypeOracle,
    metadata: &MetadataTable,
    options: &LoweringOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<Chunk, FileFailure> {
    let _span = tracing::debug_span!("lower_file", file = %unit.file_name).entered();
    let mut lowerer = Lowerer::new(unit, oracle, metadata, options);

    // Interfaces have no runtime binding.
    for decl in &unit.declarations {
        if decl.kind != TypeDeclKind::Interface {
            let full_name = unit.qualified_name(decl);
            lowerer.ctx.register_local_type(&full_name, &decl.name);
        }
    }

    let mut body = Vec::new();
    let mut failures = 0usize;
    let mut report = |error: &LoweringError, decl: Option<&TypeDecl>, sink: &mut dyn DiagnosticSink| {
        tracing::debug!(code = error.code(), %error, "[lowering] reported");
        let mut diagnostic = error.to_diagnostic(&unit.file_name);
        if let Some(decl) = decl {
            diagnostic = diagnostic.with_related(
                unit.file_name.clone(),
                decl.span.start,
                decl.span.len(),
                format!("while lowering '{}'", decl.name),
            );
        }
        sink.report(diagnostic);
        failures += 1;
    };

    for index in declaration_order(unit, metadata, oracle) {
        let decl = &unit.declarations[index];
        match lowerer.lower_type_decl(decl) {
            Ok(stmts) => {
                flush_predeclarations(&mut lowerer, &mut body);
                body.extend(stmts);
            }
            Err(error) if error.is_recoverable() => report(&error, Some(decl), sink),
            Err(error) => {
                report(&error, Some(decl), sink);
                return Err(FileFailure {
                    file: unit.file_name.clone(),
                    diagnostics: failures,
                });
            }
        }
    }

    match lowerer.lower_stmts(&unit.statements) {
        Ok(stmts) => {
            flush_predeclarations(&mut lowerer, &mut body);
            body.extend(stmts);
        }
        Err(error) => report(&error, None, sink),
    }

    lowerer.ctx.assert_balanced();
    if failures > 0 {
        return Err(FileFailure {
            file: unit.file_name.clone(),
            diagnostics: failures,
        });
    }
    Ok(Chunk { body })
}

/// `local T` for every type referenced before its declaration was lowered.
fn flush_predeclarations(lowerer: &mut Lowerer<'_>, body: &mut Vec<luma_target::Stmt>) {
    let pending = lowerer.ctx.ledger.take_pending();
    if !pending.is_empty() {
        tracing::trace!(count = pending.len(), "[lowering] forward type references predeclared");
        body.extend(pending);
    }
}

/// Collect metadata over `units`, then lower each of them in order.
pub fn lower_program(
    units: &[CompilationUnit],
    oracle: &dyn TypeOracle,
    options: &LoweringOptions,
    sink: &mut dyn DiagnosticSink,
) -> Vec<LoweredFile> {
    let metadata = MetadataTable::collect(units, oracle);
    units
        .iter()
        .map(|unit| LoweredFile {
            file: unit.file_name.clone(),
            result: lower_unit(unit, oracle, &metadata, options, sink),
        })
        .collect()
}
