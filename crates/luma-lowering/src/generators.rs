//! Iterator bodies.
//!
//! A body made only of `yield return <literal or name>` becomes an
//! enumerator over a literal list. Anything else is cut after every
//! top-level `yield`, and each run becomes a partition closure:
//!
//! ```text
//! return CS.Enumerator.new(function()
//!     local total
//!     return {
//!         function(_break)
//!             total = 0
//!             return total
//!         end,
//!         function(_break)
//!             _break()
//!             return
//!         end,
//!     }
//! end)
//! ```
//!
//! The runtime runs partitions in order; a partition's return value is the
//! yielded element, and calling the callback ends the sequence. Top-level
//! locals live in the initializer so every partition sees them.

use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::Lowerer;
use crate::runtime::{ControlTransfer, ENUMERATOR, ENUMERATOR_NEW};
use luma_source::{Body, ExprKind, GeneratorShape, Literal, Stmt, StmtKind, TypeSyntax, VariableDeclarator};
use luma_target::{Binding, Block, Expr, Param, Stmt as TStmt, TableField, TypeNode};

impl Lowerer<'_> {
    pub(crate) fn lower_generator_body(
        &mut self,
        shape: GeneratorShape,
        body: &Body,
    ) -> LoweringResult<Block> {
        let Body::Block(stmts) = body else {
            return self.lower_function_body(body, true);
        };

        if let Some(values) = flat_yields(stmts) {
            tracing::debug!(?shape, count = values.len(), "[lowering] iterator from literal list");
            let items = values
                .into_iter()
                .map(|value| self.lower_expr(value))
                .collect::<LoweringResult<Vec<_>>>()?;
            let enumerator = self.runtime.call(ENUMERATOR_NEW, vec![Expr::array(items)]);
            return Ok(vec![TStmt::Return(vec![enumerator])]);
        }

        let runs = partitions(stmts);
        tracing::debug!(?shape, partitions = runs.len(), "[lowering] iterator partitions");
        let initializer = self.with_function(|this| {
            let hoisted = hoisted_names(stmts)
                .into_iter()
                .map(|name| Binding::new(this.declare_local(name)))
                .collect::<Vec<_>>();
            let mut block = Vec::with_capacity(2);
            if !hoisted.is_empty() {
                block.push(TStmt::Local {
                    bindings: hoisted,
                    values: Vec::new(),
                });
            }
            let mut closures = Vec::with_capacity(runs.len());
            for run in runs {
                closures.push(TableField::Positional(this.lower_partition(run)?));
            }
            block.push(TStmt::Return(vec![Expr::Table(closures)]));
            Ok(block)
        })?;
        let enumerator = self
            .runtime
            .call(ENUMERATOR_NEW, vec![Expr::function(Vec::new(), initializer)]);
        Ok(vec![TStmt::Return(vec![enumerator])])
    }

    fn lower_partition(&mut self, run: &[Stmt]) -> LoweringResult<Expr> {
        self.with_function(|this| {
            let callback = this.ctx.fresh("_break");
            this.ctx.push_generator(callback.clone());
            let body = this.lower_partition_stmts(run);
            this.ctx.pop_generator();
            Ok(Expr::function(vec![Param::new(callback)], body?))
        })
    }

    fn lower_partition_stmts(&mut self, run: &[Stmt]) -> LoweringResult<Block> {
        let mut block = Vec::with_capacity(run.len());
        for stmt in run {
            let lowered = match &stmt.kind {
                StmtKind::LocalDeclaration(decls) => {
                    self.lower_stmt_with(stmt, |this| this.assign_hoisted(stmt, decls))?
                }
                StmtKind::LocalFunction(decl) => {
                    self.lower_stmt_with(stmt, |this| this.lower_local_function(decl, true))?
                }
                StmtKind::YieldReturn(value) => self.lower_stmt_with(stmt, |this| {
                    let value = this.lower_expr(value)?;
                    Ok(vec![TStmt::Return(vec![value])])
                })?,
                _ => self.lower_stmt(stmt)?,
            };
            block.extend(lowered);
        }
        Ok(block)
    }

    /// A top-level local of an iterator, already declared by the
    /// initializer, assigned its initial value.
    fn assign_hoisted(
        &mut self,
        stmt: &Stmt,
        decls: &[VariableDeclarator],
    ) -> LoweringResult<Vec<TStmt>> {
        let mut block = Vec::with_capacity(decls.len());
        for decl in decls {
            let Some(emitted) = self.ctx.lookup(&decl.name).map(|b| b.emitted.clone()) else {
                return Err(LoweringError::unresolved("local", &decl.name, stmt.span));
            };
            let (pre, value) = self.capture(|this| this.declarator_value(decl))?;
            block.extend(pre);
            if let Some(value) = value {
                block.push(TStmt::assign(Expr::id(emitted), value));
            }
        }
        Ok(block)
    }

    /// `yield break`: signal the end of the sequence and leave the
    /// partition, through the sentinel protocol when inside a try region.
    pub(crate) fn lower_nested_yield_break(&mut self, stmt: &Stmt) -> LoweringResult<Vec<TStmt>> {
        let Some(generator) = self.ctx.current_generator() else {
            return Err(LoweringError::unsupported(
                stmt.kind.name(),
                "'yield break' inside a nested function",
                stmt.span,
            ));
        };
        let signal = TStmt::Call(Expr::call(Expr::id(generator.break_callback.clone()), Vec::new()));
        let leave = if self.ctx.in_generator_helper() {
            self.sentinel(ControlTransfer::Return, Vec::new())
        } else {
            TStmt::Return(Vec::new())
        };
        Ok(vec![signal, leave])
    }

    /// `{T}` for an enumerable, `CS.Enumerator<T>` for an enumerator.
    pub(crate) fn generator_annotation(
        &self,
        shape: GeneratorShape,
        return_type: Option<&TypeSyntax>,
    ) -> Option<TypeNode> {
        if !self.options.emit_type_annotations {
            return None;
        }
        let element = self
            .syntax_type(return_type)
            .and_then(|ty| ty.type_arguments.first())
            .map_or(TypeNode::Any, |element| self.type_annotation(element));
        Some(match shape {
            GeneratorShape::Enumerable => TypeNode::array(element),
            GeneratorShape::Enumerator => {
                TypeNode::generic(format!("{}.{ENUMERATOR}", self.runtime.name()), vec![element])
            }
        })
    }
}

/// The yielded values when the body is nothing but `yield return` of
/// literals and names.
fn flat_yields(stmts: &[Stmt]) -> Option<Vec<&luma_source::Expr>> {
    if stmts.is_empty() {
        return None;
    }
    stmts
        .iter()
        .map(|stmt| match &stmt.kind {
            StmtKind::YieldReturn(value) => match &value.kind {
                ExprKind::Literal(Literal::Null) => None,
                ExprKind::Literal(_) | ExprKind::Identifier(_) => Some(value),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Runs of statements, each ending at a top-level `yield`.
fn partitions(stmts: &[Stmt]) -> Vec<&[Stmt]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for (index, stmt) in stmts.iter().enumerate() {
        if matches!(stmt.kind, StmtKind::YieldReturn(_) | StmtKind::YieldBreak) {
            runs.push(&stmts[start..=index]);
            start = index + 1;
        }
    }
    if start < stmts.len() {
        runs.push(&stmts[start..]);
    }
    runs
}

fn hoisted_names(stmts: &[Stmt]) -> Vec<&str> {
    let mut names = Vec::new();
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::LocalDeclaration(decls) => {
                names.extend(decls.iter().map(|d| d.name.as_str()));
            }
            StmtKind::LocalFunction(decl) => names.push(decl.name.as_str()),
            _ => {}
        }
    }
    names
}
