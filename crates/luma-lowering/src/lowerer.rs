//! The lowering walker.
//!
//! `Lowerer` holds everything one file needs: the source unit, the shared
//! oracle and metadata table, the options and the per-file
//! `LoweringContext`. Its methods are split across the `expressions`,
//! `statements`, `patterns`, `declarations`, `generators` and
//! `async_lowering` modules; this file only carries the shared plumbing.
//!
//! Stack discipline is enforced with closure-scoped helpers (`capture`,
//! `with_scope`, `with_function`): the matching pop runs even when the
//! closure returns an error, so `?` inside a builder can never leave a stack
//! unbalanced.

use crate::context::{BindingKind, LoweringContext};
use crate::error::{LoweringError, LoweringResult};
use crate::metadata::{MetadataTable, TypeMetadata};
use crate::options::LoweringOptions;
use crate::runtime::Runtime;
use luma_common::Span;
use luma_common::limits::{MAX_EXPR_LOWERING_DEPTH, MAX_STMT_LOWERING_DEPTH};
use luma_source::{CompilationUnit, NodeId, SymbolInfo, TypeInfo, TypeOracle};
use luma_target::{Expr, Stmt};

/// Receiver of the innermost conditional access.
#[derive(Clone, Debug)]
pub(crate) struct BindingReceiver {
    pub value: Expr,
    pub ty: Option<TypeInfo>,
    /// The receiver is an event's signal object.
    pub is_event: bool,
}

/// The type whose members are being lowered.
#[derive(Clone, Debug)]
pub(crate) struct TypeFrame {
    pub full_name: String,
    /// Emitted name of the type's file-level local.
    pub local_name: String,
    /// Full name of the base class.
    pub base: Option<String>,
}

pub struct Lowerer<'a> {
    pub(crate) unit: &'a CompilationUnit,
    pub(crate) oracle: &'a dyn TypeOracle,
    pub(crate) metadata: &'a MetadataTable,
    pub(crate) options: &'a LoweringOptions,
    pub(crate) runtime: Runtime,
    pub(crate) ctx: LoweringContext,
    pub(crate) current_type: Option<TypeFrame>,
    /// Receivers of the enclosing conditional accesses; `MemberBinding`
    /// and `ElementBinding` nodes read the innermost one.
    pub(crate) binding_receivers: Vec<BindingReceiver>,
    /// Emitted catch parameters, innermost last; `throw;` rethrows the last.
    pub(crate) catch_variables: Vec<String>,
    /// Set by an expression statement whose invocation result is unused.
    pub(crate) value_discarded: bool,
    expr_depth: u32,
    stmt_depth: u32,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        unit: &'a CompilationUnit,
        oracle: &'a dyn TypeOracle,
        metadata: &'a MetadataTable,
        options: &'a LoweringOptions,
    ) -> Self {
        Self {
            unit,
            oracle,
            metadata,
            options,
            runtime: Runtime::new(options.runtime_library.clone()),
            ctx: LoweringContext::new(&options.runtime_library),
            current_type: None,
            binding_receivers: Vec::new(),
            catch_variables: Vec::new(),
            value_discarded: false,
            expr_depth: 0,
            stmt_depth: 0,
        }
    }

    // =========================================================================
    // Stack helpers
    // =========================================================================

    /// Run `f` with a fresh prerequisite frame; returns the statements it
    /// queued together with its result.
    pub(crate) fn capture<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LoweringResult<R>,
    ) -> LoweringResult<(Vec<Stmt>, R)> {
        self.ctx.begin_capture();
        let result = f(self);
        let prerequisites = self.ctx.end_capture();
        result.map(|value| (prerequisites, value))
    }

    pub(crate) fn with_scope<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LoweringResult<R>,
    ) -> LoweringResult<R> {
        self.ctx.push_scope();
        let result = f(self);
        self.ctx.pop_scope();
        result
    }

    /// Run `f` as the body of a new target function: a new scope, and no
    /// enclosing loops or try regions.
    pub(crate) fn with_function<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LoweringResult<R>,
    ) -> LoweringResult<R> {
        self.ctx.enter_function();
        let receivers = std::mem::take(&mut self.binding_receivers);
        let result = self.with_scope(f);
        self.binding_receivers = receivers;
        self.ctx.exit_function();
        result
    }

    /// Run `f` with a conditional-access receiver in scope.
    pub(crate) fn with_binding_receiver<R>(
        &mut self,
        receiver: BindingReceiver,
        f: impl FnOnce(&mut Self) -> LoweringResult<R>,
    ) -> LoweringResult<R> {
        self.binding_receivers.push(receiver);
        let result = f(self);
        self.binding_receivers.pop();
        result
    }

    pub(crate) fn enter_expr(&mut self, span: Span) -> LoweringResult<()> {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPR_LOWERING_DEPTH {
            self.expr_depth -= 1;
            return Err(LoweringError::unsupported(
                "expression",
                "nesting exceeds the lowering depth limit",
                span,
            ));
        }
        Ok(())
    }

    pub(crate) fn exit_expr(&mut self) {
        self.expr_depth -= 1;
    }

    pub(crate) fn enter_stmt(&mut self, span: Span) -> LoweringResult<()> {
        self.stmt_depth += 1;
        if self.stmt_depth > MAX_STMT_LOWERING_DEPTH {
            self.stmt_depth -= 1;
            return Err(LoweringError::unsupported(
                "statement",
                "nesting exceeds the lowering depth limit",
                span,
            ));
        }
        Ok(())
    }

    pub(crate) fn exit_stmt(&mut self) {
        self.stmt_depth -= 1;
    }

    // =========================================================================
    // Prerequisites and temporaries
    // =========================================================================

    /// Queue a statement before the statement under construction.
    pub(crate) fn emit(&mut self, stmt: Stmt) {
        self.ctx.push_prerequisite(stmt);
    }

    /// Bind `value` to a fresh temporary and return a reference to it.
    pub(crate) fn bind_temp(&mut self, base: &str, value: Expr) -> Expr {
        let name = self.ctx.fresh(base);
        self.emit(Stmt::local(name.clone(), Some(value)));
        Expr::Identifier(name)
    }

    /// `value` itself when re-evaluating it is unobservable, else a temporary.
    pub(crate) fn spill(&mut self, value: Expr, base: &str) -> Expr {
        if is_stable(&value) {
            value
        } else {
            self.bind_temp(base, value)
        }
    }

    /// Lower operands left to right. When a later operand queues
    /// prerequisites, earlier results are pinned into temporaries first so
    /// they still observe the state before those prerequisites.
    pub(crate) fn lower_ordered(&mut self, exprs: &[&luma_source::Expr]) -> LoweringResult<Vec<Expr>> {
        self.lower_ordered_after(Vec::with_capacity(exprs.len()), exprs)
    }

    /// `lower_ordered` continuing after already-lowered operands (a call
    /// receiver, say).
    pub(crate) fn lower_ordered_after(
        &mut self,
        mut lowered: Vec<Expr>,
        exprs: &[&luma_source::Expr],
    ) -> LoweringResult<Vec<Expr>> {
        for expr in exprs {
            let (prerequisites, value) = self.capture(|this| this.lower_expr(expr))?;
            self.pin_before(&mut lowered, prerequisites);
            lowered.push(value);
        }
        Ok(lowered)
    }

    /// Spill every non-stable value of `earlier`, then queue `prerequisites`.
    pub(crate) fn pin_before(&mut self, earlier: &mut [Expr], prerequisites: Vec<Stmt>) {
        if prerequisites.is_empty() {
            return;
        }
        for value in earlier.iter_mut() {
            if !is_stable(value) {
                let taken = std::mem::replace(value, Expr::Nil);
                *value = self.bind_temp("_temp", taken);
            }
        }
        for stmt in prerequisites {
            self.emit(stmt);
        }
    }

    /// Lower `expr` into a standalone block: its prerequisites followed by
    /// `finish(value)`.
    pub(crate) fn lower_into_block(
        &mut self,
        expr: &luma_source::Expr,
        finish: impl FnOnce(Expr) -> Stmt,
    ) -> LoweringResult<Vec<Stmt>> {
        let (mut block, value) = self.capture(|this| this.lower_expr(expr))?;
        block.push(finish(value));
        Ok(block)
    }

    // =========================================================================
    // Oracle shorthands
    // =========================================================================

    pub(crate) fn type_of(&self, id: NodeId) -> Option<&'a TypeInfo> {
        self.oracle.type_of(id)
    }

    pub(crate) fn symbol_of(&self, id: NodeId) -> Option<&'a SymbolInfo> {
        self.oracle.symbol_of(id)
    }

    /// Metadata of the type declaring `symbol`.
    pub(crate) fn owner_metadata(&self, symbol: &SymbolInfo) -> Option<&'a TypeMetadata> {
        symbol
            .containing_type
            .as_deref()
            .and_then(|name| self.metadata.get(name))
    }

    pub(crate) fn current_type_name(&self) -> Option<&str> {
        self.current_type.as_ref().map(|t| t.full_name.as_str())
    }

    /// Declare a source local in the innermost scope.
    pub(crate) fn declare_local(&mut self, name: &str) -> String {
        self.ctx.declare(name, BindingKind::Local)
    }

    // =========================================================================
    // Errors
    // =========================================================================

    pub(crate) fn unsupported_expr(&self, expr: &luma_source::Expr) -> LoweringError {
        LoweringError::unsupported(expr.kind.name(), self.unit.text_of(expr.span), expr.span)
    }

    pub(crate) fn unsupported_stmt(&self, stmt: &luma_source::Stmt) -> LoweringError {
        LoweringError::unsupported(stmt.kind.name(), self.unit.text_of(stmt.span), stmt.span)
    }
}

/// Values that can be evaluated again without observing a different result.
pub(crate) fn is_stable(expr: &Expr) -> bool {
    match expr {
        Expr::Nil | Expr::Boolean(_) | Expr::Number(_) | Expr::String(_) | Expr::Function(_) => {
            true
        }
        Expr::Identifier(name) => name == "self",
        Expr::Parenthesized(inner) => is_stable(inner),
        Expr::Unary {
            op: luma_target::UnOp::Neg,
            operand,
        } => is_stable(operand),
        _ => false,
    }
}

/// The statement evaluating `value` for its effects, if it has any.
pub(crate) fn discard(value: Expr) -> Option<Stmt> {
    (!value.is_pure()).then(|| Stmt::expr(value))
}
