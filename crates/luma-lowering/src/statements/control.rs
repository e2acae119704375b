//! Non-local control transfer and try-like regions.
//!
//! A try-like region (`try`/`catch`/`finally`, `using`) lowers its bodies
//! into closures handed to `CS.try`. A `break`/`continue` whose target lies
//! outside the region, and every `return` inside it, cannot leave the
//! closure natively. It returns a sentinel pair instead:
//!
//! ```text
//! return CS.TRY_BREAK, {}
//! return CS.TRY_RETURN, { value }
//! ```
//!
//! After the `CS.try` call the pair is dispatched back into the native
//! transfer, or returned again when the call itself sits in another region.

use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::Lowerer;
use crate::runtime::{ControlTransfer, TRY};
use luma_source::{CatchClause, Expr, Stmt, TypeInfo, VariableDeclarator};
use luma_target::{Binding, Block, Expr as Target, Param, Stmt as TStmt};

impl Lowerer<'_> {
    // =========================================================================
    // Jumps
    // =========================================================================

    pub(super) fn lower_break(&mut self, stmt: &Stmt) -> LoweringResult<Vec<TStmt>> {
        let Some(target) = self.ctx.innermost_breakable() else {
            return Err(LoweringError::unsupported(
                stmt.kind.name(),
                "'break' outside of a loop or switch",
                stmt.span,
            ));
        };
        if target.try_depth < self.ctx.try_depth() {
            return Ok(vec![self.sentinel(ControlTransfer::Break, Vec::new())]);
        }
        Ok(vec![TStmt::Break])
    }

    pub(super) fn lower_continue(&mut self, stmt: &Stmt) -> LoweringResult<Vec<TStmt>> {
        self.continue_here().ok_or_else(|| {
            LoweringError::unsupported(stmt.kind.name(), "'continue' outside of a loop", stmt.span)
        })
    }

    /// `continue` to the innermost loop from the current position. A wrapped
    /// switch between here and the loop swallows a native `continue`, so the
    /// innermost one gets its flag set and is broken out of instead.
    pub(super) fn continue_here(&mut self) -> Option<Vec<TStmt>> {
        let target = self.ctx.innermost_loop_index()?;
        if self.ctx.loop_at(target).try_depth < self.ctx.try_depth() {
            return Some(vec![self.sentinel(ControlTransfer::Continue, Vec::new())]);
        }
        let wrapper = (target + 1..self.ctx.loop_count())
            .rev()
            .find(|&index| self.ctx.loop_at(index).needs_wrapper);
        let Some(index) = wrapper else {
            return Some(vec![TStmt::Continue]);
        };
        let Some(flag) = self.ctx.loop_at(index).continue_flag.clone() else {
            panic!("wrapped switch reached by 'continue' has no continue flag");
        };
        Some(vec![
            TStmt::assign(Target::id(flag), Target::Boolean(true)),
            TStmt::Break,
        ])
    }

    pub(super) fn lower_return(&mut self, value: Option<&Expr>) -> LoweringResult<Vec<TStmt>> {
        let values = match value {
            Some(value) => vec![self.lower_expr(value)?],
            None => Vec::new(),
        };
        if self.ctx.try_depth() > 0 {
            return Ok(vec![self.sentinel(ControlTransfer::Return, values)]);
        }
        Ok(vec![TStmt::Return(values)])
    }

    /// `return CS.TRY_<X>, { payload }`, recorded on the innermost region.
    pub(crate) fn sentinel(&mut self, transfer: ControlTransfer, payload: Vec<Target>) -> TStmt {
        self.ctx.mark_transfer(transfer);
        self.runtime.tagged_return(transfer, Target::array(payload))
    }

    pub(super) fn lower_throw(&mut self, stmt: &Stmt, value: Option<&Expr>) -> LoweringResult<Vec<TStmt>> {
        let error = match value {
            Some(value) => self.lower_expr(value)?,
            None => match self.catch_variables.last() {
                Some(caught) => Target::id(caught.clone()),
                None => {
                    return Err(LoweringError::unsupported(
                        stmt.kind.name(),
                        "'throw;' outside of a catch clause",
                        stmt.span,
                    ));
                }
            },
        };
        Ok(vec![TStmt::Call(self.runtime.throw(error))])
    }

    // =========================================================================
    // Try-like regions
    // =========================================================================

    /// Lower `f` as the bodies of one try-like region; returns its result
    /// together with the transfers that escaped the region.
    fn in_try_region<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LoweringResult<R>,
    ) -> LoweringResult<(R, crate::context::TryRegion)> {
        self.ctx.enter_try();
        let result = f(self);
        let region = self.ctx.exit_try();
        result.map(|value| (value, region))
    }

    pub(super) fn lower_try(
        &mut self,
        block: &[Stmt],
        catches: &[CatchClause],
        finally: Option<&[Stmt]>,
    ) -> LoweringResult<Vec<TStmt>> {
        let (args, region) = self.in_try_region(|this| {
            let body = Target::function(Vec::new(), this.lower_block(block)?);
            let catch = if catches.is_empty() {
                Target::Nil
            } else {
                this.lower_catches(catches)?
            };
            let finally = match finally {
                Some(stmts) => Target::function(Vec::new(), this.lower_block(stmts)?),
                None => Target::Nil,
            };
            Ok(vec![body, catch, finally])
        })?;
        tracing::trace!(escaped = !region.is_empty(), "[lowering] try region");
        Ok(self.dispatch_region(args, &region))
    }

    /// The catch handler: clauses are tried in order; an unmatched error is
    /// thrown again.
    fn lower_catches(&mut self, catches: &[CatchClause]) -> LoweringResult<Target> {
        self.with_scope(|this| {
            let error = this.ctx.fresh("_error");
            let mut block = Vec::new();
            let mut exhaustive = false;
            for clause in catches {
                let test = match &clause.ty {
                    Some(syntax) if !catches_everything(this.type_of(syntax.id)) => {
                        let ty = this.type_syntax_reference(syntax);
                        Some(this.runtime.is(Target::id(error.clone()), ty))
                    }
                    _ => None,
                };
                let body = this.lower_catch_clause(clause, &error)?;
                match test {
                    Some(test) => block.push(TStmt::if_then(test, body)),
                    None if clause.filter.is_some() => block.push(TStmt::Do(body)),
                    None => {
                        block.extend(body);
                        exhaustive = true;
                        break;
                    }
                }
            }
            if !exhaustive {
                block.push(TStmt::Call(this.runtime.throw(Target::id(error.clone()))));
            }
            Ok(Target::function(vec![Param::new(error)], block))
        })
    }

    /// One clause: the caught error bound to its name, the optional filter,
    /// then the body ending in a plain `return` so a handled error does not
    /// fall into the next clause.
    fn lower_catch_clause(&mut self, clause: &CatchClause, error: &str) -> LoweringResult<Block> {
        self.with_scope(|this| {
            let mut block = Vec::new();
            if let Some(name) = &clause.name {
                let emitted = this.declare_local(name);
                block.push(TStmt::local(emitted, Some(Target::id(error))));
            }
            let filter = match &clause.filter {
                Some(filter) => Some(this.capture(|this| this.lower_condition(filter))?),
                None => None,
            };
            this.catch_variables.push(error.to_string());
            let body = this.lower_block(&clause.block);
            this.catch_variables.pop();
            let mut body = body?;
            if !body.last().is_some_and(TStmt::is_terminal) {
                body.push(TStmt::Return(Vec::new()));
            }
            match filter {
                Some((pre, condition)) => {
                    block.extend(pre);
                    block.push(TStmt::if_then(condition, body));
                }
                None => block.extend(body),
            }
            Ok(block)
        })
    }

    pub(super) fn lower_using(
        &mut self,
        declarations: &[VariableDeclarator],
        expression: Option<&Expr>,
        body: &Stmt,
    ) -> LoweringResult<Vec<TStmt>> {
        let block = self.with_scope(|this| {
            let mut block = Vec::new();
            let mut resources = Vec::new();
            for decl in declarations {
                let (pre, value) = this.capture(|this| this.declarator_value(decl))?;
                block.extend(pre);
                let emitted = this.declare_local(&decl.name);
                block.push(TStmt::local(emitted.clone(), value));
                resources.push(emitted);
            }
            if let Some(expr) = expression {
                let (pre, value) = this.capture(|this| this.lower_expr(expr))?;
                block.extend(pre);
                let emitted = this.ctx.fresh("_resource");
                block.push(TStmt::local(emitted.clone(), Some(value)));
                resources.push(emitted);
            }

            let (body, region) = this.in_try_region(|this| this.lower_branch(body))?;
            let dispose = resources
                .iter()
                .rev()
                .map(|name| {
                    TStmt::if_then(
                        Target::ne(Target::id(name.clone()), Target::Nil),
                        vec![TStmt::Call(Target::method_call(
                            Target::id(name.clone()),
                            "Dispose",
                            Vec::new(),
                        ))],
                    )
                })
                .collect();
            let args = vec![
                Target::function(Vec::new(), body),
                Target::Nil,
                Target::function(Vec::new(), dispose),
            ];
            block.extend(this.dispatch_region(args, &region));
            Ok(block)
        })?;
        Ok(vec![TStmt::Do(block)])
    }

    /// `CS.try(...)` followed by the dispatch of every transfer that escaped
    /// the region.
    fn dispatch_region(&mut self, mut args: Vec<Target>, region: &crate::context::TryRegion) -> Vec<TStmt> {
        while args.last().is_some_and(Target::is_nil) {
            args.pop();
        }
        let call = self.runtime.call(TRY, args);
        if region.is_empty() {
            return vec![TStmt::Call(call)];
        }
        let exit = self.ctx.fresh("_exitType");
        let returns = self.ctx.fresh("_returns");
        let mut block = vec![TStmt::Local {
            bindings: vec![Binding::new(exit.clone()), Binding::new(returns.clone())],
            values: vec![call],
        }];
        let mut arms = Vec::new();
        for transfer in ControlTransfer::ALL {
            if region.uses(transfer) {
                let test = Target::eq(Target::id(exit.clone()), self.runtime.tag(transfer));
                arms.push((test, self.retrigger(transfer, &exit, &returns)));
            }
        }
        let mut arms = arms.into_iter();
        if let Some((condition, then_block)) = arms.next() {
            block.push(TStmt::If {
                condition,
                then_block,
                else_ifs: arms.collect(),
                else_block: None,
            });
        }
        block
    }

    /// The transfer a sentinel stood for, performed at the `CS.try` call.
    fn retrigger(&mut self, transfer: ControlTransfer, exit: &str, returns: &str) -> Block {
        match transfer {
            ControlTransfer::Break => match self.ctx.innermost_breakable() {
                Some(target) if target.try_depth < self.ctx.try_depth() => {
                    vec![self.sentinel(ControlTransfer::Break, Vec::new())]
                }
                _ => vec![TStmt::Break],
            },
            ControlTransfer::Continue => {
                self.continue_here().unwrap_or_else(|| vec![TStmt::Continue])
            }
            ControlTransfer::Return if self.ctx.try_depth() > 0 => {
                self.ctx.mark_transfer(ControlTransfer::Return);
                vec![TStmt::Return(vec![Target::id(exit), Target::id(returns)])]
            }
            ControlTransfer::Return => vec![TStmt::Return(vec![Target::call(
                Target::path("table.unpack"),
                vec![Target::id(returns)],
            )])],
        }
    }
}

/// `catch`, `catch (Exception)` and `catch (System.Exception e)` match any
/// error.
fn catches_everything(ty: Option<&TypeInfo>) -> bool {
    ty.is_none_or(|ty| ty.full_name == "System.Exception" || ty.full_name == "Exception")
}

#[cfg(test)]
mod tests {
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use crate::Lowerer;
    use luma_source::{
        BinaryOp, CompilationUnit, Stmt, StmtKind, SyntaxFactory, TypeInfo, TypeKind,
    };
    use luma_target::print_block;

    fn lower(f: SyntaxFactory, stmts: &[Stmt]) -> String {
        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions {
            emit_type_annotations: false,
            ..LoweringOptions::default()
        };
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        let block = lowerer.lower_block(stmts).expect("lowered");
        lowerer.ctx.assert_balanced();
        print_block(&block)
    }

    #[test]
    fn test_break_crossing_try_becomes_sentinel() {
        let mut f = SyntaxFactory::new();
        let init = f.boolean(true);
        let decl = f.declare("running", TypeInfo::bool(), Some(init));
        let brk = f.brk();
        let try_stmt = f.try_stmt(vec![brk], Vec::new(), Some(Vec::new()));
        let body = f.block(vec![try_stmt]);
        let condition = f.local("running", TypeInfo::bool());
        let loop_stmt = f.while_stmt(condition, body);
        let printed = lower(f, &[decl, loop_stmt]);
        assert!(printed.contains("return CS.TRY_BREAK, {}"), "{printed}");
        assert!(
            printed.contains("local _exitType, _returns = CS.try(function()"),
            "{printed}"
        );
        assert!(
            printed.contains("if _exitType == CS.TRY_BREAK then\n        break\n    end"),
            "{printed}"
        );
    }

    #[test]
    fn test_break_inside_loop_inside_try_stays_native() {
        let mut f = SyntaxFactory::new();
        let brk = f.brk();
        let body = f.block(vec![brk]);
        let condition = f.boolean(true);
        let inner = f.while_stmt(condition, body);
        let try_stmt = f.try_stmt(vec![inner], Vec::new(), Some(Vec::new()));
        let printed = lower(f, &[try_stmt]);
        assert!(!printed.contains("TRY_BREAK"), "{printed}");
        assert!(printed.starts_with("CS.try(function()"), "{printed}");
    }

    #[test]
    fn test_return_inside_try_is_unpacked_after_the_call() {
        let mut f = SyntaxFactory::new();
        let value = f.int(7);
        let ret = f.ret(Some(value));
        let catch = f.catch_clause(None, None, Vec::new());
        let try_stmt = f.try_stmt(vec![ret], vec![catch], None);
        let printed = lower(f, &[try_stmt]);
        assert!(printed.contains("return CS.TRY_RETURN, {7}"), "{printed}");
        assert!(printed.contains("return table.unpack(_returns)"), "{printed}");
        // A catch-all clause handles everything; nothing is rethrown.
        assert!(!printed.contains("CS.throw"), "{printed}");
    }

    #[test]
    fn test_typed_catch_rethrows_unmatched_errors() {
        let mut f = SyntaxFactory::new();
        let io = TypeInfo::new("IOException", "System.IO.IOException", TypeKind::Class);
        let rethrow = f.stmt(StmtKind::Throw(None));
        let catch = f.catch_clause(Some(&io), Some("e"), vec![rethrow]);
        let try_stmt = f.try_stmt(Vec::new(), vec![catch], None);
        let printed = lower(f, &[try_stmt]);
        assert!(printed.contains("function(_error)"), "{printed}");
        assert!(printed.contains("local e = _error"), "{printed}");
        assert!(printed.contains("CS.throw(_error)"), "{printed}");
    }

    #[test]
    fn test_continue_out_of_nested_regions_propagates() {
        let mut f = SyntaxFactory::new();
        let cont = f.cont();
        let inner = f.try_stmt(vec![cont], Vec::new(), Some(Vec::new()));
        let outer = f.try_stmt(vec![inner], Vec::new(), Some(Vec::new()));
        let body = f.block(vec![outer]);
        let left = f.int(1);
        let right = f.int(2);
        let condition = f.binary(BinaryOp::LessThan, left, right, TypeInfo::bool());
        let loop_stmt = f.while_stmt(condition, body);
        let printed = lower(f, &[loop_stmt]);
        // The inner dispatch re-raises the sentinel; the outer one continues.
        assert_eq!(printed.matches("return CS.TRY_CONTINUE, {}").count(), 2, "{printed}");
        assert!(printed.contains("continue\n"), "{printed}");
    }
}
