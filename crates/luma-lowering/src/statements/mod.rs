//! Statement lowering.
//!
//! Every source statement lowers to a list of target statements, preceded by
//! whatever prerequisites its expressions queued. Sub-modules:
//! - `loops`: while, do, for (with the numeric fast path) and foreach
//! - `control`: break, continue, return, try/using and the sentinel protocol
//! - `switch`: switch statements and switch expressions
//! - `query`: query comprehensions

mod control;
mod loops;
mod query;
mod switch;

use crate::error::{LoweringError, LoweringResult};
use crate::expressions::FunctionSpec;
use crate::lowerer::{Lowerer, discard};
use luma_source::visit::{Visitor, body_contains_yield, walk_expr};
use luma_source::{
    Body, Expr, ExprKind, LocalFunctionDecl, Stmt, StmtKind, TypeInfo, TypeKind, TypeSyntax,
    UnaryOp, VariableDeclarator,
};
use luma_target::{Block, Expr as Target, Stmt as TStmt};

impl Lowerer<'_> {
    /// Lower `stmts` in a new scope.
    pub(crate) fn lower_block(&mut self, stmts: &[Stmt]) -> LoweringResult<Block> {
        self.with_scope(|this| this.lower_stmts(stmts))
    }

    /// Lower `stmts` into the current scope.
    pub(crate) fn lower_stmts(&mut self, stmts: &[Stmt]) -> LoweringResult<Block> {
        let forward = forward_local_functions(stmts);
        let mut block = Vec::with_capacity(stmts.len());
        for name in &forward {
            let emitted = self.declare_local(name);
            block.push(TStmt::local(emitted, None));
        }
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::LocalFunction(decl) if forward.contains(&decl.name.as_str()) => {
                    block.extend(self.lower_stmt_with(stmt, |this| {
                        this.lower_local_function(decl, true)
                    })?);
                }
                _ => block.extend(self.lower_stmt(stmt)?),
            }
        }
        Ok(block)
    }

    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt) -> LoweringResult<Vec<TStmt>> {
        self.lower_stmt_with(stmt, |this| this.lower_stmt_kind(stmt))
    }

    /// Run a statement builder and splice the prerequisites it queued in
    /// front of its output.
    pub(crate) fn lower_stmt_with(
        &mut self,
        stmt: &Stmt,
        build: impl FnOnce(&mut Self) -> LoweringResult<Vec<TStmt>>,
    ) -> LoweringResult<Vec<TStmt>> {
        self.enter_stmt(stmt.span)?;
        let result = self.capture(build).map(|(mut block, lowered)| {
            block.extend(lowered);
            block
        });
        self.exit_stmt();
        result
    }

    fn lower_stmt_kind(&mut self, stmt: &Stmt) -> LoweringResult<Vec<TStmt>> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                let block = self.lower_block(stmts)?;
                Ok(if block.is_empty() {
                    Vec::new()
                } else {
                    vec![TStmt::Do(block)]
                })
            }
            StmtKind::Expression(expr) => self.lower_expression_statement(expr),
            StmtKind::LocalDeclaration(decls) => self.lower_local_declaration(decls),
            StmtKind::LocalFunction(decl) => self.lower_local_function(decl, false),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.lower_condition(condition)?;
                let lowered = self.finish_if(condition, then_branch, else_branch.as_deref())?;
                Ok(vec![lowered])
            }
            StmtKind::While { condition, body } => self.lower_while(condition, body),
            StmtKind::DoWhile { body, condition } => self.lower_do_while(body, condition),
            StmtKind::For {
                declarations,
                initializers,
                condition,
                incrementors,
                body,
            } => self.lower_for(declarations, initializers, condition.as_ref(), incrementors, body),
            StmtKind::ForEach {
                variable,
                collection,
                body,
            } => self.lower_foreach(variable, collection, body),
            StmtKind::Switch { governing, sections } => self.lower_switch(governing, sections),
            StmtKind::Break => self.lower_break(stmt),
            StmtKind::Continue => self.lower_continue(stmt),
            StmtKind::Return(value) => self.lower_return(value.as_ref()),
            StmtKind::Throw(value) => self.lower_throw(stmt, value.as_ref()),
            StmtKind::Try {
                block,
                catches,
                finally,
            } => self.lower_try(block, catches, finally.as_deref()),
            StmtKind::Using {
                declarations,
                expression,
                body,
            } => self.lower_using(declarations, expression.as_ref(), body),
            StmtKind::YieldBreak => self.lower_nested_yield_break(stmt),
            StmtKind::YieldReturn(_) => Err(LoweringError::unsupported(
                stmt.kind.name(),
                if self.ctx.current_generator().is_some() {
                    "'yield return' inside a control-flow block"
                } else {
                    "'yield return' inside a nested function"
                },
                stmt.span,
            )),
            StmtKind::Empty => Ok(Vec::new()),
            StmtKind::Goto(_)
            | StmtKind::Labeled { .. }
            | StmtKind::Lock { .. }
            | StmtKind::Unsafe(_) => Err(self.unsupported_stmt(stmt)),
        }
    }

    /// The body of a branch or loop, in its own scope.
    pub(crate) fn lower_branch(&mut self, stmt: &Stmt) -> LoweringResult<Block> {
        match &stmt.kind {
            StmtKind::Block(stmts) => self.lower_block(stmts),
            _ => self.lower_block(std::slice::from_ref(stmt)),
        }
    }

    // =========================================================================
    // Expression statements
    // =========================================================================

    /// An expression evaluated for its effects only.
    pub(crate) fn lower_expression_statement(&mut self, expr: &Expr) -> LoweringResult<Vec<TStmt>> {
        let (mut block, effect) = self.capture(|this| this.lower_effect(expr))?;
        block.extend(effect);
        Ok(block)
    }

    fn lower_effect(&mut self, expr: &Expr) -> LoweringResult<Option<TStmt>> {
        match &expr.kind {
            ExprKind::Parenthesized(inner) => self.lower_effect(inner),
            ExprKind::Unary { op, operand } if op.is_increment_or_decrement() => {
                let delta = match op {
                    UnaryOp::PreIncrement | UnaryOp::PostIncrement => 1,
                    _ => -1,
                };
                self.lower_increment_stmt(operand, delta)?;
                Ok(None)
            }
            ExprKind::Assignment { op, target, value } => {
                let value = self.lower_assignment(*op, target, value, false)?;
                Ok(value.and_then(discard))
            }
            ExprKind::ConditionalAccess {
                object,
                when_not_null,
            } => {
                for stmt in self.lower_conditional_access_stmt(object, when_not_null)? {
                    self.emit(stmt);
                }
                Ok(None)
            }
            ExprKind::Invocation { .. } => {
                self.value_discarded = true;
                let value = self.lower_expr(expr);
                self.value_discarded = false;
                Ok(discard(value?))
            }
            _ => {
                let value = self.lower_expr(expr)?;
                Ok(discard(value))
            }
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub(super) fn lower_local_declaration(&mut self, decls: &[VariableDeclarator]) -> LoweringResult<Vec<TStmt>> {
        let mut block = Vec::with_capacity(decls.len());
        for decl in decls {
            let (pre, value) = self.capture(|this| this.declarator_value(decl))?;
            block.extend(pre);
            let annotation = self.syntax_annotation(decl.ty.as_ref());
            let emitted = self.declare_local(&decl.name);
            block.push(TStmt::local_typed(emitted, annotation, value));
        }
        Ok(block)
    }

    /// The initial value of a declared local. An uninitialized struct local
    /// still holds a default instance.
    pub(crate) fn declarator_value(&mut self, decl: &VariableDeclarator) -> LoweringResult<Option<Target>> {
        match &decl.initializer {
            Some(init) => self.lower_expr(init).map(Some),
            None => Ok(self
                .type_of(decl.id)
                .filter(|ty| ty.kind == TypeKind::Struct)
                .map(|ty| self.default_value(ty))),
        }
    }

    pub(crate) fn lower_local_function(
        &mut self,
        decl: &LocalFunctionDecl,
        forward: bool,
    ) -> LoweringResult<Vec<TStmt>> {
        let existing = forward
            .then(|| self.ctx.lookup(&decl.name).map(|b| b.emitted.clone()))
            .flatten();
        let predeclared = existing.is_some();
        let emitted = match existing {
            Some(emitted) => emitted,
            None => self.declare_local(&decl.name),
        };
        let generator = if body_contains_yield(&decl.body) {
            self.syntax_type(decl.return_type.as_ref())
                .and_then(TypeInfo::generator_shape)
        } else {
            None
        };
        let spec = FunctionSpec::method(
            &decl.parameters,
            &decl.body,
            decl.return_type.as_ref(),
            self.syntax_returns_value(decl.return_type.as_ref()),
        )
        .with_generator(generator);
        let function = self.build_function(&spec)?;

        if !decl.is_async && !predeclared {
            return Ok(vec![TStmt::LocalFunction {
                name: emitted,
                function,
            }]);
        }
        let value = if decl.is_async {
            self.async_function(function)
        } else {
            Target::Function(Box::new(function))
        };
        let mut block = Vec::with_capacity(2);
        if predeclared {
            block.push(TStmt::assign(Target::id(emitted), value));
        } else if body_mentions(&decl.body, &decl.name) {
            // Recursive: the name must be in scope inside the closure.
            block.push(TStmt::local(emitted.clone(), None));
            block.push(TStmt::assign(Target::id(emitted), value));
        } else {
            block.push(TStmt::local(emitted, Some(value)));
        }
        Ok(block)
    }

    pub(crate) fn syntax_type(&self, syntax: Option<&TypeSyntax>) -> Option<&TypeInfo> {
        syntax.and_then(|s| self.type_of(s.id))
    }

    /// Whether a callable declared with this return type produces a value.
    pub(crate) fn syntax_returns_value(&self, syntax: Option<&TypeSyntax>) -> bool {
        match self.syntax_type(syntax) {
            Some(ty) if ty.is_void() => false,
            Some(ty) if ty.is_task() => !ty.type_arguments.is_empty(),
            _ => true,
        }
    }

    // =========================================================================
    // If
    // =========================================================================

    /// `if` with an already-lowered condition. `else if` chains become
    /// `elseif` until a condition queues prerequisites; that condition and
    /// the rest of the chain move into an `else` block so the prerequisites
    /// only run when every earlier condition failed.
    fn finish_if(
        &mut self,
        condition: Target,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> LoweringResult<TStmt> {
        let then_block = self.lower_branch(then_branch)?;
        let mut else_ifs = Vec::new();
        let mut next = else_branch;
        while let Some(StmtKind::If {
            condition: nested,
            then_branch,
            else_branch,
        }) = next.map(|s| &s.kind)
        {
            let (pre, nested) = self.capture(|this| this.lower_condition(nested))?;
            if !pre.is_empty() {
                let mut block = pre;
                block.push(self.finish_if(nested, then_branch, else_branch.as_deref())?);
                return Ok(TStmt::If {
                    condition,
                    then_block,
                    else_ifs,
                    else_block: Some(block),
                });
            }
            else_ifs.push((nested, self.lower_branch(then_branch)?));
            next = else_branch.as_deref();
        }
        let else_block = match next {
            Some(stmt) => Some(self.lower_branch(stmt)?).filter(|b| !b.is_empty()),
            None => None,
        };
        Ok(TStmt::If {
            condition,
            then_block,
            else_ifs,
            else_block,
        })
    }
}

// =============================================================================
// Name queries
// =============================================================================

struct NameFinder<'a> {
    name: &'a str,
    found: bool,
}

impl Visitor for NameFinder<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.found {
            return;
        }
        if let ExprKind::Identifier(name) = &expr.kind
            && name == self.name
        {
            self.found = true;
            return;
        }
        walk_expr(self, expr);
    }
}

fn body_mentions(body: &Body, name: &str) -> bool {
    let mut finder = NameFinder { name, found: false };
    luma_source::visit::walk_body(&mut finder, body);
    finder.found
}

/// Local functions named by a statement that precedes their declaration.
fn forward_local_functions(stmts: &[Stmt]) -> Vec<&str> {
    let mut forward = Vec::new();
    for (index, stmt) in stmts.iter().enumerate() {
        let StmtKind::LocalFunction(decl) = &stmt.kind else {
            continue;
        };
        let mut finder = NameFinder {
            name: &decl.name,
            found: false,
        };
        for earlier in &stmts[..index] {
            finder.visit_stmt(earlier);
        }
        if finder.found {
            forward.push(decl.name.as_str());
        }
    }
    forward
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use luma_source::{BinaryOp, CompilationUnit, SyntaxFactory};
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
    fn test_else_if_chain_becomes_elseif() {
        let mut f = SyntaxFactory::new();
        let init = f.int(1);
        let decl = f.declare("x", TypeInfo::int(), Some(init));
        let x1 = f.local("x", TypeInfo::int());
        let one = f.int(1);
        let c1 = f.binary(BinaryOp::Equals, x1, one, TypeInfo::bool());
        let x2 = f.local("x", TypeInfo::int());
        let two = f.int(2);
        let c2 = f.binary(BinaryOp::Equals, x2, two, TypeInfo::bool());
        let r1 = f.ret(None);
        let b1 = f.block(vec![r1]);
        let r2 = f.ret(None);
        let b2 = f.block(vec![r2]);
        let inner = f.if_stmt(c2, b2, None);
        let outer = f.if_stmt(c1, b1, Some(inner));
        assert_eq!(
            lower(f, &[decl, outer]),
            "local x = 1\nif x == 1 then\n    return\nelseif x == 2 then\n    return\nend\n"
        );
    }

    #[test]
    fn test_uninitialized_local_is_bare() {
        let mut f = SyntaxFactory::new();
        let decl = f.declare("name", TypeInfo::string(), None);
        assert_eq!(lower(f, &[decl]), "local name\n");
    }

    #[test]
    fn test_forward_referenced_local_function_is_predeclared() {
        let mut f = SyntaxFactory::new();
        let callee = f.local("helper", TypeInfo::void());
        let call = f.call(callee, Vec::new(), TypeInfo::void());
        let call_stmt = f.expr_stmt(call);
        let decl = f.stmt(StmtKind::LocalFunction(Box::new(LocalFunctionDecl {
            name: "helper".into(),
            is_async: false,
            type_parameters: Vec::new(),
            parameters: Vec::new(),
            return_type: None,
            body: Body::Block(Vec::new()),
        })));
        let printed = lower(f, &[call_stmt, decl]);
        assert!(printed.starts_with("local helper\nhelper()\nhelper = function()"), "{printed}");
    }

    #[test]
    fn test_unsupported_statement_names_the_construct() {
        let mut f = SyntaxFactory::new();
        let goto = f.stmt(StmtKind::Goto("done".into()));
        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions::default();
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        let err = lowerer.lower_block(&[goto]).expect_err("goto is rejected");
        assert!(err.to_string().contains("goto statement"));
    }
}
