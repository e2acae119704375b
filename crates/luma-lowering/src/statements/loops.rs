//! Loops.
//!
//! `for` takes the numeric fast path when its shape guarantees the target's
//! `for i = start, limit, step` visits the same values:
//!
//! - one declared integer induction variable with an initializer
//! - condition `i < limit` or `i <= limit`, where `limit` cannot change
//!   while the loop runs
//! - increment `i++`, `++i` or `i += step` with a positive constant step
//! - a body that never assigns `i`
//!
//! Anything else becomes a `while true` loop whose head runs the
//! incrementors on every iteration but the first, so `continue` still
//! reaches them.

use crate::context::LoopKind;
use crate::error::LoweringResult;
use crate::lowerer::Lowerer;
use crate::types::is_set_type;
use luma_source::visit::stmt_assigns;
use luma_source::{
    AssignOp, BinaryOp, CollectionKind, Expr, ExprKind, ForEachVariable, Stmt, SymbolKind,
    TypeInfo, TypeKind, UnaryOp, VariableDeclarator,
};
use luma_target::{BinOp, Block, Expr as Target, Stmt as TStmt, TableField};

impl Lowerer<'_> {
    /// Run `f` with a loop or switch on the loop stack.
    pub(super) fn with_loop<R>(
        &mut self,
        kind: LoopKind,
        needs_wrapper: bool,
        continue_flag: Option<String>,
        f: impl FnOnce(&mut Self) -> LoweringResult<R>,
    ) -> LoweringResult<R> {
        self.ctx.push_loop(kind, needs_wrapper);
        let index = self.ctx.loop_count() - 1;
        self.ctx.loop_at_mut(index).continue_flag = continue_flag;
        let result = f(self);
        self.ctx.pop_loop();
        result
    }

    fn lower_loop_body(&mut self, body: &Stmt) -> LoweringResult<Block> {
        self.with_loop(LoopKind::Loop, false, None, |this| this.lower_branch(body))
    }

    pub(super) fn lower_while(&mut self, condition: &Expr, body: &Stmt) -> LoweringResult<Vec<TStmt>> {
        self.with_scope(|this| {
            let (pre, condition) = this.capture(|this| this.lower_condition(condition))?;
            let body = this.lower_loop_body(body)?;
            Ok(vec![guarded_loop(pre, condition, body)])
        })
    }

    pub(super) fn lower_do_while(&mut self, body: &Stmt, condition: &Expr) -> LoweringResult<Vec<TStmt>> {
        let body = self.lower_loop_body(body)?;
        let (pre, condition) = self.capture(|this| this.lower_condition(condition))?;
        let condition = if pre.is_empty() {
            condition
        } else {
            let mut block = pre;
            block.push(TStmt::Return(vec![condition]));
            Target::iife(block)
        };
        Ok(vec![TStmt::Repeat {
            body,
            condition: Target::not(condition),
        }])
    }

    // =========================================================================
    // For
    // =========================================================================

    pub(super) fn lower_for(
        &mut self,
        declarations: &[VariableDeclarator],
        initializers: &[Expr],
        condition: Option<&Expr>,
        incrementors: &[Expr],
        body: &Stmt,
    ) -> LoweringResult<Vec<TStmt>> {
        if let Some(numeric) =
            self.lower_numeric_for(declarations, initializers, condition, incrementors, body)?
        {
            return Ok(vec![numeric]);
        }
        let block = self.with_scope(|this| {
            let mut block = this.lower_local_declaration(declarations)?;
            for init in initializers {
                block.extend(this.lower_expression_statement(init)?);
            }
            let (pre, condition) = match condition {
                Some(condition) => this.capture(|this| this.lower_condition(condition))?,
                None => (Vec::new(), Target::Boolean(true)),
            };
            let mut step = Vec::new();
            for incrementor in incrementors {
                step.extend(this.lower_expression_statement(incrementor)?);
            }
            let body = this.lower_loop_body(body)?;

            if step.is_empty() {
                block.push(guarded_loop(pre, condition, body));
                return Ok(block);
            }
            let started = this.ctx.fresh("_started");
            block.push(TStmt::local(started.clone(), Some(Target::Boolean(false))));
            let mut head = vec![TStmt::if_else(
                Target::id(started.clone()),
                step,
                vec![TStmt::assign(Target::id(started), Target::Boolean(true))],
            )];
            head.extend(pre);
            if condition != Target::Boolean(true) {
                head.push(TStmt::if_then(Target::not(condition), vec![TStmt::Break]));
            }
            head.extend(body);
            block.push(TStmt::While {
                condition: Target::Boolean(true),
                body: head,
            });
            Ok(block)
        })?;
        Ok(vec![TStmt::Do(block)])
    }

    fn lower_numeric_for(
        &mut self,
        declarations: &[VariableDeclarator],
        initializers: &[Expr],
        condition: Option<&Expr>,
        incrementors: &[Expr],
        body: &Stmt,
    ) -> LoweringResult<Option<TStmt>> {
        let ([decl], [], Some(condition), [increment]) =
            (declarations, initializers, condition, incrementors)
        else {
            return Ok(None);
        };
        let Some(start) = &decl.initializer else {
            return Ok(None);
        };
        if !self.type_of(decl.id).is_some_and(TypeInfo::is_integer) {
            return Ok(None);
        }
        let Some((inclusive, limit)) = loop_limit(condition, &decl.name) else {
            return Ok(None);
        };
        // `i < 2.5` runs through 2; only an integral limit folds to `limit - 1`.
        if !inclusive && !self.type_of(limit.id).is_some_and(TypeInfo::is_integer) {
            return Ok(None);
        }
        let Some(step) = self.loop_step(increment, &decl.name) else {
            return Ok(None);
        };
        if stmt_assigns(body, &decl.name) || !self.is_invariant(limit, body) {
            return Ok(None);
        }
        tracing::debug!(variable = %decl.name, step, "[lowering] numeric for fast path");

        let mut bounds = self.lower_ordered(&[start, limit])?.into_iter();
        let (Some(start), Some(limit)) = (bounds.next(), bounds.next()) else {
            unreachable!("two operands lower to two values");
        };
        let limit = if inclusive { limit } else { minus_one(limit) };
        self.with_scope(|this| {
            let var = this.declare_local(&decl.name);
            let body = this.lower_loop_body(body)?;
            Ok(Some(TStmt::NumericFor {
                var,
                start,
                limit,
                step: Some(Target::int(step)),
                body,
            }))
        })
    }

    /// The constant step of `i++`, `++i` or `i += k` (k > 0).
    fn loop_step(&self, increment: &Expr, name: &str) -> Option<i64> {
        match &increment.kind {
            ExprKind::Unary { op, operand }
                if matches!(op, UnaryOp::PreIncrement | UnaryOp::PostIncrement)
                    && names(operand, name) =>
            {
                Some(1)
            }
            ExprKind::Assignment {
                op: AssignOp::Add,
                target,
                value,
            } if names(target, name) => self
                .oracle
                .constant_fold(value)
                .and_then(|c| c.as_i64())
                .filter(|step| *step > 0),
            ExprKind::Parenthesized(inner) => self.loop_step(inner, name),
            _ => None,
        }
    }

    /// Whether `limit` evaluates to the same value on every iteration.
    fn is_invariant(&self, limit: &Expr, body: &Stmt) -> bool {
        if self.oracle.constant_fold(limit).is_some() {
            return true;
        }
        match &limit.kind {
            ExprKind::Parenthesized(inner) => self.is_invariant(inner, body),
            ExprKind::Identifier(name) => {
                matches!(
                    self.oracle.kind_of(limit.id),
                    SymbolKind::Local | SymbolKind::Parameter
                ) && !stmt_assigns(body, name)
            }
            // Arrays and strings never change length.
            ExprKind::Member { object, name } if name == "Length" => {
                let fixed = self.type_of(object.id).is_some_and(|ty| {
                    ty.kind == TypeKind::Array || ty.is_string()
                });
                fixed && self.is_invariant(object, body)
            }
            _ => false,
        }
    }

    // =========================================================================
    // Foreach
    // =========================================================================

    pub(super) fn lower_foreach(
        &mut self,
        variable: &ForEachVariable,
        collection: &Expr,
        body: &Stmt,
    ) -> LoweringResult<Vec<TStmt>> {
        let source = self.lower_expr(collection)?;
        let ty = self.type_of(collection.id);
        let shape = match ty {
            Some(ty) if ty.is_string() => IterationShape::Characters,
            Some(ty) if is_set_type(ty) => IterationShape::Keys,
            Some(ty) if ty.collection_kind() == CollectionKind::Map => IterationShape::Pairs,
            _ => IterationShape::Values,
        };
        let source = match shape {
            IterationShape::Characters => Target::call(
                Target::path("string.split"),
                vec![source, Target::string("")],
            ),
            _ => source,
        };

        self.with_scope(|this| {
            let mut block = Vec::new();
            let vars = match (shape, variable) {
                (IterationShape::Keys, ForEachVariable::Single { name, .. }) => {
                    vec![this.declare_local(name)]
                }
                (IterationShape::Pairs, ForEachVariable::Deconstruct(names)) if names.len() == 2 => {
                    names.iter().map(|(_, n)| this.declare_local(n)).collect()
                }
                (IterationShape::Pairs, ForEachVariable::Single { name, .. }) => {
                    // A KeyValuePair is rebuilt from the key and value.
                    let key = this.ctx.fresh("_key");
                    let value = this.ctx.fresh("_value");
                    let pair = this.declare_local(name);
                    block.push(TStmt::local(
                        pair,
                        Some(Target::Table(vec![
                            TableField::Named("Key".into(), Target::id(key.clone())),
                            TableField::Named("Value".into(), Target::id(value.clone())),
                        ])),
                    ));
                    vec![key, value]
                }
                (_, ForEachVariable::Single { name, .. }) => {
                    vec!["_".to_string(), this.declare_local(name)]
                }
                (_, ForEachVariable::Deconstruct(names)) => {
                    let item = this.ctx.fresh("_item");
                    let mut bindings = Vec::with_capacity(names.len());
                    let mut values = Vec::with_capacity(names.len());
                    for (index, (_, name)) in names.iter().enumerate() {
                        bindings.push(luma_target::Binding::new(this.declare_local(name)));
                        values.push(Target::index(
                            Target::id(item.clone()),
                            Target::int(index as i64 + 1),
                        ));
                    }
                    block.push(TStmt::Local { bindings, values });
                    vec!["_".to_string(), item]
                }
            };
            block.extend(this.lower_loop_body(body)?);
            Ok(vec![TStmt::GenericFor {
                vars,
                exprs: vec![source],
                body: block,
            }])
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IterationShape {
    /// `for _, x in xs`
    Values,
    /// `for k, v in map`
    Pairs,
    /// `for x in set`
    Keys,
    /// `for _, c in string.split(s, "")`
    Characters,
}

/// `while cond do body end`, or with prerequisites:
///
/// ```text
/// while true do
///     <prerequisites>
///     if not cond then break end
///     <body>
/// end
/// ```
fn guarded_loop(pre: Vec<TStmt>, condition: Target, body: Block) -> TStmt {
    if pre.is_empty() {
        return TStmt::While { condition, body };
    }
    let mut block = pre;
    block.push(TStmt::if_then(Target::not(condition), vec![TStmt::Break]));
    block.extend(body);
    TStmt::While {
        condition: Target::Boolean(true),
        body: block,
    }
}

fn names(expr: &Expr, name: &str) -> bool {
    match &expr.kind {
        ExprKind::Identifier(n) => n == name,
        ExprKind::Parenthesized(inner) => names(inner, name),
        _ => false,
    }
}

/// `(inclusive, limit)` of `name < limit` or `name <= limit`.
fn loop_limit<'e>(condition: &'e Expr, name: &str) -> Option<(bool, &'e Expr)> {
    match &condition.kind {
        ExprKind::Binary { op, left, right } if names(left, name) => match op {
            BinaryOp::LessThan => Some((false, right)),
            BinaryOp::LessThanOrEqual => Some((true, right)),
            _ => None,
        },
        ExprKind::Parenthesized(inner) => loop_limit(inner, name),
        _ => None,
    }
}

fn minus_one(limit: Target) -> Target {
    match limit.as_number() {
        Some(n) => Target::Number(n - 1.0),
        None => Target::binary(limit, BinOp::Sub, Target::int(1)),
    }
}
