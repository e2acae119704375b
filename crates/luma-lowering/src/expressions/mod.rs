//! Expression lowering.
//!
//! `lower_expr` returns a target expression and may queue prerequisite
//! statements on the innermost capture frame. Sub-modules:
//! - `identifiers`: names, member access, assignable places
//! - `calls`: invocations and argument lists
//! - `macros`: intrinsic call and member shapes
//! - `operators`: unary, binary, assignment
//! - `creation`: object, collection and array construction
//! - `lambdas`: closures and function bodies
//! - `optional`: conditional access chains

mod calls;
mod creation;
mod identifiers;
mod lambdas;
mod macros;
mod operators;
mod optional;

pub(crate) use identifiers::Place;
pub(crate) use lambdas::FunctionSpec;

use crate::error::LoweringResult;
use crate::lowerer::Lowerer;
use luma_source::{ConstantValue, ExprKind, InterpolationPart, Literal, TypeKind};
use luma_target::{BinOp, Expr, Stmt};

impl Lowerer<'_> {
    pub(crate) fn lower_expr(&mut self, expr: &luma_source::Expr) -> LoweringResult<Expr> {
        self.enter_expr(expr.span)?;
        let result = self.lower_expr_kind(expr);
        self.exit_expr();
        result
    }

    fn lower_expr_kind(&mut self, expr: &luma_source::Expr) -> LoweringResult<Expr> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(lower_literal(literal)),
            ExprKind::Identifier(name) => self.lower_identifier(expr, name),
            ExprKind::This => Ok(Expr::id("self")),
            ExprKind::Base => Err(self.unsupported_expr(expr)),
            ExprKind::Parenthesized(inner) | ExprKind::Checked(inner) => self.lower_expr(inner),
            ExprKind::Member { object, name } => self.lower_member(expr, object, name),
            ExprKind::MemberBinding(name) => self.lower_member_binding(expr, name),
            ExprKind::ElementBinding(index) => self.lower_element_binding(expr, index),
            ExprKind::ConditionalAccess {
                object,
                when_not_null,
            } => self.lower_conditional_access(object, when_not_null),
            ExprKind::Element { object, indices } => self.lower_element(expr, object, indices),
            ExprKind::Invocation { callee, arguments } => {
                self.lower_invocation(expr, callee, arguments)
            }
            ExprKind::ObjectCreation {
                ty,
                arguments,
                initializer,
            } => self.lower_object_creation(expr, ty, arguments, initializer.as_ref()),
            ExprKind::ArrayCreation {
                element_type,
                sizes,
                initializer,
            } => self.lower_array_creation(expr, element_type, sizes, initializer.as_deref()),
            ExprKind::Binary { op, left, right } => self.lower_binary(expr, *op, left, right),
            ExprKind::Unary { op, operand } => self.lower_unary(expr, *op, operand),
            ExprKind::Assignment { op, target, value } => {
                self.lower_assignment_expr(expr, *op, target, value)
            }
            ExprKind::Conditional {
                condition,
                when_true,
                when_false,
            } => self.lower_conditional(condition, when_true, when_false),
            ExprKind::Lambda(lambda) => self.lower_lambda(expr, lambda),
            ExprKind::Await(inner) => {
                let value = self.lower_expr(inner)?;
                Ok(self.lower_await(value))
            }
            ExprKind::Cast { ty, expr: inner } => self.lower_cast(ty, inner),
            ExprKind::Is { expr: subject, pattern } => self.lower_is(subject, pattern),
            ExprKind::As { expr: inner, ty } => {
                let value = self.lower_expr(inner)?;
                let ty = self.type_syntax_reference(ty);
                Ok(self.runtime.call(crate::runtime::AS, vec![value, ty]))
            }
            ExprKind::Switch { governing, arms } => self.lower_switch_expr(expr, governing, arms),
            ExprKind::Query(query) => self.lower_query(expr, query),
            ExprKind::Interpolated(parts) => self.lower_interpolation(parts),
            ExprKind::TypeOf(ty) => Ok(self.type_syntax_reference(ty)),
            ExprKind::NameOf(name) => {
                let last = name.rsplit('.').next().unwrap_or(name);
                Ok(Expr::string(last))
            }
            ExprKind::Default(ty) => {
                let info = match ty {
                    Some(syntax) => self.type_of(syntax.id),
                    None => self.type_of(expr.id),
                };
                Ok(match info {
                    Some(info) => self.default_value(info),
                    None => Expr::Nil,
                })
            }
            ExprKind::Tuple(items) => {
                let refs: Vec<&luma_source::Expr> = items.iter().collect();
                let values = self.lower_ordered(&refs)?;
                Ok(Expr::array(values))
            }
            ExprKind::Throw(inner) => {
                let value = self.lower_expr(inner)?;
                Ok(self.runtime.throw(value))
            }
            ExprKind::Declaration { name, .. } => {
                let emitted = self.declare_local(name);
                self.emit(Stmt::local(emitted.clone(), None));
                Ok(Expr::Identifier(emitted))
            }
            ExprKind::Range { .. }
            | ExprKind::IndexFromEnd(_)
            | ExprKind::StackAlloc(_)
            | ExprKind::AddressOf(_)
            | ExprKind::PointerIndirection(_) => Err(self.unsupported_expr(expr)),
        }
    }

    /// A boolean condition for `if`/`while`. Prerequisites stay queued.
    pub(crate) fn lower_condition(&mut self, expr: &luma_source::Expr) -> LoweringResult<Expr> {
        self.lower_expr(expr)
    }

    /// `c ? a : b`. Without prerequisites in either branch this is an
    /// if-expression; otherwise a result temporary assigned in an `if`.
    fn lower_conditional(
        &mut self,
        condition: &luma_source::Expr,
        when_true: &luma_source::Expr,
        when_false: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        let condition = self.lower_expr(condition)?;
        let (true_pre, true_value) = self.capture(|this| this.lower_expr(when_true))?;
        let (false_pre, false_value) = self.capture(|this| this.lower_expr(when_false))?;
        if true_pre.is_empty() && false_pre.is_empty() {
            return Ok(Expr::if_else(condition, true_value, false_value));
        }
        let result = self.ctx.fresh("_result");
        self.emit(Stmt::local(result.clone(), None));
        let mut then_block = true_pre;
        then_block.push(Stmt::assign(Expr::id(result.clone()), true_value));
        let mut else_block = false_pre;
        else_block.push(Stmt::assign(Expr::id(result.clone()), false_value));
        self.emit(Stmt::if_else(condition, then_block, else_block));
        Ok(Expr::Identifier(result))
    }

    /// `$"..."` as a `..` chain; non-string parts go through `tostring`.
    fn lower_interpolation(&mut self, parts: &[InterpolationPart]) -> LoweringResult<Expr> {
        let mut pieces: Vec<Expr> = Vec::new();
        for part in parts {
            match part {
                InterpolationPart::Text(text) if text.is_empty() => {}
                InterpolationPart::Text(text) => pieces.push(Expr::string(text.clone())),
                InterpolationPart::Expr(inner) => {
                    let (pre, value) = self.capture(|this| this.lower_expr(inner))?;
                    self.pin_before(&mut pieces, pre);
                    let is_string = self.type_of(inner.id).is_some_and(|t| t.is_string());
                    pieces.push(if is_string { value } else { to_string(value) });
                }
            }
        }
        let mut iter = pieces.into_iter();
        let Some(first) = iter.next() else {
            return Ok(Expr::string(""));
        };
        Ok(iter.fold(first, |acc, piece| Expr::binary(acc, BinOp::Concat, piece)))
    }

    /// A constant the oracle folded, as a literal.
    pub(crate) fn folded_constant(&self, expr: &luma_source::Expr) -> Option<Expr> {
        let constant = self.oracle.constant_fold(expr)?;
        let is_enum = self.type_of(expr.id).is_some_and(|t| t.kind == TypeKind::Enum);
        Some(match constant {
            ConstantValue::Int(v) if is_enum => Expr::int(v),
            other => constant_expr(&other),
        })
    }
}

pub(crate) fn lower_literal(literal: &Literal) -> Expr {
    match literal {
        Literal::Null => Expr::Nil,
        Literal::Bool(b) => Expr::Boolean(*b),
        Literal::Int(v) => Expr::int(*v),
        Literal::Float(v) => Expr::Number(*v),
        Literal::String(s) => Expr::string(s.clone()),
        Literal::Char(c) => Expr::string(c.to_string()),
    }
}

pub(crate) fn constant_expr(constant: &ConstantValue) -> Expr {
    match constant {
        ConstantValue::Null => Expr::Nil,
        ConstantValue::Bool(b) => Expr::Boolean(*b),
        ConstantValue::Int(v) => Expr::int(*v),
        ConstantValue::Float(v) => Expr::Number(*v),
        ConstantValue::String(s) => Expr::string(s.clone()),
        ConstantValue::Char(c) => Expr::string(c.to_string()),
    }
}

/// `tostring(value)`, skipped for string literals.
pub(crate) fn to_string(value: Expr) -> Expr {
    match value {
        Expr::String(_) => value,
        Expr::Number(n) => Expr::string(format_number(n)),
        other => Expr::call(Expr::id("tostring"), vec![other]),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// `index + 1`, folded for numeric literals.
pub(crate) fn adjust_index(index: Expr) -> Expr {
    match index.as_number() {
        Some(n) => Expr::Number(n + 1.0),
        None => match index {
            Expr::Binary {
                left,
                op: BinOp::Sub,
                right,
            } if right.as_number() == Some(1.0) => *left,
            other => Expr::binary(other, BinOp::Add, Expr::int(1)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luma_target::print_expr;

    #[test]
    fn test_index_adjustment_folds_literals() {
        assert_eq!(print_expr(&adjust_index(Expr::int(0))), "1");
        assert_eq!(print_expr(&adjust_index(Expr::id("i"))), "i + 1");
        let back = Expr::binary(Expr::id("n"), BinOp::Sub, Expr::int(1));
        assert_eq!(print_expr(&adjust_index(back)), "n");
    }

    #[test]
    fn test_to_string_skips_literals() {
        assert_eq!(print_expr(&to_string(Expr::int(3))), "\"3\"");
        assert_eq!(print_expr(&to_string(Expr::id("x"))), "tostring(x)");
    }
}
