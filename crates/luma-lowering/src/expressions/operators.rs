//! Unary, binary and assignment operators.

use super::identifiers::AccessorReceiver;
use super::macros::truncate;
use super::{Place, to_string};
use crate::error::LoweringResult;
use crate::lowerer::{Lowerer, is_stable};
use luma_source::{AssignOp, BinaryOp, ExprKind, PrimitiveKind, SymbolKind, TypeInfo, TypeKind, TypeSyntax, UnaryOp};
use luma_target::{BinOp, Expr, Stmt, UnOp};

/// Operand and result types of a binary operation, as far as the oracle
/// knows them.
#[derive(Clone, Copy, Default)]
struct OperandTypes<'t> {
    left: Option<&'t TypeInfo>,
    right: Option<&'t TypeInfo>,
    result: Option<&'t TypeInfo>,
}

impl OperandTypes<'_> {
    fn any_string(&self) -> bool {
        self.left.is_some_and(TypeInfo::is_string) || self.right.is_some_and(TypeInfo::is_string)
    }

    fn both_bool(&self) -> bool {
        self.left.is_some_and(TypeInfo::is_bool) && self.right.is_some_and(TypeInfo::is_bool)
    }

    fn integer_result(&self) -> bool {
        match self.result {
            Some(result) => result.is_integer(),
            None => {
                self.left.is_some_and(TypeInfo::is_integer) && self.right.is_some_and(TypeInfo::is_integer)
            }
        }
    }
}

fn bit32(function: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::path(&format!("bit32.{function}")), args)
}

/// `value + 1` or `value - 1`.
fn stepped(value: Expr, delta: i64) -> Expr {
    if delta < 0 {
        Expr::binary(value, BinOp::Sub, Expr::int(-delta))
    } else {
        Expr::binary(value, BinOp::Add, Expr::int(delta))
    }
}

impl Lowerer<'_> {
    // =========================================================================
    // Binary
    // =========================================================================

    pub(super) fn lower_binary(
        &mut self,
        expr: &luma_source::Expr,
        op: BinaryOp,
        left: &luma_source::Expr,
        right: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        if let Some(constant) = self.folded_constant(expr) {
            return Ok(constant);
        }
        match op {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                self.lower_short_circuit(op == BinaryOp::LogicalAnd, left, right)
            }
            BinaryOp::Coalesce => self.lower_coalesce(left, right),
            _ => {
                let mut operands = self.lower_ordered(&[left, right])?;
                let right_value = operands.pop().unwrap_or(Expr::Nil);
                let left_value = operands.pop().unwrap_or(Expr::Nil);
                let types = OperandTypes {
                    left: self.type_of(left.id),
                    right: self.type_of(right.id),
                    result: self.type_of(expr.id),
                };
                Ok(self.binary_expr(op, left_value, right_value, types))
            }
        }
    }

    /// `a and b` / `a or b`; a result temporary when `b` queues statements.
    fn lower_short_circuit(
        &mut self,
        is_and: bool,
        left: &luma_source::Expr,
        right: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        let left = self.lower_expr(left)?;
        let (prerequisites, right) = self.capture(|this| this.lower_expr(right))?;
        if prerequisites.is_empty() {
            return Ok(if is_and { Expr::and(left, right) } else { Expr::or(left, right) });
        }
        let result = self.bind_temp("_result", left);
        let condition = if is_and { result.clone() } else { Expr::not(result.clone()) };
        let mut then_block = prerequisites;
        then_block.push(Stmt::assign(result.clone(), right));
        self.emit(Stmt::if_then(condition, then_block));
        Ok(result)
    }

    /// `a ?? b`. `or` is only equivalent when `a` can never be `false`.
    fn lower_coalesce(
        &mut self,
        left: &luma_source::Expr,
        right: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        let left_is_bool = self.type_of(left.id).is_some_and(TypeInfo::is_bool);
        let left = self.lower_expr(left)?;
        let (prerequisites, right) = self.capture(|this| this.lower_expr(right))?;
        if prerequisites.is_empty() {
            if !left_is_bool {
                return Ok(Expr::or(left, right));
            }
            let left = self.spill(left, "_value");
            return Ok(Expr::if_else(
                Expr::ne(left.clone(), Expr::Nil),
                left,
                right,
            ));
        }
        let result = self.bind_temp("_result", left);
        let mut then_block = prerequisites;
        then_block.push(Stmt::assign(result.clone(), right));
        self.emit(Stmt::if_then(Expr::eq(result.clone(), Expr::Nil), then_block));
        Ok(result)
    }

    fn binary_expr(&mut self, op: BinaryOp, left: Expr, right: Expr, types: OperandTypes<'_>) -> Expr {
        match op {
            BinaryOp::Equals => Expr::binary(left, BinOp::Eq, right),
            BinaryOp::NotEquals => Expr::binary(left, BinOp::Ne, right),
            BinaryOp::LessThan => Expr::binary(left, BinOp::Lt, right),
            BinaryOp::LessThanOrEqual => Expr::binary(left, BinOp::Le, right),
            BinaryOp::GreaterThan => Expr::binary(left, BinOp::Gt, right),
            BinaryOp::GreaterThanOrEqual => Expr::binary(left, BinOp::Ge, right),
            BinaryOp::Add if types.any_string() => {
                let left = if types.left.is_some_and(TypeInfo::is_string) { left } else { to_string(left) };
                let right = if types.right.is_some_and(TypeInfo::is_string) { right } else { to_string(right) };
                Expr::binary(left, BinOp::Concat, right)
            }
            BinaryOp::Add => Expr::binary(left, BinOp::Add, right),
            BinaryOp::Subtract => Expr::binary(left, BinOp::Sub, right),
            BinaryOp::Multiply => Expr::binary(left, BinOp::Mul, right),
            BinaryOp::Divide if types.integer_result() => Expr::binary(left, BinOp::FloorDiv, right),
            BinaryOp::Divide => Expr::binary(left, BinOp::Div, right),
            BinaryOp::Modulo => Expr::binary(left, BinOp::Mod, right),
            BinaryOp::LeftShift => bit32("lshift", vec![left, right]),
            BinaryOp::RightShift => bit32("arshift", vec![left, right]),
            BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr if types.both_bool() => {
                // Both operands are evaluated.
                let (left, right) = if is_stable(&right) {
                    (left, right)
                } else {
                    let left = self.spill(left, "_left");
                    (left, self.bind_temp("_right", right))
                };
                if op == BinaryOp::BitwiseAnd {
                    Expr::and(left, right)
                } else {
                    Expr::or(left, right)
                }
            }
            BinaryOp::ExclusiveOr if types.both_bool() => Expr::ne(left, right),
            BinaryOp::BitwiseAnd => bit32("band", vec![left, right]),
            BinaryOp::BitwiseOr => bit32("bor", vec![left, right]),
            BinaryOp::ExclusiveOr => bit32("bxor", vec![left, right]),
            BinaryOp::LogicalAnd => Expr::and(left, right),
            BinaryOp::LogicalOr | BinaryOp::Coalesce => Expr::or(left, right),
        }
    }

    // =========================================================================
    // Unary
    // =========================================================================

    pub(super) fn lower_unary(
        &mut self,
        expr: &luma_source::Expr,
        op: UnaryOp,
        operand: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        if let Some(constant) = self.folded_constant(expr) {
            return Ok(constant);
        }
        match op {
            UnaryOp::Plus => self.lower_expr(operand),
            UnaryOp::Negate => Ok(Expr::unary(UnOp::Neg, self.lower_expr(operand)?)),
            UnaryOp::LogicalNot => Ok(Expr::not(self.lower_expr(operand)?)),
            UnaryOp::BitwiseNot => Ok(bit32("bnot", vec![self.lower_expr(operand)?])),
            UnaryOp::PreIncrement => self.lower_increment(operand, 1, true),
            UnaryOp::PreDecrement => self.lower_increment(operand, -1, true),
            UnaryOp::PostIncrement => self.lower_increment(operand, 1, false),
            UnaryOp::PostDecrement => self.lower_increment(operand, -1, false),
        }
    }

    /// `++x` / `x++` as a value: the update is queued, the value is the new
    /// or old contents.
    fn lower_increment(
        &mut self,
        operand: &luma_source::Expr,
        delta: i64,
        prefix: bool,
    ) -> LoweringResult<Expr> {
        let place = self.lower_place(operand, true)?;
        if prefix {
            if let Place::Variable(target) = &place {
                self.emit(compound(target.clone(), delta));
                return Ok(place.read());
            }
            let updated = self.bind_temp("_value", stepped(place.read(), delta));
            self.emit(place.write(updated.clone()));
            return Ok(updated);
        }
        let original = self.bind_temp("_original", place.read());
        self.emit(place.write(stepped(original.clone(), delta)));
        Ok(original)
    }

    /// `x++;` as a statement.
    pub(crate) fn lower_increment_stmt(
        &mut self,
        operand: &luma_source::Expr,
        delta: i64,
    ) -> LoweringResult<()> {
        let place = self.lower_place(operand, true)?;
        let stmt = match &place {
            Place::Variable(target) => compound(target.clone(), delta),
            _ => place.write(stepped(place.read(), delta)),
        };
        self.emit(stmt);
        Ok(())
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    pub(super) fn lower_assignment_expr(
        &mut self,
        _expr: &luma_source::Expr,
        op: AssignOp,
        target: &luma_source::Expr,
        value: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        Ok(self.lower_assignment(op, target, value, true)?.unwrap_or(Expr::Nil))
    }

    /// Queue the statements of an assignment. With `want_value`, returns an
    /// expression holding the assigned value.
    pub(crate) fn lower_assignment(
        &mut self,
        op: AssignOp,
        target: &luma_source::Expr,
        value: &luma_source::Expr,
        want_value: bool,
    ) -> LoweringResult<Option<Expr>> {
        if let ExprKind::Tuple(targets) = &target.kind {
            return self.lower_deconstruction(targets, value, want_value);
        }
        if self.oracle.kind_of(target.id) == SymbolKind::Event
            && matches!(op, AssignOp::Add | AssignOp::Subtract)
        {
            let signal = self.lower_expr(target)?;
            let handler = self.lower_expr(value)?;
            let method = if op == AssignOp::Add { "Connect" } else { "Disconnect" };
            self.emit(Stmt::Call(Expr::method_call(signal, method, vec![handler])));
            return Ok(None);
        }
        match op {
            AssignOp::Assign => self.lower_simple_assignment(target, value, want_value),
            AssignOp::Coalesce => {
                let place = self.lower_place(target, true)?;
                let (mut block, assigned) = self.capture(|this| this.lower_expr(value))?;
                if !want_value {
                    block.push(place.write(assigned));
                    self.emit(Stmt::if_then(Expr::eq(place.read(), Expr::Nil), block));
                    return Ok(None);
                }
                let current = self.bind_temp("_value", place.read());
                block.push(Stmt::assign(current.clone(), assigned));
                block.push(place.write(current.clone()));
                self.emit(Stmt::if_then(Expr::eq(current.clone(), Expr::Nil), block));
                Ok(Some(current))
            }
            _ => self.lower_compound_assignment(op, target, value, want_value),
        }
    }

    fn lower_simple_assignment(
        &mut self,
        target: &luma_source::Expr,
        value: &luma_source::Expr,
        want_value: bool,
    ) -> LoweringResult<Option<Expr>> {
        let place = self.lower_place(target, false)?;
        let (prerequisites, assigned) = self.capture(|this| this.lower_expr(value))?;
        let place = if prerequisites.is_empty() { place } else { self.pin_place(place) };
        for stmt in prerequisites {
            self.emit(stmt);
        }
        if !want_value {
            self.emit(place.write(assigned));
            return Ok(None);
        }
        let assigned = self.spill(assigned, "_value");
        self.emit(place.write(assigned.clone()));
        Ok(Some(assigned))
    }

    fn lower_compound_assignment(
        &mut self,
        op: AssignOp,
        target: &luma_source::Expr,
        value: &luma_source::Expr,
        want_value: bool,
    ) -> LoweringResult<Option<Expr>> {
        let Some(binary) = op.binary_op() else {
            return Ok(None);
        };
        let place = self.lower_place(target, true)?;
        let operand = self.lower_expr(value)?;
        let types = OperandTypes {
            left: self.type_of(target.id),
            right: self.type_of(value.id),
            result: self.type_of(target.id),
        };
        let combined = self.binary_expr(binary, place.read(), operand, types);

        // Luau `x op= v` when the combined value is `x op v` over a plain slot.
        if let Place::Variable(slot) = &place
            && let Expr::Binary { left, op: native, right } = &combined
            && native.is_compound_assignable()
            && left.as_ref() == slot
        {
            self.emit(Stmt::CompoundAssign {
                target: slot.clone(),
                op: *native,
                value: right.as_ref().clone(),
            });
            return Ok(want_value.then(|| place.read()));
        }
        if !want_value {
            self.emit(place.write(combined));
            return Ok(None);
        }
        let combined = self.bind_temp("_value", combined);
        self.emit(place.write(combined.clone()));
        Ok(Some(combined))
    }

    /// `(a, b) = value`
    fn lower_deconstruction(
        &mut self,
        targets: &[luma_source::Expr],
        value: &luma_source::Expr,
        want_value: bool,
    ) -> LoweringResult<Option<Expr>> {
        let mut places = Vec::with_capacity(targets.len());
        for target in targets {
            places.push(self.lower_place(target, true)?);
        }
        if let ExprKind::Tuple(items) = &value.kind
            && items.len() == targets.len()
            && !want_value
        {
            let refs: Vec<&luma_source::Expr> = items.iter().collect();
            let values = self.lower_ordered(&refs)?;
            if places.iter().all(Place::supports_compound) {
                let slots = places.iter().map(Place::read).collect();
                self.emit(Stmt::Assign {
                    targets: slots,
                    values,
                });
                return Ok(None);
            }
            let temps: Vec<Expr> = values
                .into_iter()
                .map(|v| self.bind_temp("_item", v))
                .collect();
            for (place, temp) in places.iter().zip(temps) {
                self.emit(place.write(temp));
            }
            return Ok(None);
        }
        let tuple = self.lower_expr(value)?;
        let tuple = self.spill(tuple, "_tuple");
        for (index, place) in places.iter().enumerate() {
            let slot = index as i64 + 1;
            self.emit(place.write(Expr::index(tuple.clone(), Expr::int(slot))));
        }
        Ok(want_value.then_some(tuple))
    }

    /// Spill the receiver and index of `place` so statements queued after it
    /// cannot change what it denotes.
    fn pin_place(&mut self, place: Place) -> Place {
        match place {
            Place::Variable(Expr::Member { object, name }) => {
                let object = self.spill(*object, "_receiver");
                Place::Variable(Expr::member(object, name))
            }
            Place::Variable(Expr::Index { object, index }) => {
                let object = self.spill(*object, "_receiver");
                let index = self.spill(*index, "_index");
                Place::Variable(Expr::index(object, index))
            }
            Place::Property {
                receiver: AccessorReceiver::Instance(receiver),
                name,
            } => Place::Property {
                receiver: AccessorReceiver::Instance(self.spill(receiver, "_receiver")),
                name,
            },
            Place::Indexer {
                receiver: AccessorReceiver::Instance(receiver),
                args,
            } => {
                let receiver = self.spill(receiver, "_receiver");
                let args = args.into_iter().map(|a| self.spill(a, "_index")).collect();
                Place::Indexer {
                    receiver: AccessorReceiver::Instance(receiver),
                    args,
                }
            }
            other => other,
        }
    }

    // =========================================================================
    // Casts
    // =========================================================================

    pub(super) fn lower_cast(
        &mut self,
        ty: &TypeSyntax,
        inner: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        if let Some(constant) = self.folded_constant(inner)
            && self.type_of(ty.id).is_some_and(|t| t.kind == TypeKind::Enum)
        {
            return Ok(constant);
        }
        let value = self.lower_expr(inner)?;
        let (Some(target), Some(source)) = (self.type_of(ty.id), self.type_of(inner.id)) else {
            return Ok(value);
        };
        let target_kind = target.primitive_kind();
        let source_kind = source.primitive_kind();
        Ok(match (source_kind, target_kind) {
            (Some(PrimitiveKind::Char), Some(kind)) if kind.is_integer() => {
                Expr::call(Expr::path("string.byte"), vec![value])
            }
            (Some(kind), Some(PrimitiveKind::Char)) if kind.is_integer() => {
                Expr::call(Expr::path("string.char"), vec![value])
            }
            (Some(from), Some(to)) if from.is_numeric() && !from.is_integer() && to.is_integer() => {
                let value = self.spill(value, "_value");
                truncate(value)
            }
            _ => value,
        })
    }
}

/// `x += 1` / `x -= 1`
fn compound(target: Expr, delta: i64) -> Stmt {
    let (op, amount) = if delta < 0 { (BinOp::Sub, -delta) } else { (BinOp::Add, delta) };
    Stmt::CompoundAssign {
        target,
        op,
        value: Expr::int(amount),
    }
}
