//! `a?.b`, `a?[i]` and chains of them.
//!
//! A chain lowers to one IIFE. Each link binds its receiver to a temporary,
//! returns `nil` early when the temporary is nil, and continues against it:
//!
//! ```text
//! (function()
//!     local _object = a
//!     if _object == nil then return nil end
//!     local _object_1 = _object.b
//!     if _object_1 == nil then return nil end
//!     return _object_1:c()
//! end)()
//! ```

use crate::error::LoweringResult;
use crate::lowerer::{BindingReceiver, Lowerer, discard};
use luma_source::{ExprKind, SymbolKind};
use luma_target::{Expr, Stmt};

impl Lowerer<'_> {
    pub(super) fn lower_conditional_access(
        &mut self,
        object: &luma_source::Expr,
        when_not_null: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        // The head is evaluated in the enclosing statement.
        let head = self.lower_expr(object)?;
        let head = self.binding_for(object, head);
        let (mut block, value) = self.with_scope(|this| {
            this.capture(|this| this.lower_access_links(head, when_not_null))
        })?;
        block.push(Stmt::Return(vec![value]));
        Ok(Expr::iife(block))
    }

    /// Emit the nil-checked links into the current capture and return the
    /// final value.
    fn lower_access_links(
        &mut self,
        mut receiver: BindingReceiver,
        mut link: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        loop {
            receiver.value = self.nil_guarded(receiver.value);
            match &link.kind {
                ExprKind::ConditionalAccess {
                    object,
                    when_not_null,
                } => {
                    let next =
                        self.with_binding_receiver(receiver, |this| this.lower_expr(object))?;
                    receiver = self.binding_for(object, next);
                    link = when_not_null;
                }
                _ => return self.with_binding_receiver(receiver, |this| this.lower_expr(link)),
            }
        }
    }

    fn binding_for(&self, object: &luma_source::Expr, value: Expr) -> BindingReceiver {
        BindingReceiver {
            value,
            ty: self.type_of(object.id).cloned(),
            is_event: self.oracle.kind_of(object.id) == SymbolKind::Event,
        }
    }

    /// `local _object = value; if _object == nil then return nil end`
    fn nil_guarded(&mut self, value: Expr) -> Expr {
        let temp = self.bind_temp("_object", value);
        self.emit(Stmt::if_then(
            Expr::eq(temp.clone(), Expr::Nil),
            vec![Stmt::Return(vec![Expr::Nil])],
        ));
        temp
    }

    /// `a?.M(...)` as a statement: an `if` instead of an IIFE.
    pub(crate) fn lower_conditional_access_stmt(
        &mut self,
        object: &luma_source::Expr,
        when_not_null: &luma_source::Expr,
    ) -> LoweringResult<Vec<Stmt>> {
        let (mut block, head) = self.capture(|this| this.lower_expr(object))?;
        let temp = self.ctx.fresh("_object");
        block.push(Stmt::local(temp.clone(), Some(head)));
        let receiver = self.binding_for(object, Expr::id(temp.clone()));
        let body = self.with_scope(|this| {
            this.with_binding_receiver(receiver, |this| {
                this.value_discarded = matches!(when_not_null.kind, ExprKind::Invocation { .. });
                let (mut block, value) = this.capture(|this| this.lower_expr(when_not_null))?;
                block.extend(discard(value));
                Ok(block)
            })
        })?;
        block.push(Stmt::if_then(Expr::ne(Expr::id(temp), Expr::Nil), body));
        Ok(block)
    }
}
