//! Invocations and argument lists.

use super::identifiers::Receiver;
use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::{Lowerer, is_stable};
use crate::metadata::ParameterInfo;
use luma_source::{Argument, ExprKind, SymbolInfo, SymbolKind, TypeKind};
use luma_target::{BinOp, Expr, Stmt};

const ITERATOR_HELPER_OWNER: &str = "System.Linq.Enumerable";

fn is_iterator_helper(symbol: &SymbolInfo) -> bool {
    symbol.is_extension && symbol.containing_type.as_deref() == Some(ITERATOR_HELPER_OWNER)
}

/// `Where` -> `where`, `OrderByDescending` -> `orderByDescending`.
fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Lowerer<'_> {
    pub(super) fn lower_invocation(
        &mut self,
        expr: &luma_source::Expr,
        callee: &luma_source::Expr,
        arguments: &[Argument],
    ) -> LoweringResult<Expr> {
        let discarded = std::mem::take(&mut self.value_discarded);
        if let Some(lowered) = self.lower_call_macro(callee, arguments, discarded)? {
            return Ok(lowered);
        }
        let symbol = self.symbol_of(callee.id);
        if let Some(symbol) = symbol
            && is_iterator_helper(symbol)
        {
            return self.lower_iterator_helper(callee, symbol, arguments);
        }
        let kind = self.oracle.kind_of(callee.id);
        match &callee.kind {
            ExprKind::Member { object, name } if kind == SymbolKind::Method => {
                if name == "Invoke" && self.oracle.kind_of(object.id) == SymbolKind::Event {
                    let signal = self.lower_expr(object)?;
                    return self.lower_signal_fire(signal, arguments);
                }
                if name == "Invoke" && self.type_of(object.id).is_some_and(|t| t.is_delegate()) {
                    let function = self.lower_expr(object)?;
                    return self.lower_function_call(function, arguments);
                }
                let receiver = if symbol.is_some_and(|s| s.is_static && !s.is_extension) {
                    Receiver::Implicit
                } else {
                    self.lower_receiver(object)?
                };
                self.lower_method_call(callee, receiver, name, arguments)
            }
            ExprKind::MemberBinding(name) if kind == SymbolKind::Method => {
                let Some(binding) = self.binding_receivers.last().cloned() else {
                    return Err(LoweringError::unresolved("conditional access receiver", name, expr.span));
                };
                if name == "Invoke" && binding.is_event {
                    return self.lower_signal_fire(binding.value, arguments);
                }
                if name == "Invoke" && binding.ty.as_ref().is_some_and(|t| t.is_delegate()) {
                    return self.lower_function_call(binding.value, arguments);
                }
                self.lower_method_call(callee, Receiver::Value(binding.value, binding.ty), name, arguments)
            }
            ExprKind::Identifier(name) if kind == SymbolKind::Method => {
                if symbol.is_none_or(|s| s.containing_type.is_none()) {
                    let Some(binding) = self.ctx.lookup(name) else {
                        return Err(LoweringError::unresolved("method", name.as_str(), callee.span));
                    };
                    let function = Expr::Identifier(binding.emitted.clone());
                    return self.lower_function_call(function, arguments);
                }
                self.lower_method_call(callee, Receiver::Implicit, name, arguments)
            }
            _ if kind == SymbolKind::Event => {
                let signal = self.lower_expr(callee)?;
                self.lower_signal_fire(signal, arguments)
            }
            _ => {
                let function = self.lower_expr(callee)?;
                self.lower_function_call(function, arguments)
            }
        }
    }

    /// `f(args)` for a delegate value or local function.
    fn lower_function_call(&mut self, function: Expr, arguments: &[Argument]) -> LoweringResult<Expr> {
        let mut values = self.lower_call_arguments(vec![function], None, arguments, 0)?;
        let function = values.remove(0);
        Ok(Expr::call(function, values))
    }

    /// `signal:Fire(args)`
    fn lower_signal_fire(&mut self, signal: Expr, arguments: &[Argument]) -> LoweringResult<Expr> {
        let mut values = self.lower_call_arguments(vec![signal], None, arguments, 0)?;
        let signal = values.remove(0);
        Ok(Expr::method_call(signal, "Fire", values))
    }

    fn lower_method_call(
        &mut self,
        callee: &luma_source::Expr,
        receiver: Receiver,
        name: &str,
        arguments: &[Argument],
    ) -> LoweringResult<Expr> {
        let symbol = self.symbol_of(callee.id);
        let method = self.emitted_method_name(symbol, name);

        if symbol.is_some_and(|s| s.is_extension) {
            let owner = self.static_owner(symbol, &Receiver::Implicit, callee)?;
            let this = match receiver {
                Receiver::Value(value, _) | Receiver::Type(value) => value,
                Receiver::Implicit | Receiver::Base => Expr::id("self"),
            };
            let values = self.lower_call_arguments(vec![this], symbol, arguments, 1)?;
            return Ok(Expr::call(Expr::member(owner, method), values));
        }

        if symbol.is_some_and(|s| s.is_static) {
            let owner = self.static_owner(symbol, &receiver, callee)?;
            let values = self.lower_call_arguments(Vec::new(), symbol, arguments, 0)?;
            return Ok(Expr::call(Expr::member(owner, method), values));
        }

        match receiver {
            Receiver::Base => {
                let base = self.base_reference(callee)?;
                let values = self.lower_call_arguments(vec![Expr::id("self")], symbol, arguments, 0)?;
                Ok(Expr::call(Expr::member(base, method), values))
            }
            Receiver::Implicit => {
                let values = self.lower_call_arguments(Vec::new(), symbol, arguments, 0)?;
                Ok(Expr::method_call(Expr::id("self"), method, values))
            }
            Receiver::Value(value, _) => {
                let mut values = self.lower_call_arguments(vec![value], symbol, arguments, 0)?;
                let receiver = values.remove(0);
                Ok(Expr::method_call(receiver, method, values))
            }
            Receiver::Type(ty) => {
                let values = self.lower_call_arguments(Vec::new(), symbol, arguments, 0)?;
                Ok(Expr::call(Expr::member(ty, method), values))
            }
        }
    }

    /// `CS.Linq.<helper>(source, args)`
    fn lower_iterator_helper(
        &mut self,
        callee: &luma_source::Expr,
        symbol: &SymbolInfo,
        arguments: &[Argument],
    ) -> LoweringResult<Expr> {
        if !self.options.iterator_helpers {
            return Err(LoweringError::feature_disabled(
                format!("{}()", symbol.name),
                "iteratorHelpers",
                "Enable the 'iteratorHelpers' option or rewrite the expression as a loop.",
                callee.span,
            ));
        }
        let leading = match &callee.kind {
            ExprKind::Member { object, .. } if self.oracle.kind_of(object.id) != SymbolKind::Type => {
                vec![self.lower_expr(object)?]
            }
            ExprKind::MemberBinding(_) => match self.binding_receivers.last() {
                Some(binding) => vec![binding.value.clone()],
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        let values = self.lower_call_arguments(leading, None, arguments, 0)?;
        let helper = format!("Linq.{}", lower_camel(&symbol.name));
        Ok(self.runtime.call(&helper, values))
    }

    // =========================================================================
    // Arguments
    // =========================================================================

    /// Lower `arguments` after the already-lowered `leading` operands,
    /// returning both in order. Named arguments are placed by the declared
    /// parameter list (skipping the first `skip` parameters) when the callee
    /// is declared in source.
    pub(crate) fn lower_call_arguments(
        &mut self,
        leading: Vec<Expr>,
        symbol: Option<&SymbolInfo>,
        arguments: &[Argument],
        skip: usize,
    ) -> LoweringResult<Vec<Expr>> {
        let mut values = leading;
        let lead = values.len();
        for argument in arguments {
            let (prerequisites, value) = self.capture(|this| this.lower_argument(argument))?;
            self.pin_before(&mut values, prerequisites);
            values.push(value);
        }
        let lowered = values.split_off(lead);
        let parameters = symbol
            .and_then(|s| s.declaration)
            .and_then(|decl| self.metadata.callable(decl))
            .map(|callable| callable.parameters.get(skip..).unwrap_or_default());
        let arranged = match parameters {
            Some(parameters) => self.arrange_arguments(parameters, arguments, lowered),
            None => lowered,
        };
        values.extend(arranged);
        Ok(values)
    }

    fn lower_argument(&mut self, argument: &Argument) -> LoweringResult<Expr> {
        if !argument.ref_kind.is_by_reference() {
            return self.lower_expr(&argument.expr);
        }
        let place = self.lower_place(&argument.expr, true)?;
        if let super::Place::RefParameter(name) = &place {
            return Ok(Expr::id(name.clone()));
        }
        // function(...) if select("#", ...) > 0 then x = ... end return x end
        let has_value = Expr::binary(
            Expr::call(Expr::id("select"), vec![Expr::string("#"), Expr::Vararg]),
            BinOp::Gt,
            Expr::int(0),
        );
        Ok(Expr::variadic_function(
            Vec::new(),
            vec![
                Stmt::if_then(has_value, vec![place.write(Expr::Vararg)]),
                Stmt::Return(vec![place.read()]),
            ],
        ))
    }

    /// Put lowered arguments into declared parameter order.
    fn arrange_arguments(
        &mut self,
        parameters: &[ParameterInfo],
        arguments: &[Argument],
        mut lowered: Vec<Expr>,
    ) -> Vec<Expr> {
        let params_index = parameters.iter().position(|p| p.is_params);

        // `params` in normal form: the caller passes the array itself.
        if let Some(index) = params_index
            && arguments.len() == index + 1
            && arguments[index].name.is_none()
            && self
                .type_of(arguments[index].expr.id)
                .is_some_and(|t| t.kind == TypeKind::Array)
        {
            let array = std::mem::replace(&mut lowered[index], Expr::Nil);
            lowered[index] = Expr::call(Expr::path("table.unpack"), vec![array]);
        }

        if arguments.iter().all(|a| a.name.is_none()) {
            return lowered;
        }

        // Named arguments: keep source evaluation order by pinning every
        // value before placing them.
        let mut slots: Vec<Option<Expr>> = vec![None; parameters.len()];
        let mut extra: Vec<Expr> = Vec::new();
        let mut next_positional = 0;
        for (argument, value) in arguments.iter().zip(lowered) {
            let value = if is_stable(&value) {
                value
            } else {
                self.bind_temp("_arg", value)
            };
            let slot = match &argument.name {
                Some(name) => parameters.iter().position(|p| &p.name == name),
                None => {
                    let slot = next_positional;
                    next_positional += 1;
                    Some(slot)
                }
            };
            match slot {
                Some(slot) if slot < slots.len() && params_index != Some(slot) => {
                    slots[slot] = Some(value);
                }
                _ => extra.push(value),
            }
        }
        while slots.last().is_some_and(Option::is_none) {
            slots.pop();
        }
        let mut arranged: Vec<Expr> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Expr::Nil))
            .collect();
        arranged.extend(extra);
        arranged
    }
}
