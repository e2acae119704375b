//! Names, member access and assignable places.

use super::{adjust_index, constant_expr};
use crate::context::BindingKind;
use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::Lowerer;
use luma_source::{CollectionKind, ExprKind, SymbolInfo, SymbolKind, TypeInfo};
use luma_target::{Expr, Stmt};

/// How a computed accessor (`get_X`/`set_X`, `get_Item`/`set_Item`) is
/// invoked.
#[derive(Clone, Debug)]
pub(crate) enum AccessorReceiver {
    /// `receiver:get_X()`
    Instance(Expr),
    /// `Type.get_X()`
    Static(Expr),
    /// `Base.get_X(self)`
    Base { base: Expr, this: Expr },
}

impl AccessorReceiver {
    fn call(&self, method: String, mut args: Vec<Expr>) -> Expr {
        match self {
            AccessorReceiver::Instance(receiver) => Expr::method_call(receiver.clone(), method, args),
            AccessorReceiver::Static(ty) => Expr::call(Expr::member(ty.clone(), method), args),
            AccessorReceiver::Base { base, this } => {
                args.insert(0, this.clone());
                Expr::call(Expr::member(base.clone(), method), args)
            }
        }
    }

    fn stabilize(self, lowerer: &mut Lowerer<'_>) -> Self {
        match self {
            AccessorReceiver::Instance(receiver) => {
                AccessorReceiver::Instance(lowerer.spill(receiver, "_receiver"))
            }
            other => other,
        }
    }
}

/// An assignable location.
#[derive(Clone, Debug)]
pub(crate) enum Place {
    /// Local, field or table slot: valid on both sides of `=`.
    Variable(Expr),
    /// `ref`/`out` parameter: read `p()`, write `p(v)`.
    RefParameter(String),
    Property {
        receiver: AccessorReceiver,
        name: String,
    },
    Indexer {
        receiver: AccessorReceiver,
        args: Vec<Expr>,
    },
    /// A value that cannot be written (string characters).
    ReadOnly(Expr),
    /// `_ = value`
    Discard,
}

impl Place {
    pub(crate) fn read(&self) -> Expr {
        match self {
            Place::Variable(expr) | Place::ReadOnly(expr) => expr.clone(),
            Place::RefParameter(name) => Expr::call(Expr::id(name.clone()), Vec::new()),
            Place::Property { receiver, name } => receiver.call(format!("get_{name}"), Vec::new()),
            Place::Indexer { receiver, args } => receiver.call("get_Item".into(), args.clone()),
            Place::Discard => Expr::Nil,
        }
    }

    pub(crate) fn write(&self, value: Expr) -> Stmt {
        match self {
            Place::Variable(expr) => Stmt::assign(expr.clone(), value),
            Place::RefParameter(name) => Stmt::Call(Expr::call(Expr::id(name.clone()), vec![value])),
            Place::Property { receiver, name } => {
                Stmt::Call(receiver.call(format!("set_{name}"), vec![value]))
            }
            Place::Indexer { receiver, args } => {
                let mut args = args.clone();
                args.push(value);
                Stmt::Call(receiver.call("set_Item".into(), args))
            }
            Place::ReadOnly(_) | Place::Discard => Stmt::expr(value),
        }
    }

    /// Whether Luau compound assignment (`x += v`) can target this place.
    pub(crate) fn supports_compound(&self) -> bool {
        matches!(self, Place::Variable(_))
    }
}

/// What a member access is applied to.
pub(crate) enum Receiver {
    /// No explicit object: `this` or the declaring type.
    Implicit,
    Value(Expr, Option<TypeInfo>),
    Base,
    Type(Expr),
}

impl Lowerer<'_> {
    // =========================================================================
    // Reads
    // =========================================================================

    pub(super) fn lower_identifier(
        &mut self,
        expr: &luma_source::Expr,
        name: &str,
    ) -> LoweringResult<Expr> {
        if let Some(constant) = self.recorded_constant(expr) {
            return Ok(constant);
        }
        match self.oracle.kind_of(expr.id) {
            SymbolKind::Type => match self.type_of(expr.id) {
                Some(ty) => Ok(self.type_reference(ty)),
                None => match self.ctx.lookup(name) {
                    Some(binding) => Ok(Expr::Identifier(binding.emitted.clone())),
                    None => Err(LoweringError::unresolved("type", name, expr.span)),
                },
            },
            SymbolKind::Namespace => Err(self.unsupported_expr(expr)),
            SymbolKind::Method => self.lower_method_group(expr, Receiver::Implicit, name),
            _ => Ok(self.lower_place(expr, false)?.read()),
        }
    }

    pub(super) fn lower_member(
        &mut self,
        expr: &luma_source::Expr,
        object: &luma_source::Expr,
        name: &str,
    ) -> LoweringResult<Expr> {
        if let Some(constant) = self.recorded_constant(expr) {
            return Ok(constant);
        }
        if let Some(lowered) = self.lower_member_macro(expr, object, name)? {
            return Ok(lowered);
        }
        match self.oracle.kind_of(expr.id) {
            SymbolKind::Type | SymbolKind::Namespace => match self.type_of(expr.id) {
                Some(ty) => Ok(self.type_reference(ty)),
                None => Err(self.unsupported_expr(expr)),
            },
            SymbolKind::Method => {
                let receiver = self.lower_receiver(object)?;
                self.lower_method_group(expr, receiver, name)
            }
            _ => Ok(self.lower_place(expr, false)?.read()),
        }
    }

    pub(super) fn lower_member_binding(
        &mut self,
        expr: &luma_source::Expr,
        name: &str,
    ) -> LoweringResult<Expr> {
        let receiver = self.binding_receiver(expr)?;
        if let Some(lowered) = self.lower_bound_member_macro(expr, &receiver, name) {
            return Ok(lowered);
        }
        if self.oracle.kind_of(expr.id) == SymbolKind::Method {
            return self.lower_method_group(expr, receiver, name);
        }
        Ok(self.member_place(expr, receiver, name, false)?.read())
    }

    pub(super) fn lower_element_binding(
        &mut self,
        expr: &luma_source::Expr,
        index: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        let Receiver::Value(receiver, ty) = self.binding_receiver(expr)? else {
            return Err(self.unsupported_expr(expr));
        };
        let hint = self.type_of(index.id).cloned();
        let index = self.lower_expr(index)?;
        Ok(self
            .element_place(expr, receiver, ty.as_ref(), vec![index], &[hint], false)?
            .read())
    }

    pub(super) fn lower_element(
        &mut self,
        expr: &luma_source::Expr,
        object: &luma_source::Expr,
        indices: &[luma_source::Expr],
    ) -> LoweringResult<Expr> {
        Ok(self.element_target(expr, object, indices, false)?.read())
    }

    /// A recorded constant (const field, enum member) as a literal.
    fn recorded_constant(&self, expr: &luma_source::Expr) -> Option<Expr> {
        let resolution = self.oracle.resolve(expr.id)?;
        match resolution.kind {
            SymbolKind::EnumMember | SymbolKind::Field | SymbolKind::Local => {
                resolution.constant.as_ref().map(constant_expr)
            }
            _ => None,
        }
    }

    pub(crate) fn binding_receiver(&self, expr: &luma_source::Expr) -> LoweringResult<Receiver> {
        match self.binding_receivers.last() {
            Some(receiver) => Ok(Receiver::Value(receiver.value.clone(), receiver.ty.clone())),
            None => Err(LoweringError::unresolved(
                "conditional access receiver",
                self.unit.text_of(expr.span),
                expr.span,
            )),
        }
    }

    /// Lower the object of a member access.
    pub(crate) fn lower_receiver(&mut self, object: &luma_source::Expr) -> LoweringResult<Receiver> {
        if matches!(object.kind, ExprKind::Base) {
            return Ok(Receiver::Base);
        }
        match self.oracle.kind_of(object.id) {
            SymbolKind::Type => {
                let ty = self.lower_expr(object)?;
                Ok(Receiver::Type(ty))
            }
            _ => {
                let value = self.lower_expr(object)?;
                Ok(Receiver::Value(value, self.type_of(object.id).cloned()))
            }
        }
    }

    /// A method used as a value: static methods are the function itself,
    /// instance methods become a closure binding the receiver.
    fn lower_method_group(
        &mut self,
        expr: &luma_source::Expr,
        receiver: Receiver,
        name: &str,
    ) -> LoweringResult<Expr> {
        let symbol = self.symbol_of(expr.id);
        if let Some(symbol) = symbol
            && symbol.containing_type.is_none()
        {
            // Local function.
            return match self.ctx.lookup(name) {
                Some(binding) => Ok(Expr::Identifier(binding.emitted.clone())),
                None => Err(LoweringError::unresolved("method", name, expr.span)),
            };
        }
        let method = self.emitted_method_name(symbol, name);
        let is_static = symbol.is_some_and(|s| s.is_static);
        if is_static {
            let owner = self.static_owner(symbol, &receiver, expr)?;
            return Ok(Expr::member(owner, method));
        }
        let target = match receiver {
            Receiver::Implicit | Receiver::Base => Expr::id("self"),
            Receiver::Value(value, _) => self.spill(value, "_receiver"),
            Receiver::Type(ty) => ty,
        };
        Ok(Expr::variadic_function(
            Vec::new(),
            vec![Stmt::Return(vec![Expr::method_call(
                target,
                method,
                vec![Expr::Vararg],
            )])],
        ))
    }

    pub(crate) fn emitted_method_name(&self, symbol: Option<&SymbolInfo>, name: &str) -> String {
        symbol
            .and_then(|s| s.declaration)
            .and_then(|decl| self.metadata.callable(decl))
            .map_or_else(|| name.to_string(), |c| c.emitted_name.clone())
    }

    /// The type a static member is accessed through.
    pub(crate) fn static_owner(
        &mut self,
        symbol: Option<&SymbolInfo>,
        receiver: &Receiver,
        expr: &luma_source::Expr,
    ) -> LoweringResult<Expr> {
        if let Some(owner) = symbol.and_then(|s| s.containing_type.as_deref()) {
            return Ok(self.type_reference_by_name(owner));
        }
        match receiver {
            Receiver::Type(ty) => Ok(ty.clone()),
            _ => match &self.current_type {
                Some(frame) => Ok(Expr::Identifier(frame.local_name.clone())),
                None => Err(LoweringError::unresolved(
                    "member owner",
                    self.unit.text_of(expr.span),
                    expr.span,
                )),
            },
        }
    }

    // =========================================================================
    // Places
    // =========================================================================

    /// Lower an assignment target. With `stable`, receivers and indices are
    /// pinned into temporaries so the place can be read and written.
    pub(crate) fn lower_place(
        &mut self,
        target: &luma_source::Expr,
        stable: bool,
    ) -> LoweringResult<Place> {
        match &target.kind {
            ExprKind::Identifier(name) => self.identifier_place(target, name),
            ExprKind::Parenthesized(inner) => self.lower_place(inner, stable),
            ExprKind::Member { object, name } => {
                let symbol = self.symbol_of(target.id);
                let receiver = if symbol.is_some_and(|s| s.is_static) {
                    Receiver::Implicit
                } else {
                    self.lower_receiver(object)?
                };
                self.member_place(target, receiver, name, stable)
            }
            ExprKind::MemberBinding(name) => {
                let receiver = self.binding_receiver(target)?;
                self.member_place(target, receiver, name, stable)
            }
            ExprKind::Element { object, indices } => {
                self.element_target(target, object, indices, stable)
            }
            ExprKind::ElementBinding(index) => {
                let Receiver::Value(receiver, ty) = self.binding_receiver(target)? else {
                    return Err(self.unsupported_expr(target));
                };
                let hint = self.type_of(index.id).cloned();
                let index = self.lower_expr(index)?;
                self.element_place(target, receiver, ty.as_ref(), vec![index], &[hint], stable)
            }
            ExprKind::Declaration { name, .. } => {
                let emitted = self.declare_local(name);
                self.emit(Stmt::local(emitted.clone(), None));
                Ok(Place::Variable(Expr::Identifier(emitted)))
            }
            _ => Err(self.unsupported_expr(target)),
        }
    }

    fn identifier_place(&mut self, expr: &luma_source::Expr, name: &str) -> LoweringResult<Place> {
        let kind = self.oracle.kind_of(expr.id);
        let is_member = kind.is_member();
        if !is_member && let Some(binding) = self.ctx.lookup(name) {
            return Ok(match binding.kind {
                BindingKind::RefParameter => Place::RefParameter(binding.emitted.clone()),
                BindingKind::Local | BindingKind::Type => {
                    Place::Variable(Expr::Identifier(binding.emitted.clone()))
                }
            });
        }
        if is_member {
            return self.member_place(expr, Receiver::Implicit, name, false);
        }
        if name == "_" {
            return Ok(Place::Discard);
        }
        Err(LoweringError::unresolved("identifier", name, expr.span))
    }

    /// Field, property or event of `receiver`.
    pub(crate) fn member_place(
        &mut self,
        expr: &luma_source::Expr,
        receiver: Receiver,
        name: &str,
        stable: bool,
    ) -> LoweringResult<Place> {
        let symbol = self.symbol_of(expr.id);
        let is_static = symbol.is_some_and(|s| s.is_static) || matches!(receiver, Receiver::Type(_));
        let computed = self.is_computed_property(expr, symbol, name);

        if is_static {
            let owner = self.static_owner(symbol, &receiver, expr)?;
            return Ok(if computed {
                Place::Property {
                    receiver: AccessorReceiver::Static(owner),
                    name: name.to_string(),
                }
            } else {
                Place::Variable(Expr::member(owner, name))
            });
        }

        if computed {
            let accessor = match receiver {
                Receiver::Implicit => AccessorReceiver::Instance(Expr::id("self")),
                Receiver::Base => AccessorReceiver::Base {
                    base: self.base_reference(expr)?,
                    this: Expr::id("self"),
                },
                Receiver::Value(value, _) | Receiver::Type(value) => AccessorReceiver::Instance(value),
            };
            let accessor = if stable { accessor.stabilize(self) } else { accessor };
            return Ok(Place::Property {
                receiver: accessor,
                name: name.to_string(),
            });
        }

        let object = match receiver {
            Receiver::Implicit | Receiver::Base => Expr::id("self"),
            Receiver::Value(value, ty) => {
                if let Some(index) = tuple_item_index(ty.as_ref(), name) {
                    let value = if stable { self.spill(value, "_tuple") } else { value };
                    return Ok(Place::Variable(Expr::index(value, Expr::int(index))));
                }
                if stable { self.spill(value, "_receiver") } else { value }
            }
            Receiver::Type(ty) => ty,
        };
        Ok(Place::Variable(Expr::member(object, name)))
    }

    fn is_computed_property(
        &self,
        expr: &luma_source::Expr,
        symbol: Option<&SymbolInfo>,
        name: &str,
    ) -> bool {
        if self.oracle.kind_of(expr.id) != SymbolKind::Property {
            return false;
        }
        let Some(symbol) = symbol else {
            return false;
        };
        symbol.has_accessor_bodies
            || self
                .owner_metadata(symbol)
                .is_some_and(|meta| meta.computed_properties.contains(name))
    }

    /// Reference to the base class of the type being lowered.
    pub(crate) fn base_reference(&mut self, expr: &luma_source::Expr) -> LoweringResult<Expr> {
        let base = self.current_type.as_ref().and_then(|t| t.base.clone());
        match base {
            Some(base) => Ok(self.type_reference_by_name(&base)),
            None => Err(LoweringError::unresolved(
                "base type",
                self.unit.text_of(expr.span),
                expr.span,
            )),
        }
    }

    fn element_target(
        &mut self,
        expr: &luma_source::Expr,
        object: &luma_source::Expr,
        indices: &[luma_source::Expr],
        stable: bool,
    ) -> LoweringResult<Place> {
        let mut operands: Vec<&luma_source::Expr> = vec![object];
        operands.extend(indices.iter());
        let mut lowered = self.lower_ordered(&operands)?;
        let receiver = lowered.remove(0);
        let receiver_ty = self.type_of(object.id);
        let hints: Vec<Option<TypeInfo>> = indices.iter().map(|i| self.type_of(i.id).cloned()).collect();
        self.element_place(expr, receiver, receiver_ty, lowered, &hints, stable)
    }

    /// `receiver[index]` with base adjustment, an indexer call, or a string
    /// character read.
    pub(crate) fn element_place(
        &mut self,
        expr: &luma_source::Expr,
        receiver: Expr,
        receiver_ty: Option<&TypeInfo>,
        mut indices: Vec<Expr>,
        index_types: &[Option<TypeInfo>],
        stable: bool,
    ) -> LoweringResult<Place> {
        if self.oracle.kind_of(expr.id) == SymbolKind::Indexer {
            let receiver = AccessorReceiver::Instance(receiver);
            let (receiver, indices) = if stable {
                let receiver = receiver.stabilize(self);
                let indices = indices
                    .into_iter()
                    .map(|i| self.spill(i, "_index"))
                    .collect();
                (receiver, indices)
            } else {
                (receiver, indices)
            };
            return Ok(Place::Indexer {
                receiver,
                args: indices,
            });
        }
        if indices.len() != 1 {
            return Err(LoweringError::unsupported(
                "multi-dimensional element access",
                self.unit.text_of(expr.span),
                expr.span,
            ));
        }
        let index = indices.remove(0);
        let index_is_integer = index_types
            .first()
            .and_then(Option::as_ref)
            .is_none_or(|t| t.is_integer());

        if receiver_ty.is_some_and(|t| t.is_string()) {
            let index = adjust_index(index);
            let index = self.spill(index, "_index");
            return Ok(Place::ReadOnly(Expr::call(
                Expr::path("string.sub"),
                vec![receiver, index.clone(), index],
            )));
        }

        let (receiver, index) = if stable {
            (self.spill(receiver, "_receiver"), self.spill(index, "_index"))
        } else {
            (receiver, index)
        };
        let collection = receiver_ty.map_or(CollectionKind::NotCollection, |t| t.collection_kind());
        let index = match collection {
            CollectionKind::Sequence if index_is_integer => adjust_index(index),
            _ => index,
        };
        Ok(Place::Variable(Expr::index(receiver, index)))
    }
}

/// `ItemN` on a tuple value is the `N`th slot.
fn tuple_item_index(ty: Option<&TypeInfo>, name: &str) -> Option<i64> {
    let ty = ty?;
    if ty.kind != luma_source::TypeKind::Tuple {
        return None;
    }
    name.strip_prefix("Item")?.parse().ok()
}
