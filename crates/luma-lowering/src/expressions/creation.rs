//! Object, collection and array construction.

use super::identifiers::Receiver;
use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::{Lowerer, discard, is_stable};
use crate::metadata::TypeMetadata;
use crate::types::is_set_type;
use luma_source::{
    Argument, CollectionKind, ExprKind, Initializer, InitializerValue, MemberInitializer, TypeInfo,
    TypeSyntax,
};
use luma_target::{Expr, Stmt, TableField};

impl Lowerer<'_> {
    pub(super) fn lower_object_creation(
        &mut self,
        expr: &luma_source::Expr,
        syntax: &TypeSyntax,
        arguments: &[Argument],
        initializer: Option<&Initializer>,
    ) -> LoweringResult<Expr> {
        let Some(ty) = self.type_of(syntax.id).or_else(|| self.type_of(expr.id)) else {
            return Err(LoweringError::unresolved("type", syntax.name.as_str(), syntax.span));
        };

        // `new Action(f)` is `f`.
        if ty.is_delegate() {
            return match arguments {
                [argument] => self.lower_expr(&argument.expr),
                _ => Err(self.unsupported_expr(expr)),
            };
        }
        if is_set_type(ty) {
            return self.lower_set_creation(arguments, initializer);
        }
        match ty.collection_kind() {
            CollectionKind::Sequence => {
                return self.lower_sequence_creation(ty, arguments, initializer);
            }
            CollectionKind::Map => return self.lower_map_creation(expr, ty, arguments, initializer),
            CollectionKind::NotCollection => {}
        }

        let meta = self.metadata.get(&ty.strip_nullable().full_name);
        if let Some(meta) = meta
            && meta.is_struct_factory()
        {
            return self.lower_factory_call(expr, ty, meta, arguments, initializer);
        }

        let constructor = match meta {
            Some(meta) => self.constructor_name(expr, meta)?,
            None => "new".to_string(),
        };
        let class = self.type_reference(ty);
        let symbol = self.symbol_of(expr.id);
        let values = self.lower_call_arguments(Vec::new(), symbol, arguments, 0)?;
        let instance = Expr::call(Expr::member(class, constructor), values);
        match initializer {
            Some(initializer) => self.initialized(instance, Some(ty), initializer),
            None => Ok(instance),
        }
    }

    /// `new` or the overload's `new__N`.
    fn constructor_name(&self, expr: &luma_source::Expr, meta: &TypeMetadata) -> LoweringResult<String> {
        let callable = self
            .symbol_of(expr.id)
            .and_then(|s| s.declaration)
            .and_then(|decl| meta.callable(decl));
        match callable {
            Some(callable) => Ok(callable.emitted_name.clone()),
            None if meta.constructor_count <= 1 => Ok("new".to_string()),
            None => Err(LoweringError::unresolved(
                "constructor",
                meta.name.as_str(),
                expr.span,
            )),
        }
    }

    /// `Point(ctorArgs..., fields...)`. Without a declared constructor the
    /// object initializer fills the field parameters directly.
    fn lower_factory_call(
        &mut self,
        expr: &luma_source::Expr,
        ty: &TypeInfo,
        meta: &TypeMetadata,
        arguments: &[Argument],
        initializer: Option<&Initializer>,
    ) -> LoweringResult<Expr> {
        let factory = self.type_reference(ty);
        let symbol = self.symbol_of(expr.id);
        let mut values = self.lower_call_arguments(Vec::new(), symbol, arguments, 0)?;

        let positional = match initializer {
            Some(Initializer::Object(members)) if meta.constructor_count == 0 => {
                self.factory_slots(meta, members)?
            }
            _ => None,
        };
        if let Some(slots) = positional {
            values.extend(slots);
            return Ok(Expr::call(factory, values));
        }

        let instance = Expr::call(factory, values);
        match initializer {
            Some(initializer) => self.initialized(instance, Some(ty), initializer),
            None => Ok(instance),
        }
    }

    /// Initializer values placed at their field's parameter position, or
    /// `None` when some member is not a plain factory field.
    fn factory_slots(
        &mut self,
        meta: &TypeMetadata,
        members: &[MemberInitializer],
    ) -> LoweringResult<Option<Vec<Expr>>> {
        let mut positions = Vec::with_capacity(members.len());
        let mut exprs = Vec::with_capacity(members.len());
        for member in members {
            let InitializerValue::Expr(value) = &member.value else {
                return Ok(None);
            };
            let Some(position) = meta.factory_fields.iter().position(|f| f == &member.name) else {
                return Ok(None);
            };
            positions.push(position);
            exprs.push(value);
        }

        let mut lowered = self.lower_ordered(&exprs)?;
        // Field order differs from source order: pin so effects keep their
        // source order.
        if !positions.is_sorted() {
            for value in &mut lowered {
                if !is_stable(value) {
                    let taken = std::mem::replace(value, Expr::Nil);
                    *value = self.bind_temp("_arg", taken);
                }
            }
        }

        let mut slots = vec![Expr::Nil; positions.iter().max().map_or(0, |p| p + 1)];
        for (position, value) in positions.into_iter().zip(lowered) {
            slots[position] = value;
        }
        Ok(Some(slots))
    }

    // =========================================================================
    // Collections
    // =========================================================================

    fn lower_sequence_creation(
        &mut self,
        ty: &TypeInfo,
        arguments: &[Argument],
        initializer: Option<&Initializer>,
    ) -> LoweringResult<Expr> {
        let source = self.collection_source(arguments)?;
        match (source, initializer) {
            (None, Some(Initializer::Collection(items))) => {
                let refs: Vec<&luma_source::Expr> = items.iter().collect();
                let values = self.lower_ordered(&refs)?;
                Ok(Expr::array(values))
            }
            (None, None) => Ok(Expr::empty_table()),
            (Some(source), None) => Ok(table_clone(source)),
            (source, Some(initializer)) => {
                let base = source.map_or_else(Expr::empty_table, table_clone);
                self.initialized(base, Some(ty), initializer)
            }
        }
    }

    fn lower_map_creation(
        &mut self,
        expr: &luma_source::Expr,
        ty: &TypeInfo,
        arguments: &[Argument],
        initializer: Option<&Initializer>,
    ) -> LoweringResult<Expr> {
        let source = self.collection_source(arguments)?;
        match (source, initializer) {
            (None, Some(Initializer::Dictionary(entries))) => {
                let mut refs: Vec<&luma_source::Expr> = Vec::with_capacity(entries.len() * 2);
                for (key, value) in entries {
                    refs.push(key);
                    refs.push(value);
                }
                let mut lowered = self.lower_ordered(&refs)?.into_iter();
                let mut fields = Vec::with_capacity(entries.len());
                while let (Some(key), Some(value)) = (lowered.next(), lowered.next()) {
                    fields.push(keyed_field(key, value));
                }
                Ok(Expr::Table(fields))
            }
            (_, Some(Initializer::Collection(_))) => Err(self.unsupported_expr(expr)),
            (None, None) => Ok(Expr::empty_table()),
            (Some(source), None) => Ok(table_clone(source)),
            (source, Some(initializer)) => {
                let base = source.map_or_else(Expr::empty_table, table_clone);
                self.initialized(base, Some(ty), initializer)
            }
        }
    }

    /// Sets are `{[item] = true}`.
    fn lower_set_creation(
        &mut self,
        arguments: &[Argument],
        initializer: Option<&Initializer>,
    ) -> LoweringResult<Expr> {
        let source = match arguments.first() {
            Some(argument) => {
                let from_map = self
                    .type_of(argument.expr.id)
                    .is_some_and(|t| t.collection_kind() == CollectionKind::Map);
                let is_collection = self
                    .type_of(argument.expr.id)
                    .is_some_and(|t| t.collection_kind() != CollectionKind::NotCollection);
                let source = self.collection_source(arguments)?;
                match source {
                    Some(source) if from_map => Some(table_clone(source)),
                    Some(source) if is_collection => Some(self.set_from_sequence(source)),
                    _ => None,
                }
            }
            None => None,
        };
        let items = match initializer {
            Some(Initializer::Collection(items)) => items.as_slice(),
            Some(_) | None => &[],
        };
        let refs: Vec<&luma_source::Expr> = items.iter().collect();
        match source {
            None => {
                let values = self.lower_ordered(&refs)?;
                Ok(Expr::Table(
                    values
                        .into_iter()
                        .map(|item| keyed_field(item, Expr::Boolean(true)))
                        .collect(),
                ))
            }
            Some(set) => {
                let set = self.spill(set, "_set");
                for item in refs {
                    let item = self.lower_expr(item)?;
                    self.emit(Stmt::assign(Expr::index(set.clone(), item), Expr::Boolean(true)));
                }
                Ok(set)
            }
        }
    }

    /// ```text
    /// local _set = {}
    /// for _, _item in source do _set[_item] = true end
    /// ```
    fn set_from_sequence(&mut self, source: Expr) -> Expr {
        let set = self.bind_temp("_set", Expr::empty_table());
        let item = self.ctx.fresh("_item");
        self.emit(Stmt::GenericFor {
            vars: vec!["_".to_string(), item.clone()],
            exprs: vec![source],
            body: vec![Stmt::assign(
                Expr::index(set.clone(), Expr::id(item)),
                Expr::Boolean(true),
            )],
        });
        set
    }

    /// The collection argument a constructor copies from. Capacity and
    /// comparer arguments have no runtime meaning and are only kept for
    /// their effects.
    fn collection_source(&mut self, arguments: &[Argument]) -> LoweringResult<Option<Expr>> {
        let mut source = None;
        for argument in arguments {
            let value = self.lower_expr(&argument.expr)?;
            let is_collection = self
                .type_of(argument.expr.id)
                .is_some_and(|t| t.collection_kind() != CollectionKind::NotCollection);
            if is_collection && source.is_none() {
                source = Some(value);
            } else if let Some(stmt) = discard(value) {
                self.emit(stmt);
            }
        }
        Ok(source)
    }

    // =========================================================================
    // Initializers
    // =========================================================================

    /// Bind `instance` to `_obj` and run `initializer` against it.
    fn initialized(
        &mut self,
        instance: Expr,
        ty: Option<&TypeInfo>,
        initializer: &Initializer,
    ) -> LoweringResult<Expr> {
        let target = self.bind_temp("_obj", instance);
        self.initialize_into(&target, ty, initializer)?;
        Ok(target)
    }

    fn initialize_into(
        &mut self,
        target: &Expr,
        ty: Option<&TypeInfo>,
        initializer: &Initializer,
    ) -> LoweringResult<()> {
        match initializer {
            Initializer::Object(members) => {
                for member in members {
                    self.initialize_member(target, ty, member)?;
                }
            }
            Initializer::Collection(items) => {
                let collection = ty.map_or(CollectionKind::NotCollection, |t| t.collection_kind());
                let is_set = ty.is_some_and(is_set_type);
                for item in items {
                    let item = self.lower_expr(item)?;
                    let stmt = if is_set {
                        Stmt::assign(Expr::index(target.clone(), item), Expr::Boolean(true))
                    } else if collection == CollectionKind::Sequence {
                        Stmt::Call(Expr::call(
                            Expr::path("table.insert"),
                            vec![target.clone(), item],
                        ))
                    } else {
                        Stmt::Call(Expr::method_call(target.clone(), "Add", vec![item]))
                    };
                    self.emit(stmt);
                }
            }
            Initializer::Dictionary(entries) => {
                let is_map = ty.is_some_and(|t| t.collection_kind() == CollectionKind::Map);
                for (key, value) in entries {
                    let mut lowered = self.lower_ordered(&[key, value])?;
                    let value = lowered.pop().unwrap_or(Expr::Nil);
                    let key = lowered.pop().unwrap_or(Expr::Nil);
                    let stmt = if is_map {
                        Stmt::assign(Expr::index(target.clone(), key), value)
                    } else {
                        Stmt::Call(Expr::method_call(target.clone(), "set_Item", vec![key, value]))
                    };
                    self.emit(stmt);
                }
            }
        }
        Ok(())
    }

    /// `_obj.Name = value`, or a nested initializer run against the member's
    /// current value.
    fn initialize_member(
        &mut self,
        target: &Expr,
        ty: Option<&TypeInfo>,
        member: &MemberInitializer,
    ) -> LoweringResult<()> {
        // Resolved like `.Name` on the object under construction.
        let node = luma_source::Expr {
            id: member.id,
            span: member.span,
            kind: ExprKind::MemberBinding(member.name.clone()),
        };
        let receiver = Receiver::Value(target.clone(), ty.cloned());
        let place = self.member_place(&node, receiver, &member.name, false)?;
        match &member.value {
            InitializerValue::Expr(value) => {
                let value = self.lower_expr(value)?;
                self.emit(place.write(value));
            }
            InitializerValue::Nested(nested) => {
                let current = self.spill(place.read(), "_member");
                let member_ty = self.type_of(member.id);
                self.initialize_into(&current, member_ty, nested)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    pub(super) fn lower_array_creation(
        &mut self,
        expr: &luma_source::Expr,
        element_type: &TypeSyntax,
        sizes: &[Option<luma_source::Expr>],
        initializer: Option<&[luma_source::Expr]>,
    ) -> LoweringResult<Expr> {
        if sizes.len() > 1 {
            return Err(LoweringError::unsupported(
                "multi-dimensional array",
                self.unit.text_of(expr.span),
                expr.span,
            ));
        }
        if let Some(items) = initializer {
            let refs: Vec<&luma_source::Expr> = items.iter().collect();
            let values = self.lower_ordered(&refs)?;
            return Ok(Expr::array(values));
        }
        let Some(Some(size)) = sizes.first() else {
            return Ok(Expr::empty_table());
        };
        let size = self.lower_expr(size)?;
        let default = match self.type_of(element_type.id) {
            Some(ty) => self.default_value(ty),
            None => Expr::Nil,
        };
        if default.is_nil() {
            return Ok(Expr::call(Expr::path("table.create"), vec![size]));
        }
        if default.is_pure() {
            return Ok(Expr::call(Expr::path("table.create"), vec![size, default]));
        }

        // Struct elements need one value each.
        let size = self.spill(size, "_size");
        let array = self.bind_temp(
            "_array",
            Expr::call(Expr::path("table.create"), vec![size.clone()]),
        );
        let index = self.ctx.fresh("_i");
        self.emit(Stmt::NumericFor {
            var: index.clone(),
            start: Expr::int(1),
            limit: size,
            step: None,
            body: vec![Stmt::assign(Expr::index(array.clone(), Expr::id(index)), default)],
        });
        Ok(array)
    }
}

fn table_clone(source: Expr) -> Expr {
    Expr::call(Expr::path("table.clone"), vec![source])
}

/// `[key] = value`, or `name = value` for identifier-shaped string keys.
fn keyed_field(key: Expr, value: Expr) -> TableField {
    match key {
        Expr::String(name) if luma_target::ir::is_valid_identifier(&name) => {
            TableField::Named(name, value)
        }
        key => TableField::Keyed(key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luma_target::print_expr;

    #[test]
    fn test_keyed_field_uses_names_for_identifiers() {
        let table = Expr::Table(vec![
            keyed_field(Expr::string("apple"), Expr::int(1)),
            keyed_field(Expr::string("two words"), Expr::int(2)),
            keyed_field(Expr::int(3), Expr::Boolean(true)),
        ]);
        assert_eq!(
            print_expr(&table),
            "{apple = 1, [\"two words\"] = 2, [3] = true}"
        );
    }
}
