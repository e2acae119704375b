//! Type declaration lowering.
//!
//! Every type is lowered by the layout strategy the metadata table chose for
//! it:
//! - `class`: metatable prototype with `constructor`/`new` pairs
//! - `structs`: plain factory function returning a table literal
//! - `interface`: structural type alias, no runtime code
//! - `enums`: frozen table of constants
//!
//! `members` holds the per-member builders of the class layout and the
//! structural type fields shared by every layout.

mod class;
mod enums;
mod interface;
mod members;
mod structs;

use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::{Lowerer, TypeFrame};
use crate::metadata::{LayoutStrategy, TypeMetadata};
use crate::runtime::REGISTER_TYPE;
use luma_source::TypeDecl;
use luma_target::{Expr, Stmt as TStmt, TableField, TypeNode};

impl Lowerer<'_> {
    /// Lower one type declaration to file-level statements.
    pub(crate) fn lower_type_decl(&mut self, decl: &TypeDecl) -> LoweringResult<Vec<TStmt>> {
        let full_name = self.unit.qualified_name(decl);
        let _span = tracing::debug_span!("lower_type", r#type = %full_name).entered();
        let metadata = self.metadata;
        let Some(meta) = metadata.get(&full_name) else {
            return Err(LoweringError::unresolved("type", full_name, decl.span));
        };

        let local_name = match meta.strategy {
            LayoutStrategy::Interface => decl.name.clone(),
            _ => match self.local_type_name(&full_name) {
                Some(local) => local,
                None => self.ctx.register_local_type(&full_name, &decl.name),
            },
        };
        tracing::debug!(strategy = ?meta.strategy, local = %local_name, "[lowering] type layout");

        let frame = TypeFrame {
            full_name,
            local_name,
            base: meta.base.clone(),
        };
        let previous = self.current_type.replace(frame);
        let result = self.with_scope(|this| match meta.strategy {
            LayoutStrategy::Class => this.lower_class(decl, meta),
            LayoutStrategy::StructFactory => this.lower_struct(decl, meta),
            LayoutStrategy::Interface => this.lower_interface(decl, meta),
            LayoutStrategy::Enum => this.lower_enum(decl, meta),
        });
        self.current_type = previous;
        result
    }

    /// Emitted local of the type being lowered.
    fn frame_local(&self) -> String {
        match &self.current_type {
            Some(frame) => frame.local_name.clone(),
            None => unreachable!("declaration builders run inside a type frame"),
        }
    }

    /// `local T`, unless a forward reference already introduced it.
    fn declare_type_local(&mut self, local: &str) -> Option<TStmt> {
        self.ctx
            .ledger
            .declare(local)
            .then(|| TStmt::local(local.to_string(), None))
    }

    /// `CS.Reflection.registerType(T, { ... })` describing the base class,
    /// interfaces and attributes of `decl`.
    fn register_type(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
        local: &str,
    ) -> LoweringResult<Vec<TStmt>> {
        if !self.options.emit_reflection_metadata {
            return Ok(Vec::new());
        }
        let mut block = Vec::new();
        let mut fields = vec![
            TableField::Named("name".into(), Expr::string(meta.name.clone())),
            TableField::Named("fullName".into(), Expr::string(meta.full_name.clone())),
        ];
        if let Some(base) = &meta.base {
            let base = self.type_reference_by_name(base);
            fields.push(TableField::Named("base".into(), base));
        }
        if !meta.interfaces.is_empty() {
            let names = meta
                .interfaces
                .iter()
                .map(|name| Expr::string(name.clone()))
                .collect();
            fields.push(TableField::Named("interfaces".into(), Expr::array(names)));
        }
        if !decl.attributes.is_empty() {
            let mut attributes = Vec::with_capacity(decl.attributes.len());
            for attribute in &decl.attributes {
                let arguments: Vec<&luma_source::Expr> = attribute.arguments.iter().collect();
                let (prerequisites, values) =
                    self.capture(|this| this.lower_ordered(&arguments))?;
                block.extend(prerequisites);
                attributes.push(TableField::Positional(Expr::Table(vec![
                    TableField::Named("name".into(), Expr::string(attribute.name.clone())),
                    TableField::Named("arguments".into(), Expr::array(values)),
                ])));
            }
            fields.push(TableField::Named("attributes".into(), Expr::Table(attributes)));
        }
        let call = self
            .runtime
            .call(REGISTER_TYPE, vec![Expr::id(local), Expr::Table(fields)]);
        block.push(TStmt::Call(call));
        Ok(block)
    }

    /// `export type T<A> = <ty>` when annotations are enabled.
    fn type_alias(&self, decl: &TypeDecl, ty: TypeNode) -> Option<TStmt> {
        self.options.emit_type_annotations.then(|| TStmt::TypeAlias {
            name: self.frame_local(),
            generics: decl.type_parameters.clone(),
            ty,
            exported: true,
        })
    }
}
