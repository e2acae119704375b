//! Struct factory layout.
//!
//! A struct without instance behaviour becomes a function taking the value
//! constructor's parameters followed by one parameter per data member:
//!
//! ```text
//! local function Point(X, Y)
//!     return {X = X or 0, Y = Y or 0}
//! end
//! ```
//!
//! With a value constructor the table is bound to `self`, the constructor
//! body runs against it, and `self` is returned. Indexer accessors are
//! carried on the table as `get_Item`/`set_Item` closures.

use crate::error::LoweringResult;
use crate::expressions::FunctionSpec;
use crate::lowerer::Lowerer;
use crate::metadata::TypeMetadata;
use luma_source::{Body, Member, MemberKind, TypeDecl, TypeSyntax};
use luma_target::{Expr, Param, Stmt as TStmt, TableField, TypeNode};

impl Lowerer<'_> {
    pub(super) fn lower_struct(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
    ) -> LoweringResult<Vec<TStmt>> {
        let local = self.frame_local();
        let fresh = self.ctx.ledger.declare(&local);
        let ctor = decl.constructors().next().map(|(_, ctor)| ctor);
        let members = data_members(decl);

        let empty = Body::Block(Vec::new());
        let (parameters, body) = match ctor {
            Some(ctor) => (ctor.parameters.as_slice(), ctor.body.as_ref().unwrap_or(&empty)),
            None => (&[][..], &empty),
        };
        let spec = FunctionSpec::method(parameters, body, None, false);
        let mut member_params = Vec::with_capacity(members.len());
        let mut function = self.build_function_with(&spec, |this| {
            let mut prologue = Vec::new();
            let mut fields = Vec::with_capacity(members.len());
            for (member, ty, initializer) in &members {
                let param = this.ctx.fresh(&member.name);
                let (prerequisites, value) =
                    this.capture(|this| this.factory_value(&param, ty, *initializer))?;
                prologue.extend(prerequisites);
                fields.push(TableField::Named(member.name.clone(), value));
                member_params.push(Param::new(param));
            }
            fields.extend(this.indexer_fields(decl)?);
            let table = Expr::Table(fields);
            prologue.push(match ctor {
                Some(_) => TStmt::local("self", Some(table)),
                None => TStmt::Return(vec![table]),
            });
            Ok(prologue)
        })?;
        function.params.extend(member_params);
        if ctor.is_some() {
            function.body.push(TStmt::Return(vec![Expr::id("self")]));
        }
        tracing::debug!(r#type = %meta.full_name, fields = members.len(), "[lowering] struct factory");

        let mut block = Vec::with_capacity(2);
        block.push(if fresh {
            TStmt::LocalFunction {
                name: local.clone(),
                function,
            }
        } else {
            TStmt::FunctionDecl {
                path: vec![local.clone()],
                method: None,
                function,
            }
        });
        let fields = self.structural_fields(&decl.members, meta, &TypeNode::named(local));
        block.extend(self.type_alias(decl, TypeNode::Table(fields)));
        Ok(block)
    }

    /// `X or default`. A boolean member whose default is not `false` uses an
    /// explicit nil test so a passed `false` survives.
    fn factory_value(
        &mut self,
        param: &str,
        ty: &TypeSyntax,
        initializer: Option<&luma_source::Expr>,
    ) -> LoweringResult<Expr> {
        let value = Expr::id(param);
        let default = match (initializer, self.type_of(ty.id)) {
            (Some(initializer), _) => self.lower_expr(initializer)?,
            (None, Some(ty)) => self.default_value(ty),
            (None, None) => Expr::Nil,
        };
        if default.is_nil() {
            return Ok(value);
        }
        let is_bool = self.type_of(ty.id).is_some_and(|ty| ty.is_bool());
        if is_bool && default != Expr::Boolean(false) {
            return Ok(Expr::if_else(Expr::eq(value.clone(), Expr::Nil), default, value));
        }
        Ok(Expr::or(value, default))
    }
}

/// Instance fields and auto properties, in source order.
fn data_members(decl: &TypeDecl) -> Vec<(&Member, &TypeSyntax, Option<&luma_source::Expr>)> {
    decl.members
        .iter()
        .filter(|member| !member.is_static())
        .filter_map(|member| match &member.kind {
            MemberKind::Field { ty, initializer }
            | MemberKind::Property {
                ty, initializer, ..
            } => Some((member, ty, initializer.as_ref())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use crate::Lowerer;
    use luma_source::{
        CompilationUnit, Modifiers, SymbolKind, SyntaxFactory, TypeDecl, TypeDeclKind,
        TypeInfo,
    };
    use luma_target::print_block;

    fn lower(f: SyntaxFactory, decl: TypeDecl, annotations: bool) -> String {
        let mut unit = CompilationUnit::new("Main.cs");
        unit.declarations = vec![decl];
        let options = LoweringOptions {
            emit_type_annotations: annotations,
            ..LoweringOptions::default()
        };
        let oracle = f.into_oracle();
        let metadata = MetadataTable::collect(std::slice::from_ref(&unit), &oracle);
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        let block = lowerer
            .lower_type_decl(&unit.declarations[0])
            .expect("lowered");
        lowerer.ctx.assert_balanced();
        print_block(&block)
    }

    #[test]
    fn test_plain_struct_returns_table_literal() {
        let mut f = SyntaxFactory::new();
        let mut point = f.type_decl(TypeDeclKind::Struct, "Point");
        point.members = vec![
            f.auto_property("X", &TypeInfo::int(), Modifiers::public()),
            f.auto_property("Y", &TypeInfo::int(), Modifiers::public()),
        ];
        let printed = lower(f, point, false);
        assert_eq!(
            printed,
            "local function Point(X, Y)\n    return {X = X or 0, Y = Y or 0}\nend\n"
        );
    }

    #[test]
    fn test_value_constructor_runs_against_self() {
        let mut f = SyntaxFactory::new();
        let mut size = f.type_decl(TypeDeclKind::Struct, "Size");
        let owner = TypeInfo::new("Size", "Size", luma_source::TypeKind::Struct);
        let side = f.param("side", &TypeInfo::int());
        let width = f.instance_member(None, SymbolKind::Property, "Width", &owner, TypeInfo::int());
        let value = f.local("side", TypeInfo::int());
        let assign = f.assign(width, value);
        let body = f.expr_stmt(assign);
        size.members = vec![
            f.auto_property("Width", &TypeInfo::int(), Modifiers::public()),
            f.constructor(vec![side], None, vec![body]),
        ];
        let printed = lower(f, size, false);
        assert_eq!(
            printed,
            "local function Size(side, Width)\n    local self = {Width = Width or 0}\n    self.Width = side\n    return self\nend\n"
        );
    }

    #[test]
    fn test_boolean_member_keeps_passed_false() {
        let mut f = SyntaxFactory::new();
        let mut flags = f.type_decl(TypeDeclKind::Struct, "Flags");
        let on = f.boolean(true);
        flags.members = vec![f.field("Enabled", &TypeInfo::bool(), Some(on), Modifiers::public())];
        let printed = lower(f, flags, true);
        assert!(
            printed.contains("Enabled = if Enabled == nil then true else Enabled"),
            "{printed}"
        );
        assert!(printed.contains("export type Flags = {\n    Enabled: boolean,\n}"), "{printed}");
    }
}
