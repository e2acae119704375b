//! Enums become a frozen table of their member values.
//!
//! Member references with a constant value are already replaced by the
//! value at the use site; the table serves reflection and non-constant
//! lookups.

use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::Lowerer;
use crate::metadata::TypeMetadata;
use luma_source::TypeDecl;
use luma_target::{Expr, Stmt as TStmt, TableField, TypeNode};

impl Lowerer<'_> {
    pub(super) fn lower_enum(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
    ) -> LoweringResult<Vec<TStmt>> {
        let local = self.frame_local();
        let mut block = Vec::new();
        let mut fields = Vec::with_capacity(decl.enum_members.len());
        for member in &decl.enum_members {
            let constant = meta.enum_values.get(&member.name).copied().flatten();
            let value = match (constant, &member.value) {
                (Some(value), _) => Expr::int(value),
                (None, Some(expr)) => {
                    let (prerequisites, value) = self.capture(|this| this.lower_expr(expr))?;
                    block.extend(prerequisites);
                    value
                }
                (None, None) => {
                    return Err(LoweringError::unsupported(
                        "enum member",
                        format!("'{}' follows a member without a constant value", member.name),
                        member.span,
                    ));
                }
            };
            fields.push(TableField::Named(member.name.clone(), value));
        }

        let frozen = Expr::call(Expr::path("table.freeze"), vec![Expr::Table(fields)]);
        block.push(if self.ctx.ledger.declare(&local) {
            TStmt::local(local.clone(), Some(frozen))
        } else {
            TStmt::assign(Expr::id(local.clone()), frozen)
        });
        block.extend(self.register_type(decl, meta, &local)?);
        block.extend(self.type_alias(decl, TypeNode::named("number")));
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use crate::Lowerer;
    use luma_common::Span;
    use luma_source::{CompilationUnit, EnumMember, SyntaxFactory, TypeDeclKind};
    use luma_target::print_block;

    #[test]
    fn test_enum_values_count_on_from_explicit_member() {
        let mut f = SyntaxFactory::new();
        let mut color = f.type_decl(TypeDeclKind::Enum, "Color");
        let five = f.int(5);
        color.enum_members = [("Red", None), ("Green", Some(five)), ("Blue", None)]
            .into_iter()
            .map(|(name, value)| EnumMember {
                id: f.next_id(),
                span: Span::DUMMY,
                name: name.to_string(),
                value,
            })
            .collect();

        let mut unit = CompilationUnit::new("Main.cs");
        unit.declarations = vec![color];
        let options = LoweringOptions {
            emit_reflection_metadata: false,
            ..LoweringOptions::default()
        };
        let oracle = f.into_oracle();
        let metadata = MetadataTable::collect(std::slice::from_ref(&unit), &oracle);
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        let block = lowerer
            .lower_type_decl(&unit.declarations[0])
            .expect("lowered");
        assert_eq!(
            print_block(&block),
            "local Color = table.freeze({Red = 0, Green = 5, Blue = 6})\nexport type Color = number\n"
        );
    }
}
