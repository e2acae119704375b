//! Type references, annotations and default values.

use crate::lowerer::Lowerer;
use crate::metadata::LayoutStrategy;
use crate::runtime::{DEFAULT_VALUE, GET_ASSEMBLY_TYPE};
use luma_source::{CollectionKind, PrimitiveKind, TypeInfo, TypeKind, TypeSyntax};
use luma_target::{Expr, TypeNode};

/// Full names of the collection types stored as `{[T]: boolean}`.
const SET_TYPES: &[&str] = &["HashSet", "ISet", "SortedSet"];

pub(crate) fn is_set_type(ty: &TypeInfo) -> bool {
    SET_TYPES.contains(&ty.strip_nullable().name.as_str())
}

impl Lowerer<'_> {
    /// Emitted local of a type declared in this file.
    pub(crate) fn local_type_name(&self, full_name: &str) -> Option<String> {
        self.ctx.local_type(full_name).map(str::to_string)
    }

    /// A runtime reference to a type. Same-file types are their local (a
    /// forward reference is recorded in the predeclaration ledger); every
    /// other type is resolved through the runtime assembly registry.
    pub(crate) fn type_reference(&mut self, ty: &TypeInfo) -> Expr {
        self.type_reference_by_name(&ty.strip_nullable().full_name)
    }

    pub(crate) fn type_reference_by_name(&mut self, full_name: &str) -> Expr {
        if let Some(local) = self.local_type_name(full_name) {
            if !self.is_type_being_declared(full_name) {
                self.ctx.ledger.require(&local);
            }
            return Expr::Identifier(local);
        }
        self.runtime.assembly_type(full_name)
    }

    /// Type reference for a type named in source.
    pub(crate) fn type_syntax_reference(&mut self, syntax: &TypeSyntax) -> Expr {
        match self.type_of(syntax.id) {
            Some(ty) => self.type_reference(ty),
            None => match self.ctx.lookup(&syntax.name) {
                Some(binding) => Expr::Identifier(binding.emitted.clone()),
                None => self
                    .runtime
                    .call(GET_ASSEMBLY_TYPE, vec![Expr::string(syntax.name.clone())]),
            },
        }
    }

    fn is_type_being_declared(&self, full_name: &str) -> bool {
        self.current_type
            .as_ref()
            .is_some_and(|frame| frame.full_name == full_name)
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    /// Luau annotation for a source type.
    pub(crate) fn type_annotation(&self, ty: &TypeInfo) -> TypeNode {
        if ty.kind == TypeKind::Nullable {
            return self.type_annotation(ty.strip_nullable()).optional();
        }
        match ty.kind {
            TypeKind::Primitive(kind) => primitive_annotation(kind),
            TypeKind::Void | TypeKind::Dynamic | TypeKind::Delegate | TypeKind::Tuple => {
                TypeNode::Any
            }
            TypeKind::TypeParameter => TypeNode::named(ty.name.clone()),
            TypeKind::Array => TypeNode::array(self.element_annotation(ty, 0)),
            TypeKind::Enum => {
                if self.ctx.local_type(&ty.full_name).is_some() {
                    TypeNode::named(ty.name.clone())
                } else {
                    TypeNode::named("number")
                }
            }
            TypeKind::Class | TypeKind::Struct | TypeKind::Interface | TypeKind::Nullable => {
                if is_set_type(ty) {
                    return TypeNode::map(self.element_annotation(ty, 0), TypeNode::named("boolean"));
                }
                match ty.collection_kind() {
                    CollectionKind::Sequence => TypeNode::array(self.element_annotation(ty, 0)),
                    CollectionKind::Map => TypeNode::map(
                        self.element_annotation(ty, 0),
                        self.element_annotation(ty, 1),
                    ),
                    CollectionKind::NotCollection => match self.ctx.local_type(&ty.full_name) {
                        Some(local) => TypeNode::generic(
                            local.to_string(),
                            ty.type_arguments
                                .iter()
                                .map(|arg| self.type_annotation(arg))
                                .collect(),
                        ),
                        None => self.interface_annotation(ty),
                    },
                }
            }
        }
    }

    /// Same-file interfaces are named by their alias; they have no local.
    fn interface_annotation(&self, ty: &TypeInfo) -> TypeNode {
        match self.metadata.get(&ty.full_name) {
            Some(meta)
                if meta.strategy == LayoutStrategy::Interface
                    && meta.file == self.unit.file_name =>
            {
                TypeNode::generic(
                    meta.name.clone(),
                    ty.type_arguments
                        .iter()
                        .map(|arg| self.type_annotation(arg))
                        .collect(),
                )
            }
            _ => TypeNode::Any,
        }
    }

    fn element_annotation(&self, ty: &TypeInfo, index: usize) -> TypeNode {
        ty.type_arguments
            .get(index)
            .map_or(TypeNode::Any, |arg| self.type_annotation(arg))
    }

    /// Annotation for a type named in source, when annotations are enabled.
    pub(crate) fn syntax_annotation(&self, syntax: Option<&TypeSyntax>) -> Option<TypeNode> {
        if !self.options.emit_type_annotations {
            return None;
        }
        let ty = self.type_of(syntax?.id)?;
        match ty.kind {
            TypeKind::Void => None,
            _ => Some(self.type_annotation(ty)),
        }
    }

    // =========================================================================
    // Default values
    // =========================================================================

    /// `default(T)`.
    pub(crate) fn default_value(&mut self, ty: &TypeInfo) -> Expr {
        if ty.kind == TypeKind::Nullable {
            return Expr::Nil;
        }
        match ty.kind {
            TypeKind::Primitive(kind) if kind.is_numeric() => Expr::int(0),
            TypeKind::Primitive(PrimitiveKind::Bool) => Expr::Boolean(false),
            TypeKind::Primitive(PrimitiveKind::Char) => Expr::string("\0"),
            TypeKind::Enum => Expr::int(0),
            TypeKind::Struct => {
                let strategy = self.metadata.get(&ty.full_name).map(|m| m.strategy);
                match strategy {
                    Some(LayoutStrategy::StructFactory) => {
                        let factory = self.type_reference(ty);
                        Expr::call(factory, Vec::new())
                    }
                    Some(_) => {
                        let class = self.type_reference(ty);
                        Expr::call(Expr::member(class, "new"), Vec::new())
                    }
                    None => self
                        .runtime
                        .call(DEFAULT_VALUE, vec![Expr::string(ty.full_name.clone())]),
                }
            }
            _ => Expr::Nil,
        }
    }
}

fn primitive_annotation(kind: PrimitiveKind) -> TypeNode {
    match kind {
        PrimitiveKind::Bool => TypeNode::named("boolean"),
        PrimitiveKind::String | PrimitiveKind::Char => TypeNode::named("string"),
        PrimitiveKind::Object => TypeNode::Any,
        _ => TypeNode::named("number"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use luma_source::{CompilationUnit, TableOracle};
    use luma_target::{print_expr, print_type};

    #[test]
    fn test_collection_annotations() {
        let unit = CompilationUnit::new("Main.cs");
        let oracle = TableOracle::new();
        let metadata = MetadataTable::new();
        let options = LoweringOptions::default();
        let lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);

        let list = TypeInfo::list(TypeInfo::int());
        let dict = TypeInfo::dictionary(TypeInfo::string(), TypeInfo::bool());
        let set = TypeInfo::generic("HashSet", "System.Collections.Generic", vec![TypeInfo::string()]);
        assert_eq!(print_type(&lowerer.type_annotation(&list)), "{number}");
        assert_eq!(print_type(&lowerer.type_annotation(&dict)), "{[string]: boolean}");
        assert_eq!(print_type(&lowerer.type_annotation(&set)), "{[string]: boolean}");
        assert_eq!(
            print_type(&lowerer.type_annotation(&TypeInfo::class("Widget", "Ui.Widget"))),
            "any"
        );
    }

    #[test]
    fn test_external_type_reference_uses_assembly_lookup() {
        let unit = CompilationUnit::new("Main.cs");
        let oracle = TableOracle::new();
        let metadata = MetadataTable::new();
        let options = LoweringOptions::default();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        let reference = lowerer.type_reference(&TypeInfo::class("Random", "System.Random"));
        assert_eq!(print_expr(&reference), "CS.getAssemblyType(\"System.Random\")");
        assert_eq!(print_expr(&lowerer.default_value(&TypeInfo::int())), "0");
        assert_eq!(print_expr(&lowerer.default_value(&TypeInfo::bool())), "false");
    }
}
