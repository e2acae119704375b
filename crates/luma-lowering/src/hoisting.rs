//! Dependency order of a file's type declarations.
//!
//! A type must be lowered after the same-file types its load-time code
//! touches: its base class, and whatever its static initializers, static
//! constructor and attribute arguments reference. Method bodies run later
//! and only need the predeclared local, so they add no edges.
//!
//! The sort is Kahn's algorithm always taking the earliest ready
//! declaration, so unrelated types keep their source order. A cycle leaves
//! the remaining declarations in source order.

use crate::metadata::MetadataTable;
use luma_source::visit::{Visitor, walk_body, walk_expr};
use luma_source::{Body, CompilationUnit, Expr, ExprKind, MemberKind, SymbolKind, TypeDecl, TypeOracle};
use rustc_hash::{FxHashMap, FxHashSet};

/// Indices into `unit.declarations` in lowering order.
pub fn declaration_order(
    unit: &CompilationUnit,
    metadata: &MetadataTable,
    oracle: &dyn TypeOracle,
) -> Vec<usize> {
    let count = unit.declarations.len();
    let index: FxHashMap<String, usize> = unit
        .declarations
        .iter()
        .enumerate()
        .map(|(i, decl)| (unit.qualified_name(decl), i))
        .collect();

    let dependencies: Vec<FxHashSet<usize>> = unit
        .declarations
        .iter()
        .enumerate()
        .map(|(i, decl)| {
            let mut names = load_time_references(decl, oracle);
            if let Some(base) = metadata
                .get(&unit.qualified_name(decl))
                .and_then(|meta| meta.base.clone())
            {
                names.insert(base);
            }
            names
                .iter()
                .filter_map(|name| index.get(name).copied())
                .filter(|&j| j != i)
                .collect()
        })
        .collect();

    let mut placed = vec![false; count];
    let mut order = Vec::with_capacity(count);
    while order.len() < count {
        let ready = (0..count)
            .find(|&i| !placed[i] && dependencies[i].iter().all(|&d| placed[d]));
        match ready {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                tracing::debug!(
                    file = %unit.file_name,
                    remaining = count - order.len(),
                    "[lowering] declaration cycle, keeping source order"
                );
                order.extend((0..count).filter(|&i| !placed[i]));
            }
        }
    }
    order
}

/// Full names of the types `decl` touches while its file loads.
fn load_time_references(decl: &TypeDecl, oracle: &dyn TypeOracle) -> FxHashSet<String> {
    let mut collector = References {
        oracle,
        names: FxHashSet::default(),
    };
    for attribute in &decl.attributes {
        for argument in &attribute.arguments {
            collector.visit_expr(argument);
        }
    }
    for member in decl.members.iter().filter(|m| m.is_static()) {
        match &member.kind {
            MemberKind::Field {
                initializer: Some(init),
                ..
            }
            | MemberKind::Property {
                initializer: Some(init),
                ..
            }
            | MemberKind::Event {
                initializer: Some(init),
                ..
            } => collector.visit_expr(init),
            _ => {}
        }
    }
    if let Some(body) = decl.static_constructor().and_then(|c| c.body.as_ref()) {
        walk_body(&mut collector, body);
    }
    collector.names
}

struct References<'o> {
    oracle: &'o dyn TypeOracle,
    names: FxHashSet<String>,
}

impl Visitor for References<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        let kind = self.oracle.kind_of(expr.id);
        if (kind == SymbolKind::Type || matches!(expr.kind, ExprKind::ObjectCreation { .. }))
            && let Some(ty) = self.oracle.type_of(expr.id)
        {
            self.names.insert(ty.strip_nullable().full_name.clone());
        }
        if let Some(symbol) = self.oracle.symbol_of(expr.id)
            && (symbol.is_static || kind == SymbolKind::Constructor)
            && let Some(owner) = &symbol.containing_type
        {
            self.names.insert(owner.clone());
        }
        walk_expr(self, expr);
    }

    // Lambda bodies run after load.
    fn visit_nested_body(&mut self, _body: &Body) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use luma_source::{Modifiers, SyntaxFactory, TypeInfo};

    fn names(unit: &CompilationUnit, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&i| unit.declarations[i].name.clone())
            .collect()
    }

    #[test]
    fn test_base_and_static_initializer_come_first() {
        let mut f = SyntaxFactory::new();
        let mut registry = f.class("Registry");
        let default = f.new_object(&TypeInfo::class("Entry", "Entry"), vec![], None);
        registry.members = vec![f.field(
            "Default",
            &TypeInfo::class("Entry", "Entry"),
            Some(default),
            Modifiers::public_static(),
        )];
        let mut special = f.class("SpecialEntry");
        special.base_types = vec![f.type_ref(&TypeInfo::class("Entry", "Entry"))];
        let entry = f.class("Entry");

        let mut unit = CompilationUnit::new("Main.cs");
        unit.declarations = vec![registry, special, entry];
        let metadata = MetadataTable::collect(std::slice::from_ref(&unit), f.oracle());
        let order = declaration_order(&unit, &metadata, f.oracle());
        assert_eq!(names(&unit, &order), ["Entry", "Registry", "SpecialEntry"]);
    }

    #[test]
    fn test_cycle_keeps_source_order() {
        let mut f = SyntaxFactory::new();
        let mut a = f.class("A");
        let b_value = f.new_object(&TypeInfo::class("B", "B"), vec![], None);
        a.members = vec![f.field("Other", &TypeInfo::class("B", "B"), Some(b_value), Modifiers::public_static())];
        let mut b = f.class("B");
        let a_value = f.new_object(&TypeInfo::class("A", "A"), vec![], None);
        b.members = vec![f.field("Other", &TypeInfo::class("A", "A"), Some(a_value), Modifiers::public_static())];
        let plain = f.class("C");

        let mut unit = CompilationUnit::new("Main.cs");
        unit.declarations = vec![a, b, plain];
        let metadata = MetadataTable::collect(std::slice::from_ref(&unit), f.oracle());
        let order = declaration_order(&unit, &metadata, f.oracle());
        assert_eq!(names(&unit, &order), ["C", "A", "B"]);
    }
}
