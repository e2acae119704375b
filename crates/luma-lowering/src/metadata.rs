//! Program-wide type metadata.
//!
//! Phase one of lowering walks every compilation unit once and records the
//! facts later phases need to look up by name or declaration id:
//! - the layout strategy of each type (class, struct factory, interface, enum)
//! - emitted names of methods and constructors, with overloads disambiguated
//! - async and generator method sets
//! - enum member values
//!
//! The table is immutable afterwards and shared by every file lowered in
//! parallel.

use indexmap::IndexMap;
use luma_source::{
    Body, CompilationUnit, GeneratorShape, Member, MemberKind, NodeId, Parameter, RefKind, TypeDecl,
    TypeDeclKind, TypeKind, TypeOracle, visit,
};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutStrategy {
    /// Metatable prototype with `constructor` and `new`.
    Class,
    /// Plain function returning a table literal.
    StructFactory,
    /// Type alias only; no runtime code.
    Interface,
    /// Frozen table of constants.
    Enum,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub ref_kind: RefKind,
    pub is_params: bool,
    pub has_default: bool,
}

impl ParameterInfo {
    fn from_parameter(param: &Parameter) -> Self {
        Self {
            name: param.name.clone(),
            ref_kind: param.ref_kind,
            is_params: param.is_params,
            has_default: param.default_value.is_some(),
        }
    }
}

/// A method or constructor declared in source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallableInfo {
    /// Name the member is installed under (`Add`, `Add__2`, `new__1`).
    pub emitted_name: String,
    pub parameters: Vec<ParameterInfo>,
    pub is_static: bool,
    pub is_override: bool,
    pub is_constructor: bool,
    /// Parameter types joined by `,`; used to match overrides to base members.
    signature: String,
}

impl CallableInfo {
    /// Constructor local name matching a `new` factory name.
    pub fn constructor_name(&self) -> String {
        self.emitted_name.replacen("new", "constructor", 1)
    }
}

#[derive(Clone, Debug)]
pub struct TypeMetadata {
    pub name: String,
    pub full_name: String,
    /// File the type is declared in.
    pub file: String,
    pub kind: TypeDeclKind,
    pub strategy: LayoutStrategy,
    /// Full name of the base class.
    pub base: Option<String>,
    /// Full names of implemented interfaces (or extended, for interfaces).
    pub interfaces: Vec<String>,
    pub type_parameters: Vec<String>,
    /// Methods and constructors keyed by declaration id, in source order.
    pub callables: IndexMap<NodeId, CallableInfo>,
    pub async_methods: FxHashSet<NodeId>,
    pub generator_methods: FxHashMap<NodeId, GeneratorShape>,
    /// Properties lowered to `get_X`/`set_X`.
    pub computed_properties: FxHashSet<String>,
    /// Enum members and their values; `None` when the value is not constant.
    pub enum_values: IndexMap<String, Option<i64>>,
    /// Struct factory parameters after the constructor parameters.
    pub factory_fields: Vec<String>,
    /// Number of declared instance constructors.
    pub constructor_count: usize,
    /// Member declarations of an interface, so aliases of interfaces that
    /// extend it can list them from any file.
    pub interface_members: Vec<Member>,
}

impl TypeMetadata {
    pub fn callable(&self, decl: NodeId) -> Option<&CallableInfo> {
        self.callables.get(&decl)
    }

    /// Emitted name of a method, by declaration id, else the source name.
    pub fn method_name(&self, decl: Option<NodeId>, fallback: &str) -> String {
        decl.and_then(|d| self.callables.get(&d))
            .map_or_else(|| fallback.to_string(), |c| c.emitted_name.clone())
    }

    pub fn is_struct_factory(&self) -> bool {
        self.strategy == LayoutStrategy::StructFactory
    }
}

/// Read-only metadata for every type of the program.
#[derive(Debug, Default)]
pub struct MetadataTable {
    types: IndexMap<String, TypeMetadata>,
    /// Declaration id of a method/constructor to its owning type.
    owners: FxHashMap<NodeId, String>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, full_name: &str) -> Option<&TypeMetadata> {
        self.types.get(full_name)
    }

    pub fn owner_of(&self, decl: NodeId) -> Option<&TypeMetadata> {
        self.owners.get(&decl).and_then(|name| self.types.get(name))
    }

    /// Callable declared at `decl`, in any type.
    pub fn callable(&self, decl: NodeId) -> Option<&CallableInfo> {
        self.owner_of(decl).and_then(|meta| meta.callable(decl))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeMetadata> {
        self.types.values()
    }

    /// Whether `derived` has `base` somewhere in its base-class chain.
    pub fn inherits_from(&self, derived: &str, base: &str) -> bool {
        let mut current = self.get(derived).and_then(|m| m.base.clone());
        let mut guard = 0usize;
        while let Some(name) = current {
            if name == base {
                return true;
            }
            guard += 1;
            if guard > self.types.len() {
                return false;
            }
            current = self.get(&name).and_then(|m| m.base.clone());
        }
        false
    }

    /// Collect metadata for every declaration of every unit.
    pub fn collect(units: &[CompilationUnit], oracle: &dyn TypeOracle) -> Self {
        let _span = tracing::debug_span!("collect_metadata", units = units.len()).entered();

        // Simple name to kind, for base types the oracle did not resolve.
        let mut kinds_by_name: FxHashMap<&str, TypeDeclKind> = FxHashMap::default();
        for unit in units {
            for decl in &unit.declarations {
                kinds_by_name.insert(decl.name.as_str(), decl.kind);
            }
        }

        let mut table = MetadataTable::new();
        for unit in units {
            for decl in &unit.declarations {
                let meta = collect_type(unit, decl, oracle, &kinds_by_name);
                for id in meta.callables.keys() {
                    table.owners.insert(*id, meta.full_name.clone());
                }
                table.types.insert(meta.full_name.clone(), meta);
            }
        }
        table.resolve_inherited_names();
        tracing::debug!(types = table.types.len(), "[lowering] metadata collected");
        table
    }

    fn depth_of(&self, full_name: &str) -> usize {
        let mut depth = 0;
        let mut current = self.get(full_name).and_then(|m| m.base.as_deref());
        while let Some(name) = current {
            depth += 1;
            if depth > self.types.len() {
                break;
            }
            current = self.get(name).and_then(|m| m.base.as_deref());
        }
        depth
    }

    /// Walks types base-first. Overrides take the overridden member's
    /// emitted name; other methods sharing a name with an inherited method
    /// continue the base chain's overload counter so they never shadow it
    /// through `__index`.
    fn resolve_inherited_names(&mut self) {
        let mut order: Vec<(usize, String)> = self
            .types
            .keys()
            .map(|name| (self.depth_of(name), name.clone()))
            .collect();
        order.sort_by_key(|(depth, _)| *depth);

        for (_, type_name) in order {
            let Some(meta) = self.types.get(&type_name) else {
                continue;
            };
            let mut renames = Vec::new();
            let mut counters: FxHashMap<&str, usize> = FxHashMap::default();
            for (id, callable) in &meta.callables {
                if callable.is_constructor {
                    continue;
                }
                let source_name = source_name_of(&callable.emitted_name);
                if callable.is_override {
                    if let Some(name) = self.find_base_callable(
                        meta.base.as_deref(),
                        source_name,
                        &callable.signature,
                    ) {
                        renames.push((*id, name));
                    }
                    continue;
                }
                if !counters.contains_key(source_name) {
                    let inherited = self.inherited_slots(meta.base.as_deref(), source_name);
                    if inherited == 0 {
                        continue;
                    }
                    counters.insert(source_name, inherited);
                }
                let counter = counters.entry(source_name).or_default();
                *counter += 1;
                renames.push((*id, format!("{source_name}__{counter}")));
            }
            if renames.is_empty() {
                continue;
            }
            tracing::trace!(r#type = %type_name, renamed = renames.len(), "[lowering] inherited names resolved");
            if let Some(meta) = self.types.get_mut(&type_name) {
                for (id, name) in renames {
                    if let Some(callable) = meta.callables.get_mut(&id) {
                        callable.emitted_name = name;
                    }
                }
            }
        }
    }

    /// Methods named `name` introduced (not overridden) along the base chain.
    fn inherited_slots(&self, base: Option<&str>, name: &str) -> usize {
        let mut slots = 0;
        let mut current = base;
        let mut guard = 0usize;
        while let Some(type_name) = current {
            let Some(meta) = self.get(type_name) else {
                break;
            };
            slots += meta
                .callables
                .values()
                .filter(|c| {
                    !c.is_constructor && !c.is_override && source_name_of(&c.emitted_name) == name
                })
                .count();
            guard += 1;
            if guard > self.types.len() {
                break;
            }
            current = meta.base.as_deref();
        }
        slots
    }

    fn find_base_callable(&self, base: Option<&str>, name: &str, signature: &str) -> Option<String> {
        let mut current = base;
        let mut guard = 0usize;
        while let Some(type_name) = current {
            let meta = self.get(type_name)?;
            let found = meta.callables.values().find(|c| {
                c.signature == signature && source_name_of(&c.emitted_name) == name
            });
            if let Some(found) = found {
                return Some(found.emitted_name.clone());
            }
            guard += 1;
            if guard > self.types.len() {
                return None;
            }
            current = meta.base.as_deref();
        }
        None
    }
}

/// `Add__2` -> `Add`
fn source_name_of(emitted: &str) -> &str {
    emitted.split("__").next().unwrap_or(emitted)
}

fn parameter_signature(params: &[Parameter], oracle: &dyn TypeOracle) -> String {
    params
        .iter()
        .map(|p| {
            let ty = p.ty.as_ref().map_or_else(String::new, |syntax| {
                oracle
                    .type_of(syntax.id)
                    .map_or_else(|| syntax.name.clone(), |t| t.full_name.clone())
            });
            match p.ref_kind {
                RefKind::None => ty,
                RefKind::Ref => format!("ref {ty}"),
                RefKind::Out => format!("out {ty}"),
                RefKind::In => format!("in {ty}"),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn collect_type(
    unit: &CompilationUnit,
    decl: &TypeDecl,
    oracle: &dyn TypeOracle,
    kinds_by_name: &FxHashMap<&str, TypeDeclKind>,
) -> TypeMetadata {
    let full_name = unit.qualified_name(decl);
    let (base, interfaces) = split_base_types(decl, oracle, kinds_by_name);
    let strategy = layout_strategy(decl);

    let mut meta = TypeMetadata {
        name: decl.name.clone(),
        full_name,
        file: unit.file_name.clone(),
        kind: decl.kind,
        strategy,
        base,
        interfaces,
        type_parameters: decl.type_parameters.clone(),
        callables: IndexMap::new(),
        async_methods: FxHashSet::default(),
        generator_methods: FxHashMap::default(),
        computed_properties: FxHashSet::default(),
        enum_values: IndexMap::new(),
        factory_fields: Vec::new(),
        constructor_count: decl.constructors().count(),
        interface_members: if decl.kind == TypeDeclKind::Interface {
            decl.members.clone()
        } else {
            Vec::new()
        },
    };

    collect_callables(decl, oracle, &mut meta);

    for member in &decl.members {
        match &member.kind {
            MemberKind::Property { .. } if !member.kind.is_auto_property() => {
                meta.computed_properties.insert(member.name.clone());
            }
            MemberKind::Field { .. } | MemberKind::Property { .. }
                if strategy == LayoutStrategy::StructFactory && !member.is_static() =>
            {
                meta.factory_fields.push(member.name.clone());
            }
            MemberKind::Method(method) => {
                if member.modifiers.is_async {
                    meta.async_methods.insert(member.id);
                }
                if let Some(body) = &method.body
                    && visit::body_contains_yield(body)
                {
                    let shape = method
                        .return_type
                        .as_ref()
                        .and_then(|t| oracle.type_of(t.id))
                        .and_then(|t| t.generator_shape())
                        .unwrap_or(GeneratorShape::Enumerable);
                    meta.generator_methods.insert(member.id, shape);
                }
            }
            _ => {}
        }
    }

    if decl.kind == TypeDeclKind::Enum {
        let mut next = Some(0i64);
        for member in &decl.enum_members {
            let value = match &member.value {
                Some(expr) => oracle.constant_fold(expr).and_then(|c| c.as_i64()),
                None => next,
            };
            meta.enum_values.insert(member.name.clone(), value);
            next = value.and_then(|v| v.checked_add(1));
        }
    }

    meta
}

fn split_base_types(
    decl: &TypeDecl,
    oracle: &dyn TypeOracle,
    kinds_by_name: &FxHashMap<&str, TypeDeclKind>,
) -> (Option<String>, Vec<String>) {
    let mut base = None;
    let mut interfaces = Vec::new();
    for syntax in &decl.base_types {
        let (full_name, is_interface) = match oracle.type_of(syntax.id) {
            Some(ty) => (ty.full_name.clone(), ty.kind == TypeKind::Interface),
            None => (
                syntax.name.clone(),
                kinds_by_name.get(syntax.name.as_str()) == Some(&TypeDeclKind::Interface),
            ),
        };
        if is_interface || decl.kind == TypeDeclKind::Interface || base.is_some() {
            interfaces.push(full_name);
        } else {
            base = Some(full_name);
        }
    }
    (base, interfaces)
}

fn collect_callables(decl: &TypeDecl, oracle: &dyn TypeOracle, meta: &mut TypeMetadata) {
    // Group sizes decide whether a name needs a counter suffix.
    let mut group_sizes: FxHashMap<&str, usize> = FxHashMap::default();
    // Overrides are named after the member they override.
    for member in &decl.members {
        if let MemberKind::Method(_) = member.kind
            && !member.modifiers.is_override
        {
            *group_sizes.entry(member.name.as_str()).or_default() += 1;
        }
    }
    let overloaded_ctors = meta.constructor_count > 1;

    let mut counters: FxHashMap<&str, usize> = FxHashMap::default();
    let mut ctor_counter = 0usize;
    for member in &decl.members {
        match &member.kind {
            MemberKind::Method(method) => {
                let emitted_name = if !member.modifiers.is_override
                    && group_sizes
                        .get(member.name.as_str())
                        .is_some_and(|&n| n > 1)
                {
                    let counter = counters.entry(member.name.as_str()).or_default();
                    *counter += 1;
                    format!("{}__{}", member.name, counter)
                } else {
                    member.name.clone()
                };
                meta.callables.insert(
                    member.id,
                    CallableInfo {
                        emitted_name,
                        parameters: method
                            .parameters
                            .iter()
                            .map(ParameterInfo::from_parameter)
                            .collect(),
                        is_static: member.is_static(),
                        is_override: member.modifiers.is_override,
                        is_constructor: false,
                        signature: parameter_signature(&method.parameters, oracle),
                    },
                );
            }
            MemberKind::Constructor(ctor) if !member.modifiers.is_static => {
                let emitted_name = if overloaded_ctors {
                    ctor_counter += 1;
                    format!("new__{ctor_counter}")
                } else {
                    "new".to_string()
                };
                meta.callables.insert(
                    member.id,
                    CallableInfo {
                        emitted_name,
                        parameters: ctor
                            .parameters
                            .iter()
                            .map(ParameterInfo::from_parameter)
                            .collect(),
                        is_static: false,
                        is_override: false,
                        is_constructor: true,
                        signature: parameter_signature(&ctor.parameters, oracle),
                    },
                );
            }
            _ => {}
        }
    }
}

/// Why a struct cannot use the factory layout, if it cannot.
pub fn struct_fallback_reason(decl: &TypeDecl) -> Option<&'static str> {
    if decl.constructors().count() > 1 {
        return Some("overloaded constructors");
    }
    for member in &decl.members {
        if member.is_static() {
            return Some("static member");
        }
        match &member.kind {
            MemberKind::Method(_) => return Some("instance method"),
            MemberKind::Event { .. } => return Some("instance event"),
            MemberKind::Property { .. } if !member.kind.is_auto_property() => {
                return Some("computed property");
            }
            MemberKind::Constructor(ctor)
                if ctor.initializer.is_some()
                    || matches!(ctor.body, Some(Body::Expression(_))) =>
            {
                return Some("chained constructor");
            }
            _ => {}
        }
    }
    None
}

fn layout_strategy(decl: &TypeDecl) -> LayoutStrategy {
    match decl.kind {
        TypeDeclKind::Class => LayoutStrategy::Class,
        TypeDeclKind::Interface => LayoutStrategy::Interface,
        TypeDeclKind::Enum => LayoutStrategy::Enum,
        TypeDeclKind::Struct => match struct_fallback_reason(decl) {
            Some(reason) => {
                tracing::debug!(
                    r#type = %decl.name,
                    reason,
                    "[lowering] struct falls back to class layout"
                );
                LayoutStrategy::Class
            }
            None => LayoutStrategy::StructFactory,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luma_source::{Modifiers, SyntaxFactory, TypeInfo};

    fn unit_with(decls: Vec<TypeDecl>) -> CompilationUnit {
        let mut unit = CompilationUnit::new("Main.cs");
        unit.declarations = decls;
        unit
    }

    #[test]
    fn test_overloads_get_counter_names_in_source_order() {
        let mut f = SyntaxFactory::new();
        let mut class = f.class("Calc");
        let p1 = f.param("a", &TypeInfo::int());
        let p2 = f.param("a", &TypeInfo::string());
        let add_int = f.method_decl("Add", Modifiers::public(), vec![p1], None, vec![]);
        let add_str = f.method_decl("Add", Modifiers::public(), vec![p2], None, vec![]);
        let single = f.method_decl("Reset", Modifiers::public(), vec![], None, vec![]);
        let ids = (add_int.id, add_str.id, single.id);
        class.members = vec![add_int, add_str, single];
        let units = vec![unit_with(vec![class])];
        let table = MetadataTable::collect(&units, f.oracle());

        let meta = table.get("Calc").expect("collected");
        assert_eq!(meta.callable(ids.0).map(|c| c.emitted_name.as_str()), Some("Add__1"));
        assert_eq!(meta.callable(ids.1).map(|c| c.emitted_name.as_str()), Some("Add__2"));
        assert_eq!(meta.callable(ids.2).map(|c| c.emitted_name.as_str()), Some("Reset"));
    }

    #[test]
    fn test_override_reuses_base_overload_name() {
        let mut f = SyntaxFactory::new();
        let mut base = f.class("Shape");
        let a = f.param("scale", &TypeInfo::int());
        let b = f.param("scale", &TypeInfo::double());
        base.members = vec![
            f.method_decl("Draw", Modifiers::public(), vec![a], None, vec![]),
            f.method_decl("Draw", Modifiers::public(), vec![b], None, vec![]),
        ];
        let mut derived = f.class("Circle");
        derived.base_types = vec![f.type_ref(&TypeInfo::class("Shape", "Shape"))];
        let c = f.param("scale", &TypeInfo::double());
        let mut over = f.method_decl("Draw", Modifiers::public(), vec![c], None, vec![]);
        over.modifiers.is_override = true;
        let over_id = over.id;
        derived.members = vec![over];

        let units = vec![unit_with(vec![base, derived])];
        let table = MetadataTable::collect(&units, f.oracle());
        assert_eq!(
            table.callable(over_id).map(|c| c.emitted_name.as_str()),
            Some("Draw__2")
        );
        assert!(table.inherits_from("Circle", "Shape"));
    }

    #[test]
    fn test_inherited_overloads_seed_the_counter_across_files() {
        let mut f = SyntaxFactory::new();
        let mut base = f.class("Writer");
        let a = f.param("value", &TypeInfo::int());
        let b = f.param("value", &TypeInfo::double());
        base.members = vec![
            f.method_decl("Write", Modifiers::public(), vec![a], None, vec![]),
            f.method_decl("Write", Modifiers::public(), vec![b], None, vec![]),
        ];
        let mut derived = f.class("LineWriter");
        derived.base_types = vec![f.type_ref(&TypeInfo::class("Writer", "Writer"))];
        let c = f.param("value", &TypeInfo::string());
        let d = f.param("value", &TypeInfo::double());
        let fresh = f.method_decl("Write", Modifiers::public(), vec![c], None, vec![]);
        let mut over = f.method_decl("Write", Modifiers::public(), vec![d], None, vec![]);
        over.modifiers.is_override = true;
        let ids = (fresh.id, over.id);
        derived.members = vec![fresh, over];

        // Derived first, in its own file.
        let mut other = CompilationUnit::new("LineWriter.cs");
        other.declarations = vec![derived];
        let units = vec![other, unit_with(vec![base])];
        let table = MetadataTable::collect(&units, f.oracle());
        assert_eq!(table.callable(ids.0).map(|c| c.emitted_name.as_str()), Some("Write__3"));
        assert_eq!(table.callable(ids.1).map(|c| c.emitted_name.as_str()), Some("Write__2"));
    }

    #[test]
    fn test_struct_with_method_falls_back_to_class() {
        let mut f = SyntaxFactory::new();
        let mut plain = f.type_decl(TypeDeclKind::Struct, "Point");
        plain.members = vec![
            f.auto_property("X", &TypeInfo::int(), Modifiers::public()),
            f.auto_property("Y", &TypeInfo::int(), Modifiers::public()),
        ];
        let mut rich = f.type_decl(TypeDeclKind::Struct, "Vec2");
        rich.members = vec![f.method_decl("Length", Modifiers::public(), vec![], None, vec![])];

        let units = vec![unit_with(vec![plain, rich])];
        let table = MetadataTable::collect(&units, f.oracle());
        let point = table.get("Point").expect("collected");
        assert_eq!(point.strategy, LayoutStrategy::StructFactory);
        assert_eq!(point.factory_fields, ["X", "Y"]);
        assert_eq!(
            table.get("Vec2").map(|m| m.strategy),
            Some(LayoutStrategy::Class)
        );
    }

    #[test]
    fn test_overloaded_constructors_are_numbered() {
        let mut f = SyntaxFactory::new();
        let mut class = f.class("Money");
        let amount = f.param("amount", &TypeInfo::int());
        let first = f.constructor(vec![], None, vec![]);
        let second = f.constructor(vec![amount], None, vec![]);
        let ids = (first.id, second.id);
        class.members = vec![first, second];
        let units = vec![unit_with(vec![class])];
        let table = MetadataTable::collect(&units, f.oracle());
        let second = table.callable(ids.1).expect("constructor");
        assert_eq!(table.callable(ids.0).map(|c| c.emitted_name.as_str()), Some("new__1"));
        assert_eq!(second.emitted_name, "new__2");
        assert_eq!(second.constructor_name(), "constructor__2");
    }
}
