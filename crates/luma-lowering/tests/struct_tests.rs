//! Struct factories and their call sites.

use luma_common::{Diagnostic, Span};
use luma_lowering::{LoweringOptions, MetadataTable, lower_unit};
use luma_source::{
    CompilationUnit, ExprKind, Initializer, InitializerValue, MemberInitializer, Modifiers,
    RefKind, Resolution, Stmt, SymbolInfo, SymbolKind, SyntaxFactory, TypeDecl, TypeDeclKind,
    TypeInfo, TypeKind,
};
use luma_target::print_chunk;
use pretty_assertions::assert_eq;

fn lower(f: SyntaxFactory, decls: Vec<TypeDecl>, statements: Vec<Stmt>) -> String {
    let mut unit = CompilationUnit::new("Main.cs");
    unit.declarations = decls;
    unit.statements = statements;
    let options = LoweringOptions {
        emit_type_annotations: false,
        emit_reflection_metadata: false,
        ..LoweringOptions::default()
    };
    let oracle = f.into_oracle();
    let metadata = MetadataTable::collect(std::slice::from_ref(&unit), &oracle);
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    match lower_unit(&unit, &oracle, &metadata, &options, &mut diagnostics) {
        Ok(chunk) => print_chunk(&chunk),
        Err(failure) => panic!("{failure}: {diagnostics:?}"),
    }
}

fn point(f: &mut SyntaxFactory) -> TypeDecl {
    let mut point = f.type_decl(TypeDeclKind::Struct, "Point");
    point.members = vec![
        f.auto_property("X", &TypeInfo::int(), Modifiers::public()),
        f.auto_property("Y", &TypeInfo::int(), Modifiers::public()),
    ];
    point
}

fn point_type() -> TypeInfo {
    TypeInfo::new("Point", "Point", TypeKind::Struct)
}

#[test]
fn test_object_initializer_fills_factory_slots() {
    let mut f = SyntaxFactory::new();
    let decl = point(&mut f);
    let two = f.int(2);
    let initializer = Initializer::Object(vec![MemberInitializer {
        id: f.next_id(),
        span: Span::DUMMY,
        name: "Y".into(),
        value: InitializerValue::Expr(two),
    }]);
    let created = f.new_object(&point_type(), Vec::new(), Some(initializer));
    let local = f.declare("p", point_type(), Some(created));
    let printed = lower(f, vec![decl], vec![local]);
    assert_eq!(
        printed,
        "local function Point(X, Y)\n    return {X = X or 0, Y = Y or 0}\nend\nlocal p = Point(nil, 2)\n"
    );
}

#[test]
fn test_uninitialized_struct_local_holds_default_instance() {
    let mut f = SyntaxFactory::new();
    let decl = point(&mut f);
    let local = f.declare("origin", point_type(), None);
    let printed = lower(f, vec![decl], vec![local]);
    assert!(printed.ends_with("local origin = Point()\n"), "{printed}");
}

#[test]
fn test_struct_with_method_uses_class_layout() {
    let mut f = SyntaxFactory::new();
    let vector_ty = TypeInfo::new("Vector", "Vector", TypeKind::Struct);
    let mut vector = f.type_decl(TypeDeclKind::Struct, "Vector");
    let zero = f.float(0.0);
    let length = f.ret(Some(zero));
    vector.members = vec![
        f.field("X", &TypeInfo::double(), None, Modifiers::public()),
        f.method_decl("Length", Modifiers::public(), vec![], Some(&TypeInfo::double()), vec![length]),
    ];
    let created = f.new_object(&vector_ty, Vec::new(), None);
    let local = f.declare("v", vector_ty, Some(created));
    let printed = lower(f, vec![vector], vec![local]);
    assert!(printed.contains("    Vector = setmetatable({}, "), "{printed}");
    assert!(printed.contains("    function Vector:Length()\n        return 0\n    end\n"), "{printed}");
    assert!(printed.ends_with("local v = Vector.new()\n"), "{printed}");
}

#[test]
fn test_struct_indexer_stays_in_factory_layout() {
    let mut f = SyntaxFactory::new();
    let cell_ty = TypeInfo::new("Cell", "Cell", TypeKind::Struct);
    let mut cell = f.type_decl(TypeDeclKind::Struct, "Cell");

    let slot = f.param("slot", &TypeInfo::int());
    let read = f.instance_member(None, SymbolKind::Field, "Value", &cell_ty, TypeInfo::int());
    let getter = f.ret(Some(read));
    let target = f.instance_member(None, SymbolKind::Field, "Value", &cell_ty, TypeInfo::int());
    let value = f.param_ref("value", TypeInfo::int(), RefKind::None);
    let write = f.assign(target, value);
    let setter = f.expr_stmt(write);
    cell.members = vec![
        f.field("Value", &TypeInfo::int(), None, Modifiers::public()),
        f.indexer(&TypeInfo::int(), vec![slot], Some(vec![getter]), Some(vec![setter])),
    ];

    let local = f.declare("c", cell_ty.clone(), None);
    let receiver = f.local("c", cell_ty);
    let zero = f.int(0);
    let element = f.resolved(
        ExprKind::Element {
            object: Box::new(receiver),
            indices: vec![zero],
        },
        Resolution::symbol(SymbolKind::Indexer, SymbolInfo::new("Item"), Some(TypeInfo::int())),
    );
    let read = f.declare("v", TypeInfo::int(), Some(element));

    let printed = lower(f, vec![cell], vec![local, read]);
    assert!(printed.starts_with("local function Cell(Value)
"), "{printed}");
    assert!(!printed.contains("setmetatable"), "{printed}");
    assert!(printed.contains("get_Item = function(self, slot)\n"), "{printed}");
    assert!(printed.contains("set_Item = function(self, slot, value)\n"), "{printed}");
    assert!(printed.contains("self.Value = value"), "{printed}");
    assert!(printed.ends_with("local c = Cell()\nlocal v = c:get_Item(0)\n"), "{printed}");
}
