//! File driver: error recovery, predeclaration and multi-file programs.

use luma_common::Diagnostic;
use luma_lowering::{FileFailure, LoweringOptions, MetadataTable, lower_program, lower_unit};
use luma_source::{
    CompilationUnit, MemberKind, Modifiers, RefKind, Stmt, StmtKind, SymbolInfo, SyntaxFactory,
    TypeDecl, TypeDeclKind, TypeInfo, TypeKind,
};
use luma_target::print_chunk;

fn plain() -> LoweringOptions {
    LoweringOptions {
        emit_type_annotations: false,
        emit_reflection_metadata: false,
        ..LoweringOptions::default()
    }
}

/// A class whose only method calls `items.Where(0)`.
fn helper_user(f: &mut SyntaxFactory, name: &str) -> TypeDecl {
    let list = TypeInfo::list(TypeInfo::int());
    let mut class = f.class(name);
    let items = f.param("items", &list);
    let receiver = f.param_ref("items", list, RefKind::None);
    let mut symbol = SymbolInfo::new("Where").in_type("System.Linq.Enumerable");
    symbol.is_extension = true;
    let callee = f.method(Some(receiver), "Where", symbol);
    let zero = f.int(0);
    let call = f.call(callee, vec![zero], TypeInfo::enumerable(TypeInfo::int()));
    let body = f.expr_stmt(call);
    class.members = vec![f.method_decl("Run", Modifiers::public(), vec![items], None, vec![body])];
    class
}

fn lower(
    f: SyntaxFactory,
    decls: Vec<TypeDecl>,
    statements: Vec<Stmt>,
) -> (Result<String, FileFailure>, Vec<Diagnostic>) {
    let mut unit = CompilationUnit::new("Main.cs");
    unit.declarations = decls;
    unit.statements = statements;
    let oracle = f.into_oracle();
    let metadata = MetadataTable::collect(std::slice::from_ref(&unit), &oracle);
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let result = lower_unit(&unit, &oracle, &metadata, &plain(), &mut diagnostics);
    (result.map(|chunk| print_chunk(&chunk)), diagnostics)
}

#[test]
fn test_disabled_feature_skips_declaration_and_continues() {
    let mut f = SyntaxFactory::new();
    let first = helper_user(&mut f, "First");
    let second = helper_user(&mut f, "Second");
    let (result, diagnostics) = lower(f, vec![first, second], Vec::new());

    assert_eq!(
        result,
        Err(FileFailure {
            file: "Main.cs".into(),
            diagnostics: 2,
        })
    );
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.code == 9003), "{diagnostics:?}");
    assert!(diagnostics[0].message_text.contains("iteratorHelpers"), "{diagnostics:?}");
}

#[test]
fn test_unsupported_construct_stops_the_file() {
    let mut f = SyntaxFactory::new();
    let mut broken = f.class("Broken");
    let jump = f.stmt(StmtKind::Goto("done".into()));
    broken.members = vec![f.method_decl("Run", Modifiers::public(), Vec::new(), None, vec![jump])];
    let later = helper_user(&mut f, "Later");
    let (result, diagnostics) = lower(f, vec![broken, later], Vec::new());

    assert!(result.is_err());
    assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");
    assert_eq!(diagnostics[0].code, 9001);
    assert_eq!(diagnostics[0].file, "Main.cs");
    let related = &diagnostics[0].related_information;
    assert_eq!(related.len(), 1, "{diagnostics:?}");
    assert_eq!(related[0].message_text, "while lowering 'Broken'");
}

#[test]
fn test_forward_reference_from_method_is_predeclared() {
    let mut f = SyntaxFactory::new();
    let later_ty = TypeInfo::class("Later", "Later");
    let mut early = f.class("Early");
    let created = f.new_object(&later_ty, Vec::new(), None);
    let body = f.expr_stmt(created);
    early.members = vec![f.method_decl("Make", Modifiers::public(), Vec::new(), None, vec![body])];
    let later = f.class("Later");
    let (result, diagnostics) = lower(f, vec![early, later], Vec::new());

    let printed = result.unwrap_or_else(|failure| panic!("{failure}: {diagnostics:?}"));
    assert!(printed.starts_with("local Later\nlocal Early\ndo\n"), "{printed}");
    assert!(printed.contains("        Later.new()\n"), "{printed}");
    // The predeclared local is assigned, not redeclared.
    assert_eq!(printed.matches("local Later").count(), 1, "{printed}");
    assert!(printed.contains("    Later = setmetatable({}, "), "{printed}");
}

#[test]
fn test_program_resolves_types_across_files() {
    let mut f = SyntaxFactory::new();
    let shape_ty = TypeInfo::class("Shape", "Geometry.Shape");
    let mut shapes = CompilationUnit::new("Shapes.cs");
    shapes.namespace = Some("Geometry".into());
    shapes.declarations = vec![f.class("Shape")];

    let mut main = CompilationUnit::new("Main.cs");
    let created = f.new_object(&shape_ty, Vec::new(), None);
    main.statements = vec![f.declare("shape", shape_ty, Some(created))];

    let oracle = f.into_oracle();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let files = lower_program(&[shapes, main], &oracle, &plain(), &mut diagnostics);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].file, "Shapes.cs");

    let main = files[1].result.as_ref().map(print_chunk).expect("lowered");
    assert_eq!(main, "local shape = CS.getAssemblyType(\"Geometry.Shape\").new()\n");
}

#[test]
fn test_interface_alias_lists_members_inherited_from_another_file() {
    let mut f = SyntaxFactory::new();
    let mut named = f.type_decl(TypeDeclKind::Interface, "INamed");
    let mut name = f.auto_property("Name", &TypeInfo::string(), Modifiers::public());
    if let MemberKind::Property { setter, .. } = &mut name.kind {
        *setter = None;
    }
    named.members = vec![name];
    let mut named_file = CompilationUnit::new("Named.cs");
    named_file.declarations = vec![named];

    let mut shape = f.type_decl(TypeDeclKind::Interface, "IShape");
    shape.base_types = vec![f.type_ref(&TypeInfo::new("INamed", "INamed", TypeKind::Interface))];
    shape.members = vec![f.method_decl("Area", Modifiers::public(), vec![], Some(&TypeInfo::double()), vec![])];
    let mut shape_file = CompilationUnit::new("Shape.cs");
    shape_file.declarations = vec![shape];

    let options = LoweringOptions {
        emit_reflection_metadata: false,
        ..LoweringOptions::default()
    };
    let oracle = f.into_oracle();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let files = lower_program(&[shape_file, named_file], &oracle, &options, &mut diagnostics);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    let shape = files[0].result.as_ref().map(print_chunk).expect("lowered");
    assert_eq!(
        shape,
        "export type IShape = {\n    Area: (IShape) -> number,\n    read Name: string,\n}\n"
    );
}

#[test]
fn test_overload_in_derived_file_does_not_shadow_base_file_method() {
    let mut f = SyntaxFactory::new();
    let base_ty = TypeInfo::class("Shape", "Shape");
    let mut shape = f.class("Shape");
    let scale = f.param("factor", &TypeInfo::int());
    let resize = f.method_decl("Resize", Modifiers::public(), vec![scale], None, Vec::new());
    let resize_id = resize.id;
    shape.members = vec![resize];
    let mut shape_file = CompilationUnit::new("Shape.cs");
    shape_file.declarations = vec![shape];

    let mut circle = f.class("Circle");
    circle.base_types = vec![f.type_ref(&base_ty)];
    let label = f.param("label", &TypeInfo::string());
    let by_label = f.method_decl("Resize", Modifiers::public(), vec![label], None, Vec::new());
    let this = f.this(TypeInfo::class("Circle", "Circle"));
    let symbol = SymbolInfo::new("Resize").in_type("Shape").declared_at(resize_id);
    let callee = f.method(Some(this), "Resize", symbol);
    let two = f.int(2);
    let call = f.call(callee, vec![two], TypeInfo::void());
    let body = f.expr_stmt(call);
    circle.members = vec![
        by_label,
        f.method_decl("Grow", Modifiers::public(), Vec::new(), None, vec![body]),
    ];
    let mut circle_file = CompilationUnit::new("Circle.cs");
    circle_file.declarations = vec![circle];

    let oracle = f.into_oracle();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let files = lower_program(&[circle_file, shape_file], &oracle, &plain(), &mut diagnostics);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    let circle = files[0].result.as_ref().map(print_chunk).expect("lowered");
    assert!(circle.contains("function Circle:Resize__2(label)"), "{circle}");
    assert!(circle.contains("self:Resize(2)"), "{circle}");
    let shape = files[1].result.as_ref().map(print_chunk).expect("lowered");
    assert!(shape.contains("function Shape:Resize(factor)"), "{shape}");
}
