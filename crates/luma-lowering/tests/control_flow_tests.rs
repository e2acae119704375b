//! Control transfers out of protected regions.

use luma_common::Diagnostic;
use luma_lowering::{LoweringOptions, MetadataTable, lower_unit};
use luma_source::{
    BinaryOp, Body, CompilationUnit, LocalFunctionDecl, Modifiers, Stmt, StmtKind, SyntaxFactory,
    TypeDecl, TypeInfo, TypeKind,
};
use luma_target::print_chunk;

fn lower(f: SyntaxFactory, decls: Vec<TypeDecl>, statements: Vec<Stmt>) -> String {
    let mut unit = CompilationUnit::new("Program.cs");
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

#[test]
fn test_break_out_of_try_inside_loop() {
    let mut f = SyntaxFactory::new();
    let init = f.boolean(true);
    let running = f.declare("running", TypeInfo::bool(), Some(init));
    let brk = f.brk();
    let guarded = f.try_stmt(vec![brk], Vec::new(), Some(Vec::new()));
    let body = f.block(vec![guarded]);
    let condition = f.local("running", TypeInfo::bool());
    let loop_stmt = f.while_stmt(condition, body);

    let printed = lower(f, Vec::new(), vec![running, loop_stmt]);
    assert!(printed.starts_with("local running = true\nwhile running do\n"), "{printed}");
    assert!(printed.contains("return CS.TRY_BREAK, {}"), "{printed}");
    assert!(printed.contains("if _exitType == CS.TRY_BREAK then"), "{printed}");
}

#[test]
fn test_return_from_try_inside_method() {
    let mut f = SyntaxFactory::new();
    let mut parser = f.class("Parser");
    let seven = f.int(7);
    let ret = f.ret(Some(seven));
    let catch_all = f.catch_clause(None, None, Vec::new());
    let guarded = f.try_stmt(vec![ret], vec![catch_all], None);
    let zero = f.int(0);
    let fallback = f.ret(Some(zero));
    parser.members = vec![f.method_decl(
        "Parse",
        Modifiers::public(),
        Vec::new(),
        Some(&TypeInfo::int()),
        vec![guarded, fallback],
    )];

    let printed = lower(f, vec![parser], Vec::new());
    assert!(printed.contains("function Parser:Parse()"), "{printed}");
    assert!(printed.contains("return CS.TRY_RETURN, {7}"), "{printed}");
    assert!(printed.contains("return table.unpack(_returns)"), "{printed}");
    assert!(printed.contains("        return 0\n"), "{printed}");
}

#[test]
fn test_typed_catch_inside_local_function_rethrows() {
    let mut f = SyntaxFactory::new();
    let io = TypeInfo::new("IOException", "System.IO.IOException", TypeKind::Class);
    let rethrow = f.stmt(StmtKind::Throw(None));
    let catch = f.catch_clause(Some(&io), Some("e"), vec![rethrow]);
    let guarded = f.try_stmt(Vec::new(), vec![catch], None);
    let function = f.stmt(StmtKind::LocalFunction(Box::new(LocalFunctionDecl {
        name: "load".into(),
        is_async: false,
        type_parameters: Vec::new(),
        parameters: Vec::new(),
        return_type: None,
        body: Body::Block(vec![guarded]),
    })));

    let printed = lower(f, Vec::new(), vec![function]);
    assert!(printed.starts_with("local function load()\n"), "{printed}");
    assert!(printed.contains("local e = _error"), "{printed}");
    assert!(printed.contains("CS.throw(_error)"), "{printed}");
}

#[test]
fn test_continue_and_break_from_try_dispatch_in_method_loop() {
    let mut f = SyntaxFactory::new();
    let mut queue = f.class("Queue");

    let zero = f.int(0);
    let counter = f.declare("i", TypeInfo::int(), Some(zero));
    let target = f.local("i", TypeInfo::int());
    let current = f.local("i", TypeInfo::int());
    let one = f.int(1);
    let next = f.binary(BinaryOp::Add, current, one, TypeInfo::int());
    let step = f.assign(target, next);
    let step = f.expr_stmt(step);
    let i = f.local("i", TypeInfo::int());
    let three = f.int(3);
    let early = f.binary(BinaryOp::LessThan, i, three, TypeInfo::bool());
    let skip = f.cont();
    let skip = f.if_stmt(early, skip, None);
    let stop = f.brk();
    let guarded = f.try_stmt(vec![step, skip, stop], Vec::new(), Some(Vec::new()));
    let body = f.block(vec![guarded]);
    let i = f.local("i", TypeInfo::int());
    let ten = f.int(10);
    let condition = f.binary(BinaryOp::LessThan, i, ten, TypeInfo::bool());
    let loop_stmt = f.while_stmt(condition, body);
    queue.members = vec![f.method_decl("Drain", Modifiers::public(), Vec::new(), None, vec![counter, loop_stmt])];

    let printed = lower(f, vec![queue], Vec::new());
    assert!(printed.contains("function Queue:Drain()"), "{printed}");
    assert!(printed.contains("while i < 10 do\n"), "{printed}");
    assert!(printed.contains("local _exitType, _returns = CS.try(function()"), "{printed}");
    assert!(printed.contains("return CS.TRY_CONTINUE, {}"), "{printed}");
    assert!(printed.contains("return CS.TRY_BREAK, {}"), "{printed}");

    // Break is dispatched first, then continue, each re-performed natively.
    let lines: Vec<&str> = printed.lines().map(str::trim).collect();
    let arm = |test: &str| lines.iter().position(|line| *line == test);
    let on_break = arm("if _exitType == CS.TRY_BREAK then").expect("break arm");
    let on_continue = arm("elseif _exitType == CS.TRY_CONTINUE then").expect("continue arm");
    assert_eq!(lines[on_break + 1], "break", "{printed}");
    assert_eq!(on_continue, on_break + 2, "{printed}");
    assert_eq!(lines[on_continue + 1], "continue", "{printed}");
}
