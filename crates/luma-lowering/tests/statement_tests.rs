//! Top-level statements through the file driver.

use luma_common::Diagnostic;
use luma_lowering::{LoweringOptions, MetadataTable, lower_unit};
use luma_source::{
    BinaryOp, CompilationUnit, ForEachVariable, Stmt, StmtKind, SwitchLabel, SwitchSection,
    SyntaxFactory, TypeInfo, UnaryOp,
};
use luma_target::print_chunk;
use pretty_assertions::assert_eq;

fn lower(f: SyntaxFactory, statements: Vec<Stmt>) -> String {
    let mut unit = CompilationUnit::new("Program.cs");
    unit.statements = statements;
    let options = LoweringOptions {
        emit_type_annotations: false,
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
fn test_counting_loop_becomes_numeric_for() {
    let mut f = SyntaxFactory::new();
    let zero = f.int(0);
    let decl = f.declarator("i", TypeInfo::int(), Some(zero));
    let i = f.local("i", TypeInfo::int());
    let limit = f.int(10);
    let condition = f.binary(BinaryOp::LessThan, i, limit, TypeInfo::bool());
    let i = f.local("i", TypeInfo::int());
    let step = f.unary(UnaryOp::PostIncrement, i, TypeInfo::int());
    let body = f.block(Vec::new());
    let stmt = f.stmt(StmtKind::For {
        declarations: vec![decl],
        initializers: Vec::new(),
        condition: Some(condition),
        incrementors: vec![step],
        body: Box::new(body),
    });
    assert_eq!(lower(f, vec![stmt]), "for i = 0, 9, 1 do\nend\n");
}

#[test]
fn test_switch_sections_become_if_chain() {
    let mut f = SyntaxFactory::new();
    let two = f.int(2);
    let x_decl = f.declare("x", TypeInfo::int(), Some(two));
    let zero = f.int(0);
    let y_decl = f.declare("y", TypeInfo::int(), Some(zero));

    fn assign_y(f: &mut SyntaxFactory, value: i64) -> Stmt {
        let y = f.local("y", TypeInfo::int());
        let value = f.int(value);
        let assign = f.assign(y, value);
        f.expr_stmt(assign)
    }
    let first = assign_y(&mut f, 1);
    let fallback = assign_y(&mut f, 2);
    let brk = f.brk();
    let brk2 = f.brk();
    let x = f.local("x", TypeInfo::int());
    let one = f.int(1);
    let two = f.int(2);
    let switch = f.stmt(StmtKind::Switch {
        governing: x,
        sections: vec![
            SwitchSection {
                labels: vec![SwitchLabel::Case(one), SwitchLabel::Case(two)],
                statements: vec![first, brk],
            },
            SwitchSection {
                labels: vec![SwitchLabel::Default],
                statements: vec![fallback, brk2],
            },
        ],
    });
    assert_eq!(
        lower(f, vec![x_decl, y_decl, switch]),
        "local x = 2\nlocal y = 0\nif x == 1 or x == 2 then\n    y = 1\nelse\n    y = 2\nend\n"
    );
}

#[test]
fn test_foreach_over_list_drops_index() {
    let mut f = SyntaxFactory::new();
    let list = TypeInfo::list(TypeInfo::string());
    let created = f.new_object(&list, Vec::new(), None);
    let items_decl = f.declare("items", list.clone(), Some(created));
    let items = f.local("items", list);
    let body = f.block(Vec::new());
    let id = f.next_id();
    let each = f.stmt(StmtKind::ForEach {
        variable: ForEachVariable::Single {
            id,
            name: "item".into(),
        },
        collection: items,
        body: Box::new(body),
    });
    assert_eq!(
        lower(f, vec![items_decl, each]),
        "local items = {}\nfor _, item in items do\nend\n"
    );
}
