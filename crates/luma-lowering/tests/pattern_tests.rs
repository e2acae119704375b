//! `is` patterns and switch expressions.

use luma_common::{Diagnostic, Span};
use luma_lowering::{LoweringOptions, MetadataTable, lower_unit};
use luma_source::{
    CompilationUnit, ExprKind, NodeId, Pattern, PatternKind, RelationalOp, Stmt, SwitchArm,
    SyntaxFactory, TypeInfo,
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

fn pattern(kind: PatternKind) -> Pattern {
    Pattern {
        id: NodeId::NONE,
        span: Span::DUMMY,
        kind,
    }
}

fn relational(f: &mut SyntaxFactory, op: RelationalOp, value: i64) -> Pattern {
    let value = f.int(value);
    pattern(PatternKind::Relational { op, value })
}

#[test]
fn test_range_pattern_is_a_conjunction() {
    let mut f = SyntaxFactory::new();
    let five = f.int(5);
    let n = f.declare("n", TypeInfo::int(), Some(five));
    let low = relational(&mut f, RelationalOp::GreaterThanOrEqual, 0);
    let high = relational(&mut f, RelationalOp::LessThan, 10);
    let subject = f.local("n", TypeInfo::int());
    let test = f.typed(
        ExprKind::Is {
            expr: Box::new(subject),
            pattern: Box::new(pattern(PatternKind::And(Box::new(low), Box::new(high)))),
        },
        TypeInfo::bool(),
    );
    let in_range = f.declare("inRange", TypeInfo::bool(), Some(test));

    assert_eq!(
        lower(f, vec![n, in_range]),
        "local n = 5\nlocal inRange = n >= 0 and n < 10\n"
    );
}

#[test]
fn test_not_null_pattern() {
    let mut f = SyntaxFactory::new();
    let null = f.null();
    let o = f.declare("o", TypeInfo::object(), Some(null));
    let subject = f.local("o", TypeInfo::object());
    let null = f.null();
    let test = f.typed(
        ExprKind::Is {
            expr: Box::new(subject),
            pattern: Box::new(pattern(PatternKind::Not(Box::new(pattern(PatternKind::Constant(null)))))),
        },
        TypeInfo::bool(),
    );
    let present = f.declare("present", TypeInfo::bool(), Some(test));

    assert_eq!(
        lower(f, vec![o, present]),
        "local o = nil\nlocal present = not (o == nil)\n"
    );
}

#[test]
fn test_switch_expression_with_discard_arm_is_an_if_chain() {
    let mut f = SyntaxFactory::new();
    let three = f.int(3);
    let n = f.declare("n", TypeInfo::int(), Some(three));
    let subject = f.local("n", TypeInfo::int());
    let small = f.string("small");
    let large = f.string("large");
    let arms = vec![
        SwitchArm {
            pattern: relational(&mut f, RelationalOp::LessThan, 10),
            guard: None,
            body: small,
        },
        SwitchArm {
            pattern: pattern(PatternKind::Discard),
            guard: None,
            body: large,
        },
    ];
    let switch = f.typed(
        ExprKind::Switch {
            governing: Box::new(subject),
            arms,
        },
        TypeInfo::string(),
    );
    let size = f.declare("size", TypeInfo::string(), Some(switch));

    assert_eq!(
        lower(f, vec![n, size]),
        "local n = 3\nlocal size = if n < 10 then \"small\" else \"large\"\n"
    );
}
