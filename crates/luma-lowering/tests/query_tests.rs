//! Query expressions and iterator helpers.

use luma_common::Diagnostic;
use luma_lowering::{LoweringOptions, MetadataTable, lower_unit};
use luma_source::{
    BinaryOp, CompilationUnit, Expr, ExprKind, Ordering, QueryBody, QueryClause, QueryExpr,
    QueryTerminal, Stmt, SymbolInfo, SyntaxFactory, TypeInfo,
};
use luma_target::print_chunk;

fn lower(f: SyntaxFactory, statements: Vec<Stmt>, iterator_helpers: bool) -> String {
    let mut unit = CompilationUnit::new("Program.cs");
    unit.statements = statements;
    let options = LoweringOptions {
        emit_type_annotations: false,
        iterator_helpers,
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

fn numbers(f: &mut SyntaxFactory) -> Stmt {
    let list = TypeInfo::list(TypeInfo::int());
    let created = f.new_object(&list, Vec::new(), None);
    f.declare("items", list, Some(created))
}

/// `from x in items <body>`
fn query_over_items(f: &mut SyntaxFactory, body: QueryBody, ty: TypeInfo) -> Expr {
    let source = f.local("items", TypeInfo::list(TypeInfo::int()));
    f.typed(
        ExprKind::Query(Box::new(QueryExpr {
            range_variable: "x".into(),
            source,
            body,
        })),
        ty,
    )
}

fn groups_of_int() -> TypeInfo {
    TypeInfo::enumerable(TypeInfo::enumerable(TypeInfo::int()))
}

/// `x > 5`
fn is_large(f: &mut SyntaxFactory) -> Expr {
    let x = f.local("x", TypeInfo::int());
    let five = f.int(5);
    f.binary(BinaryOp::GreaterThan, x, five, TypeInfo::bool())
}

#[test]
fn test_where_select_query_copies_then_filters() {
    let mut f = SyntaxFactory::new();
    let items = numbers(&mut f);
    let x = f.local("x", TypeInfo::int());
    let zero = f.int(0);
    let predicate = f.binary(BinaryOp::GreaterThan, x, zero, TypeInfo::bool());
    let x = f.local("x", TypeInfo::int());
    let ten = f.int(10);
    let projection = f.binary(BinaryOp::Multiply, x, ten, TypeInfo::int());
    let source = f.local("items", TypeInfo::list(TypeInfo::int()));
    let query = f.typed(
        ExprKind::Query(Box::new(QueryExpr {
            range_variable: "x".into(),
            source,
            body: QueryBody {
                clauses: vec![QueryClause::Where(predicate)],
                terminal: QueryTerminal::Select(projection),
                continuation: None,
            },
        })),
        TypeInfo::list(TypeInfo::int()),
    );
    let scaled = f.declare("scaled", TypeInfo::list(TypeInfo::int()), Some(query));

    let printed = lower(f, vec![items, scaled], false);
    assert!(printed.starts_with("local items = {}\nlocal _query = table.clone(items)\n"), "{printed}");
    assert!(printed.contains("local function _where(x)\n    return x > 0\nend"), "{printed}");
    assert!(printed.contains("] = _select(_v)"), "{printed}");
    assert!(printed.ends_with("local scaled = _query\n"), "{printed}");
}

#[test]
fn test_enabled_iterator_helper_calls_runtime() {
    let mut f = SyntaxFactory::new();
    let items = numbers(&mut f);
    let receiver = f.local("items", TypeInfo::list(TypeInfo::int()));
    let mut symbol = SymbolInfo::new("Take").in_type("System.Linq.Enumerable");
    symbol.is_extension = true;
    let callee = f.method(Some(receiver), "Take", symbol);
    let two = f.int(2);
    let call = f.call(callee, vec![two], TypeInfo::enumerable(TypeInfo::int()));
    let first = f.declare("first", TypeInfo::enumerable(TypeInfo::int()), Some(call));

    let printed = lower(f, vec![items, first], true);
    assert!(printed.ends_with("local first = CS.Linq.take(items, 2)\n"), "{printed}");
}

#[test]
fn test_group_by_alone_groups_straight_from_source() {
    let mut f = SyntaxFactory::new();
    let items = numbers(&mut f);
    let element = f.local("x", TypeInfo::int());
    let key = is_large(&mut f);
    let body = QueryBody {
        clauses: Vec::new(),
        terminal: QueryTerminal::GroupBy { element, key },
        continuation: None,
    };
    let query = query_over_items(&mut f, body, groups_of_int());
    let grouped = f.declare("grouped", groups_of_int(), Some(query));

    let printed = lower(f, vec![items, grouped], false);
    assert!(!printed.contains("_query"), "{printed}");
    assert!(!printed.contains("_groupElement"), "{printed}");
    assert!(printed.contains("local function _groupKey(x)\n    return x > 5\nend\n"), "{printed}");
    assert!(printed.contains("local _groups = {}\nlocal _groupIndex = {}\nfor _, _v in items do\n"), "{printed}");
    assert!(printed.contains("    local _key = _groupKey(_v)\n    local _index = _groupIndex[_key]\n"), "{printed}");
    assert!(
        printed.contains("        table.insert(_groups, setmetatable({}, {__index = {Key = _key}}))\n"),
        "{printed}"
    );
    assert!(printed.contains("    table.insert(_groups[_index], _v)\n"), "{printed}");
    assert!(printed.ends_with("local grouped = _groups\n"), "{printed}");
}

#[test]
fn test_group_by_after_where_regroups_the_query_table() {
    let mut f = SyntaxFactory::new();
    let items = numbers(&mut f);
    let x = f.local("x", TypeInfo::int());
    let zero = f.int(0);
    let positive = f.binary(BinaryOp::GreaterThan, x, zero, TypeInfo::bool());
    let x = f.local("x", TypeInfo::int());
    let two = f.int(2);
    let element = f.binary(BinaryOp::Multiply, x, two, TypeInfo::int());
    let key = is_large(&mut f);
    let body = QueryBody {
        clauses: vec![QueryClause::Where(positive)],
        terminal: QueryTerminal::GroupBy { element, key },
        continuation: None,
    };
    let query = query_over_items(&mut f, body, groups_of_int());
    let grouped = f.declare("grouped", groups_of_int(), Some(query));

    let printed = lower(f, vec![items, grouped], false);
    assert!(printed.contains("local _query = table.clone(items)\n"), "{printed}");
    assert!(printed.contains("local function _groupElement(x)\n    return x * 2\nend\n"), "{printed}");
    assert!(printed.contains("for _, _v in _query do\n"), "{printed}");
    assert!(printed.contains("table.insert(_groups[_index], _groupElement(_v))"), "{printed}");
    assert!(printed.ends_with("_query = _groups\nlocal grouped = _query\n"), "{printed}");
}

#[test]
fn test_orderby_sorts_with_three_state_comparator() {
    let mut f = SyntaxFactory::new();
    let items = numbers(&mut f);
    let key = f.local("x", TypeInfo::int());
    let projection = f.local("x", TypeInfo::int());
    let body = QueryBody {
        clauses: vec![QueryClause::OrderBy(vec![Ordering {
            expr: key,
            descending: true,
        }])],
        terminal: QueryTerminal::Select(projection),
        continuation: None,
    };
    let query = query_over_items(&mut f, body, TypeInfo::list(TypeInfo::int()));
    let sorted = f.declare("sorted", TypeInfo::list(TypeInfo::int()), Some(query));

    let printed = lower(f, vec![items, sorted], false);
    assert!(printed.contains("local function _orderKey(x)\n    return x\nend\n"), "{printed}");
    assert!(printed.contains("local function _compare(a, b)\n"), "{printed}");
    assert!(printed.contains("    local _ka, _kb = _orderKey(a), _orderKey(b)\n"), "{printed}");
    // Descending: a larger key sorts first.
    assert!(
        printed.contains("    if _ka < _kb then\n        return 1\n    elseif _ka > _kb then\n        return -1\n    end\n    return 0\nend\n"),
        "{printed}"
    );
    assert!(
        printed.contains("table.sort(_query, function(a, b)\n    return _compare(a, b) < 0\nend)\n"),
        "{printed}"
    );
    assert!(!printed.contains("_select"), "{printed}");
    assert!(printed.ends_with("local sorted = _query\n"), "{printed}");
}
