//! Oracle behavior as seen by consumers: JSON export round-trip of the
//! front-end table and factory-recorded resolutions.

use luma_source::{
    BinaryOp, CompilationUnit, ConstantValue, SymbolKind, SyntaxFactory, TableOracle, TypeInfo,
    TypeOracle,
};

#[test]
fn test_factory_records_local_resolution() {
    let mut f = SyntaxFactory::new();
    let x = f.local("x", TypeInfo::int());
    let oracle = f.oracle();
    assert_eq!(oracle.kind_of(x.id), SymbolKind::Local);
    assert!(oracle.type_of(x.id).is_some_and(TypeInfo::is_integer));
}

#[test]
fn test_factory_binary_folds_through_oracle() {
    let mut f = SyntaxFactory::new();
    let a = f.int(10);
    let b = f.int(1);
    let sum = f.binary(BinaryOp::Subtract, a, b, TypeInfo::int());
    assert_eq!(f.oracle().constant_fold(&sum), Some(ConstantValue::Int(9)));
}

#[test]
fn test_static_member_resolution_carries_owner() {
    let mut f = SyntaxFactory::new();
    let owner = TypeInfo::class("Config", "Game.Config");
    let member = f.static_member(&owner, SymbolKind::Field, "Limit", TypeInfo::int());
    let symbol = f.oracle().symbol_of(member.id).cloned();
    let symbol = symbol.expect("symbol recorded");
    assert!(symbol.is_static);
    assert_eq!(symbol.containing_type.as_deref(), Some("Game.Config"));
}

#[test]
fn test_oracle_json_round_trip() {
    let mut f = SyntaxFactory::new();
    let x = f.local("count", TypeInfo::list(TypeInfo::string()));
    let json = serde_json::to_string(f.oracle()).expect("serialize");
    let back: TableOracle = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.len(), f.oracle().len());
    let ty = back.type_of(x.id).expect("type survives");
    assert_eq!(ty.name, "List");
    assert_eq!(ty.type_arguments[0], TypeInfo::string());
}

#[test]
fn test_unit_deserializes_with_defaults() {
    let unit: CompilationUnit =
        serde_json::from_str(r#"{ "fileName": "Empty.cs" }"#).expect("minimal unit");
    assert_eq!(unit.file_name, "Empty.cs");
    assert!(unit.declarations.is_empty());
    assert!(unit.statements.is_empty());
    assert!(unit.namespace.is_none());
}
