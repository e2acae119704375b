//! Class layout through the file driver.

use luma_common::Diagnostic;
use luma_lowering::{LoweringOptions, MetadataTable, lower_unit};
use luma_source::{
    BinaryOp, CompilationUnit, ConstructorInitializerKind, Initializer, InitializerValue,
    MemberInitializer, MemberKind, Modifiers, RefKind, Resolution, Stmt, SymbolInfo, SymbolKind,
    SyntaxFactory, TypeDecl, TypeInfo, TypeKind,
};
use luma_target::print_chunk;

fn plain() -> LoweringOptions {
    LoweringOptions {
        emit_type_annotations: false,
        emit_reflection_metadata: false,
        ..LoweringOptions::default()
    }
}

fn lower(f: SyntaxFactory, namespace: Option<&str>, decls: Vec<TypeDecl>, options: &LoweringOptions) -> String {
    let mut unit = CompilationUnit::new("Main.cs");
    unit.namespace = namespace.map(str::to_string);
    unit.declarations = decls;
    let oracle = f.into_oracle();
    let metadata = MetadataTable::collect(std::slice::from_ref(&unit), &oracle);
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    match lower_unit(&unit, &oracle, &metadata, options, &mut diagnostics) {
        Ok(chunk) => print_chunk(&chunk),
        Err(failure) => panic!("{failure}: {diagnostics:?}"),
    }
}

/// Declarations followed by top-level statements, in one file.
fn lower_with_statements(f: SyntaxFactory, decls: Vec<TypeDecl>, statements: Vec<Stmt>) -> String {
    let mut unit = CompilationUnit::new("Main.cs");
    unit.declarations = decls;
    unit.statements = statements;
    let oracle = f.into_oracle();
    let metadata = MetadataTable::collect(std::slice::from_ref(&unit), &oracle);
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    match lower_unit(&unit, &oracle, &metadata, &plain(), &mut diagnostics) {
        Ok(chunk) => print_chunk(&chunk),
        Err(failure) => panic!("{failure}: {diagnostics:?}"),
    }
}

#[test]
fn test_counter_class_end_to_end() {
    let mut f = SyntaxFactory::new();
    let owner = TypeInfo::class("Counter", "Game.Counter");
    let mut counter = f.class("Counter");

    let start = f.param("start", &TypeInfo::int());
    let this = f.this(owner.clone());
    let count = f.instance_member(Some(this), SymbolKind::Field, "Count", &owner, TypeInfo::int());
    let value = f.param_ref("start", TypeInfo::int(), RefKind::None);
    let assign = f.assign(count, value);
    let ctor_body = f.expr_stmt(assign);

    let this = f.this(owner.clone());
    let target = f.instance_member(Some(this), SymbolKind::Field, "Count", &owner, TypeInfo::int());
    let this = f.this(owner.clone());
    let current = f.instance_member(Some(this), SymbolKind::Field, "Count", &owner, TypeInfo::int());
    let one = f.int(1);
    let sum = f.binary(BinaryOp::Add, current, one, TypeInfo::int());
    let bump = f.assign(target, sum);
    let bump = f.expr_stmt(bump);

    let label = f.string("counter");
    let describe = f.ret(Some(label));

    counter.members = vec![
        f.field("Count", &TypeInfo::int(), None, Modifiers::public()),
        f.constructor(vec![start], None, vec![ctor_body]),
        f.method_decl("Increment", Modifiers::public(), vec![], None, vec![bump]),
        f.method_decl("ToString", Modifiers::public(), vec![], Some(&TypeInfo::string()), vec![describe]),
    ];

    let options = LoweringOptions {
        emit_type_annotations: false,
        ..LoweringOptions::default()
    };
    let printed = lower(f, Some("Game"), vec![counter], &options);
    assert!(printed.starts_with("local Counter\ndo\n"), "{printed}");
    assert!(
        printed.contains("    local function constructor(self, start)\n        self.Count = 0\n        self.Count = start\n    end\n"),
        "{printed}"
    );
    assert!(
        printed.contains("    function Counter:Increment()\n        self.Count = self.Count + 1\n    end\n"),
        "{printed}"
    );
    assert!(printed.contains("Counter.__tostring = function(self)"), "{printed}");
    assert!(printed.contains("return self:ToString()"), "{printed}");
    assert!(
        printed.contains("    CS.Reflection.registerType(Counter, {name = \"Counter\", fullName = \"Game.Counter\"})\n"),
        "{printed}"
    );
    assert!(printed.ends_with("end\n"), "{printed}");
}

#[test]
fn test_base_class_is_lowered_before_derived() {
    let mut f = SyntaxFactory::new();
    let animal_ty = TypeInfo::class("Animal", "Animal");

    let mut dog = f.class("Dog");
    dog.base_types = vec![f.type_ref(&animal_ty)];
    let dog_name = f.param("name", &TypeInfo::string());
    let forwarded = f.param_ref("name", TypeInfo::string(), RefKind::None);
    dog.members = vec![f.constructor(
        vec![dog_name],
        Some((ConstructorInitializerKind::Base, vec![forwarded])),
        Vec::new(),
    )];

    let mut animal = f.class("Animal");
    let animal_name = f.param("name", &TypeInfo::string());
    animal.members = vec![
        f.auto_property("Name", &TypeInfo::string(), Modifiers::public()),
        f.constructor(vec![animal_name], None, Vec::new()),
    ];

    let printed = lower(f, None, vec![dog, animal], &plain());
    let animal_at = printed.find("Animal = setmetatable").expect("animal bootstrap");
    let dog_at = printed.find("Dog = setmetatable").expect("dog bootstrap");
    assert!(animal_at < dog_at, "{printed}");
    assert!(printed.contains("__index = Animal"), "{printed}");
    assert!(
        printed.contains("    local function constructor(self, name)\n        Animal.constructor(self, name)\n    end\n"),
        "{printed}"
    );
}

#[test]
fn test_instance_event_gets_signal() {
    let mut f = SyntaxFactory::new();
    let action = TypeInfo::new("Action", "System.Action", TypeKind::Delegate);
    let mut button = f.class("Button");
    let ty = f.type_ref(&action);
    button.members = vec![f.member_decl(
        "Clicked",
        Modifiers::public(),
        MemberKind::Event {
            ty,
            initializer: None,
        },
    )];
    let printed = lower(f, None, vec![button], &plain());
    assert!(printed.contains("        self.Clicked = CS.Signal.new()\n"), "{printed}");
}

#[test]
fn test_reflection_lists_base_and_interfaces() {
    let mut f = SyntaxFactory::new();
    let shape = f.type_decl(luma_source::TypeDeclKind::Interface, "IShape");
    let mut square = f.class("Square");
    square.base_types = vec![f.type_ref(&TypeInfo::new("IShape", "IShape", TypeKind::Interface))];
    let options = LoweringOptions {
        emit_type_annotations: false,
        ..LoweringOptions::default()
    };
    let printed = lower(f, None, vec![shape, square], &options);
    assert!(
        printed.contains("CS.Reflection.registerType(Square, {name = \"Square\", fullName = \"Square\", interfaces = {\"IShape\"}})"),
        "{printed}"
    );
}

#[test]
fn test_overloaded_methods_get_counter_names_at_call_sites() {
    let mut f = SyntaxFactory::new();
    let owner = TypeInfo::class("Ledger", "Ledger");
    let mut ledger = f.class("Ledger");

    let amount = f.param("amount", &TypeInfo::int());
    let by_amount = f.method_decl("Add", Modifiers::public(), vec![amount], None, Vec::new());
    let text = f.param("text", &TypeInfo::string());
    let by_text = f.method_decl("Add", Modifiers::public(), vec![text], None, Vec::new());

    let this = f.this(owner);
    let symbol = SymbolInfo::new("Add").in_type("Ledger").declared_at(by_text.id);
    let callee = f.method(Some(this), "Add", symbol);
    let entry = f.string("entry");
    let call = f.call(callee, vec![entry], TypeInfo::void());
    let body = f.expr_stmt(call);
    let record = f.method_decl("Record", Modifiers::public(), Vec::new(), None, vec![body]);
    ledger.members = vec![by_amount, by_text, record];

    let printed = lower(f, None, vec![ledger], &plain());
    assert!(printed.contains("function Ledger:Add__1(amount)"), "{printed}");
    assert!(printed.contains("function Ledger:Add__2(text)"), "{printed}");
    assert!(printed.contains("self:Add__2(\"entry\")"), "{printed}");
}

#[test]
fn test_derived_overload_does_not_shadow_inherited_method() {
    let mut f = SyntaxFactory::new();
    let base_ty = TypeInfo::class("Account", "Account");
    let derived_ty = TypeInfo::class("Savings", "Savings");

    let mut account = f.class("Account");
    let amount = f.param("amount", &TypeInfo::int());
    let by_amount = f.method_decl("Add", Modifiers::public(), vec![amount], None, Vec::new());
    let inherited_id = by_amount.id;
    account.members = vec![by_amount];

    let mut savings = f.class("Savings");
    savings.base_types = vec![f.type_ref(&base_ty)];
    let text = f.param("text", &TypeInfo::string());
    let by_text = f.method_decl("Add", Modifiers::public(), vec![text], None, Vec::new());
    let this = f.this(derived_ty);
    let symbol = SymbolInfo::new("Add").in_type("Account").declared_at(inherited_id);
    let callee = f.method(Some(this), "Add", symbol);
    let one = f.int(1);
    let call = f.call(callee, vec![one], TypeInfo::void());
    let body = f.expr_stmt(call);
    let run = f.method_decl("Run", Modifiers::public(), Vec::new(), None, vec![body]);
    savings.members = vec![by_text, run];

    let printed = lower(f, None, vec![account, savings], &plain());
    assert!(printed.contains("function Account:Add(amount)"), "{printed}");
    assert!(printed.contains("function Savings:Add__2(text)"), "{printed}");
    assert!(!printed.contains("function Savings:Add("), "{printed}");
    assert!(printed.contains("self:Add(1)"), "{printed}");
}

#[test]
fn test_ref_argument_passes_getter_setter_closure() {
    let mut f = SyntaxFactory::new();
    let owner = TypeInfo::class("Tally", "Tally");
    let mut tally = f.class("Tally");

    let mut slot = f.param("slot", &TypeInfo::int());
    slot.ref_kind = RefKind::Ref;
    let target = f.param_ref("slot", TypeInfo::int(), RefKind::Ref);
    let current = f.param_ref("slot", TypeInfo::int(), RefKind::Ref);
    let one = f.int(1);
    let sum = f.binary(BinaryOp::Add, current, one, TypeInfo::int());
    let bump_body = f.assign(target, sum);
    let bump_body = f.expr_stmt(bump_body);
    let bump = f.method_decl("Bump", Modifiers::public(), vec![slot], None, vec![bump_body]);
    let bump_id = bump.id;

    let zero = f.int(0);
    let n = f.declare("n", TypeInfo::int(), Some(zero));
    let this = f.this(owner);
    let callee = f.method(Some(this), "Bump", SymbolInfo::new("Bump").in_type("Tally").declared_at(bump_id));
    let local = f.local("n", TypeInfo::int());
    let by_ref = f.ref_arg(local, RefKind::Ref);
    let call = f.call_with(callee, vec![by_ref], TypeInfo::void());
    let call = f.expr_stmt(call);
    let result = f.local("n", TypeInfo::int());
    let done = f.ret(Some(result));
    let run = f.method_decl("Run", Modifiers::public(), Vec::new(), Some(&TypeInfo::int()), vec![n, call, done]);
    tally.members = vec![bump, run];

    let printed = lower(f, None, vec![tally], &plain());
    assert!(printed.contains("function Tally:Bump(slot)\n        slot(slot() + 1)\n"), "{printed}");
    assert!(
        printed.contains(
            "        self:Bump(function(...)\n            if select(\"#\", ...) > 0 then\n                n = ...\n            end\n            return n\n        end)\n"
        ),
        "{printed}"
    );
    assert!(printed.contains("        return n\n"), "{printed}");
}

#[test]
fn test_class_object_initializer_assigns_through_temporary() {
    let mut f = SyntaxFactory::new();
    let person_ty = TypeInfo::class("Person", "Person");
    let tags_ty = TypeInfo::list(TypeInfo::string());
    let mut person = f.class("Person");
    let fresh_tags = f.new_object(&tags_ty, Vec::new(), None);
    person.members = vec![
        f.field("Name", &TypeInfo::string(), None, Modifiers::public()),
        f.field("Age", &TypeInfo::int(), None, Modifiers::public()),
        f.field("Tags", &tags_ty, Some(fresh_tags), Modifiers::public()),
    ];

    fn member(f: &mut SyntaxFactory, name: &str, ty: TypeInfo, value: InitializerValue) -> MemberInitializer {
        let id = f.next_id();
        let symbol = SymbolInfo::new(name).in_type("Person");
        f.record(id, Resolution::symbol(SymbolKind::Field, symbol, Some(ty)));
        MemberInitializer {
            id,
            span: luma_common::Span::DUMMY,
            name: name.into(),
            value,
        }
    }
    let name = f.string("Ada");
    let age = f.int(36);
    let tag = f.string("math");
    let members = vec![
        member(&mut f, "Name", TypeInfo::string(), InitializerValue::Expr(name)),
        member(&mut f, "Age", TypeInfo::int(), InitializerValue::Expr(age)),
        member(
            &mut f,
            "Tags",
            tags_ty,
            InitializerValue::Nested(Initializer::Collection(vec![tag])),
        ),
    ];
    let created = f.new_object(&person_ty, Vec::new(), Some(Initializer::Object(members)));
    let ada = f.declare("ada", person_ty, Some(created));

    let printed = lower_with_statements(f, vec![person], vec![ada]);
    assert!(
        printed.ends_with(
            "local _obj = Person.new()\n_obj.Name = \"Ada\"\n_obj.Age = 36\nlocal _member = _obj.Tags\ntable.insert(_member, \"math\")\nlocal ada = _obj\n"
        ),
        "{printed}"
    );
}
