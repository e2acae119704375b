//! Class layout.
//!
//! ```text
//! local Dog
//! do
//!     Dog = setmetatable({}, {__tostring = <name>, __index = Animal})
//!     Dog.__index = Dog
//!     Dog.__name = "Dog"
//!     local function constructor(self, name)
//!         Animal.constructor(self, name)
//!         self.Tricks = 0
//!     end
//!     Dog.constructor = constructor
//!     function Dog.new(...)
//!         local self = setmetatable({}, Dog)
//!         return constructor(self, ...) or self
//!     end
//!     function Dog:Speak() ... end
//! end
//! export type Dog = {Tricks: number, Speak: (Dog) -> ()}
//! ```
//!
//! Every instance constructor gets its own `constructor`/`new` pair
//! (`constructor__2`/`new__2` when overloaded). The constructor is also
//! stored on the class so derived constructors can chain to it.

use crate::error::{LoweringError, LoweringResult};
use crate::expressions::FunctionSpec;
use crate::lowerer::Lowerer;
use crate::metadata::{LayoutStrategy, TypeMetadata};
use luma_source::{
    Body, ConstructorDecl, ConstructorInitializer, ConstructorInitializerKind, TypeDecl,
};
use luma_target::{Expr, FunctionBody, Stmt as TStmt, TableField, TypeNode};

impl Lowerer<'_> {
    pub(super) fn lower_class(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
    ) -> LoweringResult<Vec<TStmt>> {
        let local = self.frame_local();
        let mut block: Vec<TStmt> = self.declare_type_local(&local).into_iter().collect();

        let mut body = self.class_bootstrap(meta, &local);
        body.extend(self.lower_constructors(decl, meta, &local)?);
        body.extend(self.lower_class_members(decl, meta, &local)?);
        if let Some(statics) = decl.static_constructor().and_then(|c| c.body.as_ref()) {
            let statics = self.with_function(|this| this.lower_function_body(statics, false))?;
            if !statics.is_empty() {
                body.push(TStmt::Do(statics));
            }
        }
        body.extend(self.register_type(decl, meta, &local)?);
        block.push(TStmt::Do(body));

        let self_type = TypeNode::generic(
            local.clone(),
            decl.type_parameters
                .iter()
                .map(|param| TypeNode::named(param.clone()))
                .collect(),
        );
        let fields = self.structural_fields(&decl.members, meta, &self_type);
        block.extend(self.type_alias(decl, TypeNode::Table(fields)));
        Ok(block)
    }

    fn class_bootstrap(&mut self, meta: &TypeMetadata, local: &str) -> Vec<TStmt> {
        let mut metatable = vec![TableField::Named(
            "__tostring".into(),
            Expr::function(
                Vec::new(),
                vec![TStmt::Return(vec![Expr::string(meta.name.clone())])],
            ),
        )];
        if let Some(base) = &meta.base {
            let base = self.type_reference_by_name(base);
            metatable.push(TableField::Named("__index".into(), base));
        }
        let class = Expr::id(local);
        vec![
            TStmt::assign(
                class.clone(),
                Expr::call(
                    Expr::id("setmetatable"),
                    vec![Expr::empty_table(), Expr::Table(metatable)],
                ),
            ),
            TStmt::assign(Expr::member(class.clone(), "__index"), class.clone()),
            TStmt::assign(Expr::member(class, "__name"), Expr::string(meta.name.clone())),
        ]
    }

    fn lower_constructors(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
        local: &str,
    ) -> LoweringResult<Vec<TStmt>> {
        let declared: Vec<_> = decl.constructors().collect();
        if declared.is_empty() {
            return self.constructor_pair(decl, meta, local, "new", None);
        }
        let mut block = Vec::new();
        for (member, ctor) in declared {
            let factory = meta
                .callable(member.id)
                .map_or_else(|| "new".to_string(), |c| c.emitted_name.clone());
            block.extend(self.constructor_pair(decl, meta, local, &factory, Some(ctor))?);
        }
        Ok(block)
    }

    /// The constructor local, its slot on the class, and the `new` factory.
    fn constructor_pair(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
        local: &str,
        factory: &str,
        ctor: Option<&ConstructorDecl>,
    ) -> LoweringResult<Vec<TStmt>> {
        let slot = factory.replacen("new", "constructor", 1);
        let empty = Body::Block(Vec::new());
        let (parameters, body) = match ctor {
            Some(ctor) => (ctor.parameters.as_slice(), ctor.body.as_ref().unwrap_or(&empty)),
            None => (&[][..], &empty),
        };
        let initializer = ctor.and_then(|c| c.initializer.as_ref());
        let spec = FunctionSpec::method(parameters, body, None, false).with_self();
        let function = self.build_function_with(&spec, |this| {
            let mut prologue = Vec::new();
            match initializer {
                Some(init) if init.kind == ConstructorInitializerKind::This => {
                    // The chained constructor already set up the defaults.
                    let owner = Expr::id(local);
                    return this.chained_constructor_call(init, owner);
                }
                Some(init) => {
                    let Some(base) = meta.base.as_deref() else {
                        return Err(LoweringError::unresolved("base type", decl.name.clone(), decl.span));
                    };
                    let owner = this.type_reference_by_name(base);
                    prologue.extend(this.chained_constructor_call(init, owner)?);
                }
                None => prologue.extend(this.implicit_base_call(meta)),
            }
            prologue.extend(this.instance_defaults(decl)?);
            Ok(prologue)
        })?;

        let constructor = self.ctx.fresh(&slot);
        let class = Expr::id(local);
        let factory_body = vec![
            TStmt::local(
                "self",
                Some(Expr::call(
                    Expr::id("setmetatable"),
                    vec![Expr::empty_table(), class.clone()],
                )),
            ),
            TStmt::Return(vec![Expr::or(
                Expr::call(
                    Expr::id(constructor.clone()),
                    vec![Expr::id("self"), Expr::Vararg],
                ),
                Expr::id("self"),
            )]),
        ];
        Ok(vec![
            TStmt::LocalFunction {
                name: constructor.clone(),
                function,
            },
            TStmt::assign(Expr::member(class, slot), Expr::id(constructor)),
            TStmt::FunctionDecl {
                path: vec![local.to_string(), factory.to_string()],
                method: None,
                function: FunctionBody {
                    is_variadic: true,
                    body: factory_body,
                    ..FunctionBody::default()
                },
            },
        ])
    }

    /// `Owner.constructor(self, args)` for `: base(...)` and `: this(...)`.
    fn chained_constructor_call(
        &mut self,
        init: &ConstructorInitializer,
        owner: Expr,
    ) -> LoweringResult<Vec<TStmt>> {
        let symbol = self.symbol_of(init.id);
        let slot = symbol
            .and_then(|s| s.declaration)
            .and_then(|decl| self.metadata.callable(decl))
            .map_or_else(|| "constructor".to_string(), |c| c.constructor_name());
        let (mut block, args) = self.capture(|this| {
            this.lower_call_arguments(vec![Expr::id("self")], symbol, &init.arguments, 0)
        })?;
        block.push(TStmt::Call(Expr::call(Expr::member(owner, slot), args)));
        Ok(block)
    }

    /// The parameterless base constructor, when the base is declared in
    /// source.
    fn implicit_base_call(&mut self, meta: &TypeMetadata) -> Option<TStmt> {
        let base_name = meta.base.as_deref()?;
        let base = self.metadata.get(base_name)?;
        if base.strategy != LayoutStrategy::Class {
            return None;
        }
        let slot = base
            .callables
            .values()
            .filter(|c| !c.is_static && (c.emitted_name == "new" || c.emitted_name.starts_with("new__")))
            .find(|c| c.parameters.iter().all(|p| p.has_default || p.is_params))
            .map_or_else(|| "constructor".to_string(), |c| c.constructor_name());
        let owner = self.type_reference_by_name(base_name);
        Some(TStmt::Call(Expr::call(
            Expr::member(owner, slot),
            vec![Expr::id("self")],
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use crate::Lowerer;
    use luma_source::{CompilationUnit, Modifiers, SyntaxFactory, TypeDecl, TypeInfo};
    use luma_target::print_block;

    fn lower(f: SyntaxFactory, decls: Vec<TypeDecl>, annotations: bool) -> String {
        let mut unit = CompilationUnit::new("Main.cs");
        unit.declarations = decls;
        let options = LoweringOptions {
            emit_type_annotations: annotations,
            emit_reflection_metadata: false,
            ..LoweringOptions::default()
        };
        let oracle = f.into_oracle();
        let metadata = MetadataTable::collect(std::slice::from_ref(&unit), &oracle);
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        let mut block = Vec::new();
        for decl in &unit.declarations {
            block.extend(lowerer.lower_type_decl(decl).expect("lowered"));
        }
        lowerer.ctx.assert_balanced();
        print_block(&block)
    }

    #[test]
    fn test_class_bootstrap_and_factory() {
        let mut f = SyntaxFactory::new();
        let mut class = f.class("Counter");
        class.members = vec![
            f.field("Count", &TypeInfo::int(), None, Modifiers::public()),
            f.method_decl("Reset", Modifiers::public(), vec![], None, vec![]),
        ];
        let printed = lower(f, vec![class], false);
        assert!(printed.starts_with("local Counter\ndo\n    Counter = setmetatable({}, "), "{printed}");
        assert!(printed.contains("    Counter.__index = Counter\n    Counter.__name = \"Counter\"\n"), "{printed}");
        assert!(printed.contains("    local function constructor(self)\n        self.Count = 0\n    end\n"), "{printed}");
        assert!(printed.contains("    Counter.constructor = constructor\n"), "{printed}");
        assert!(
            printed.contains(
                "    function Counter.new(...)\n        local self = setmetatable({}, Counter)\n        return constructor(self, ...) or self\n    end\n"
            ),
            "{printed}"
        );
        assert!(printed.contains("    function Counter:Reset() end\n"), "{printed}");
    }

    #[test]
    fn test_derived_constructor_calls_base_first() {
        let mut f = SyntaxFactory::new();
        let base = f.class("Animal");
        let mut derived = f.class("Dog");
        derived.base_types = vec![f.type_ref(&TypeInfo::class("Animal", "Animal"))];
        derived.members = vec![f.field("Tricks", &TypeInfo::int(), None, Modifiers::public())];
        let printed = lower(f, vec![base, derived], false);
        assert!(
            printed.contains("    local function constructor(self)\n        Animal.constructor(self)\n        self.Tricks = 0\n    end\n"),
            "{printed}"
        );
    }

    #[test]
    fn test_overloaded_constructors_get_numbered_pairs() {
        let mut f = SyntaxFactory::new();
        let mut class = f.class("Money");
        let amount = f.param("amount", &TypeInfo::int());
        class.members = vec![
            f.constructor(vec![], None, vec![]),
            f.constructor(vec![amount], None, vec![]),
        ];
        let printed = lower(f, vec![class], false);
        assert!(printed.contains("Money.constructor__1 = constructor__1\n"), "{printed}");
        assert!(printed.contains("local function constructor__2(self, amount) end\n"), "{printed}");
        assert!(printed.contains("function Money.new__2(...)\n"), "{printed}");
        assert!(!printed.contains("function Money.new(...)"), "{printed}");
    }

    #[test]
    fn test_instance_type_alias_lists_members() {
        let mut f = SyntaxFactory::new();
        let mut class = f.class("Counter");
        let mut readonly = Modifiers::public();
        readonly.is_readonly = true;
        class.members = vec![
            f.field("Limit", &TypeInfo::int(), None, readonly),
            f.field("Total", &TypeInfo::int(), None, Modifiers::public_static()),
            f.method_decl("Reset", Modifiers::public(), vec![], None, vec![]),
        ];
        let printed = lower(f, vec![class], true);
        assert!(printed.contains("export type Counter = {"), "{printed}");
        assert!(printed.contains("read Limit: number"), "{printed}");
        assert!(printed.contains("Reset: (Counter) -> ()"), "{printed}");
        assert!(!printed.contains("Total:"), "{printed}");
        assert!(printed.contains("    Counter.Total = 0\n"), "{printed}");
    }
}
