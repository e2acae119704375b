//! Builder for hand-written source trees.
//!
//! `SyntaxFactory` allocates fresh `NodeId`s and records a matching
//! `Resolution` in a `TableOracle` for every node it creates, so tests can
//! construct typed input without a front-end.

use crate::ast::{
    Accessor, Argument, AssignOp, BinaryOp, Body, CatchClause, ConstructorDecl,
    ConstructorInitializer, ConstructorInitializerKind, Expr, ExprKind, Initializer, LambdaExpr,
    Literal, Member, MemberKind, MethodDecl, Modifiers, NodeId, Parameter, RefKind, Stmt, StmtKind,
    TypeDecl, TypeDeclKind, TypeSyntax, UnaryOp, VariableDeclarator,
};
use crate::oracle::{ConstantValue, Resolution, SymbolInfo, SymbolKind, TableOracle, TypeOracle};
use crate::types::TypeInfo;
use luma_common::Span;

#[derive(Debug, Default)]
pub struct SyntaxFactory {
    next_id: u32,
    oracle: TableOracle,
}

impl SyntaxFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    pub fn oracle(&self) -> &TableOracle {
        &self.oracle
    }

    pub fn into_oracle(self) -> TableOracle {
        self.oracle
    }

    pub fn record(&mut self, id: NodeId, resolution: Resolution) {
        self.oracle.insert(id, resolution);
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// A type reference resolving to `ty`.
    pub fn type_ref(&mut self, ty: &TypeInfo) -> TypeSyntax {
        let id = self.next_id();
        let type_arguments = ty.type_arguments.iter().map(|t| self.type_ref(t)).collect();
        self.record(
            id,
            Resolution::symbol(
                SymbolKind::Type,
                SymbolInfo::new(ty.full_name.clone()),
                Some(ty.clone()),
            ),
        );
        TypeSyntax {
            id,
            span: Span::DUMMY,
            name: ty.name.clone(),
            type_arguments,
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// An expression without any recorded resolution.
    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.next_id(),
            span: Span::DUMMY,
            kind,
        }
    }

    pub fn typed(&mut self, kind: ExprKind, ty: TypeInfo) -> Expr {
        let expr = self.expr(kind);
        self.record(expr.id, Resolution::of_type(ty));
        expr
    }

    pub fn resolved(&mut self, kind: ExprKind, resolution: Resolution) -> Expr {
        let expr = self.expr(kind);
        self.record(expr.id, resolution);
        expr
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.typed(ExprKind::Literal(Literal::Int(value)), TypeInfo::int())
    }

    pub fn float(&mut self, value: f64) -> Expr {
        self.typed(ExprKind::Literal(Literal::Float(value)), TypeInfo::double())
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.typed(
            ExprKind::Literal(Literal::String(value.to_string())),
            TypeInfo::string(),
        )
    }

    pub fn boolean(&mut self, value: bool) -> Expr {
        self.typed(ExprKind::Literal(Literal::Bool(value)), TypeInfo::bool())
    }

    pub fn null(&mut self) -> Expr {
        self.expr(ExprKind::Literal(Literal::Null))
    }

    /// A reference to a local variable.
    pub fn local(&mut self, name: &str, ty: TypeInfo) -> Expr {
        self.resolved(
            ExprKind::Identifier(name.to_string()),
            Resolution::symbol(SymbolKind::Local, SymbolInfo::new(name), Some(ty)),
        )
    }

    /// A reference to a parameter declared with `ref_kind`.
    pub fn param_ref(&mut self, name: &str, ty: TypeInfo, ref_kind: RefKind) -> Expr {
        let mut symbol = SymbolInfo::new(name);
        symbol.ref_kind = ref_kind;
        self.resolved(
            ExprKind::Identifier(name.to_string()),
            Resolution::symbol(SymbolKind::Parameter, symbol, Some(ty)),
        )
    }

    pub fn this(&mut self, ty: TypeInfo) -> Expr {
        self.typed(ExprKind::This, ty)
    }

    /// A bare type name used as an expression (`Console` in `Console.WriteLine`).
    pub fn type_name(&mut self, ty: &TypeInfo) -> Expr {
        self.resolved(
            ExprKind::Identifier(ty.name.clone()),
            Resolution::symbol(
                SymbolKind::Type,
                SymbolInfo::new(ty.full_name.clone()),
                Some(ty.clone()),
            ),
        )
    }

    /// `object.name`, or a bare `name` when `object` is `None`.
    pub fn member(&mut self, object: Option<Expr>, name: &str, resolution: Resolution) -> Expr {
        let kind = match object {
            Some(object) => ExprKind::Member {
                object: Box::new(object),
                name: name.to_string(),
            },
            None => ExprKind::Identifier(name.to_string()),
        };
        self.resolved(kind, resolution)
    }

    /// An instance field or property of `owner`.
    pub fn instance_member(
        &mut self,
        object: Option<Expr>,
        kind: SymbolKind,
        name: &str,
        owner: &TypeInfo,
        ty: TypeInfo,
    ) -> Expr {
        let symbol = SymbolInfo::new(name).in_type(owner.full_name.clone());
        self.member(object, name, Resolution::symbol(kind, symbol, Some(ty)))
    }

    /// `Owner.name` for a static member.
    pub fn static_member(
        &mut self,
        owner: &TypeInfo,
        kind: SymbolKind,
        name: &str,
        ty: TypeInfo,
    ) -> Expr {
        let object = self.type_name(owner);
        let symbol = SymbolInfo::new(name)
            .in_type(owner.full_name.clone())
            .as_static();
        self.member(Some(object), name, Resolution::symbol(kind, symbol, Some(ty)))
    }

    /// `Owner.Member` for an enum member with its constant value.
    pub fn enum_member(&mut self, owner: &TypeInfo, name: &str, value: i64) -> Expr {
        let object = self.type_name(owner);
        let symbol = SymbolInfo::new(name)
            .in_type(owner.full_name.clone())
            .as_static();
        self.member(
            Some(object),
            name,
            Resolution::symbol(SymbolKind::EnumMember, symbol, Some(owner.clone()))
                .with_constant(ConstantValue::Int(value)),
        )
    }

    /// A method group used as a callee.
    pub fn method(&mut self, object: Option<Expr>, name: &str, symbol: SymbolInfo) -> Expr {
        self.member(
            object,
            name,
            Resolution::symbol(SymbolKind::Method, symbol, None),
        )
    }

    pub fn arg(&mut self, expr: Expr) -> Argument {
        Argument {
            id: self.next_id(),
            name: None,
            ref_kind: RefKind::None,
            expr,
        }
    }

    pub fn ref_arg(&mut self, expr: Expr, ref_kind: RefKind) -> Argument {
        Argument {
            ref_kind,
            ..self.arg(expr)
        }
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>, ret: TypeInfo) -> Expr {
        let arguments = args.into_iter().map(|a| self.arg(a)).collect();
        self.call_with(callee, arguments, ret)
    }

    pub fn call_with(&mut self, callee: Expr, arguments: Vec<Argument>, ret: TypeInfo) -> Expr {
        self.typed(
            ExprKind::Invocation {
                callee: Box::new(callee),
                arguments,
            },
            ret,
        )
    }

    pub fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr, ty: TypeInfo) -> Expr {
        self.typed(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr, ty: TypeInfo) -> Expr {
        self.typed(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn assign(&mut self, target: Expr, value: Expr) -> Expr {
        self.compound(AssignOp::Assign, target, value)
    }

    pub fn compound(&mut self, op: AssignOp, target: Expr, value: Expr) -> Expr {
        let ty = self.oracle.type_of(target.id).cloned();
        let kind = ExprKind::Assignment {
            op,
            target: Box::new(target),
            value: Box::new(value),
        };
        match ty {
            Some(ty) => self.typed(kind, ty),
            None => self.expr(kind),
        }
    }

    pub fn element(&mut self, object: Expr, index: Expr, ty: TypeInfo) -> Expr {
        self.typed(
            ExprKind::Element {
                object: Box::new(object),
                indices: vec![index],
            },
            ty,
        )
    }

    pub fn conditional(&mut self, condition: Expr, when_true: Expr, when_false: Expr, ty: TypeInfo) -> Expr {
        self.typed(
            ExprKind::Conditional {
                condition: Box::new(condition),
                when_true: Box::new(when_true),
                when_false: Box::new(when_false),
            },
            ty,
        )
    }

    pub fn new_object(
        &mut self,
        ty: &TypeInfo,
        args: Vec<Expr>,
        initializer: Option<Initializer>,
    ) -> Expr {
        let type_syntax = self.type_ref(ty);
        let arguments = args.into_iter().map(|a| self.arg(a)).collect();
        self.typed(
            ExprKind::ObjectCreation {
                ty: type_syntax,
                arguments,
                initializer,
            },
            ty.clone(),
        )
    }

    pub fn lambda(&mut self, parameters: Vec<Parameter>, body: Body) -> Expr {
        self.expr(ExprKind::Lambda(Box::new(LambdaExpr {
            is_async: false,
            parameters,
            body,
        })))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.next_id(),
            span: Span::DUMMY,
            kind,
        }
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expression(expr))
    }

    pub fn declarator(&mut self, name: &str, ty: TypeInfo, initializer: Option<Expr>) -> VariableDeclarator {
        let id = self.next_id();
        let type_syntax = self.type_ref(&ty);
        self.record(
            id,
            Resolution::symbol(SymbolKind::Local, SymbolInfo::new(name), Some(ty)),
        );
        VariableDeclarator {
            id,
            span: Span::DUMMY,
            name: name.to_string(),
            ty: Some(type_syntax),
            initializer,
        }
    }

    /// `T name = init;`
    pub fn declare(&mut self, name: &str, ty: TypeInfo, initializer: Option<Expr>) -> Stmt {
        let decl = self.declarator(name, ty, initializer);
        self.stmt(StmtKind::LocalDeclaration(vec![decl]))
    }

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(stmts))
    }

    pub fn ret(&mut self, expr: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(expr))
    }

    pub fn brk(&mut self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn cont(&mut self) -> Stmt {
        self.stmt(StmtKind::Continue)
    }

    pub fn if_stmt(&mut self, condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_stmt(&mut self, condition: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
        })
    }

    pub fn yield_return(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::YieldReturn(expr))
    }

    pub fn yield_break(&mut self) -> Stmt {
        self.stmt(StmtKind::YieldBreak)
    }

    pub fn try_stmt(
        &mut self,
        block: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    ) -> Stmt {
        self.stmt(StmtKind::Try {
            block,
            catches,
            finally,
        })
    }

    pub fn catch_clause(&mut self, ty: Option<&TypeInfo>, name: Option<&str>, block: Vec<Stmt>) -> CatchClause {
        let ty = ty.map(|t| self.type_ref(t));
        CatchClause {
            id: self.next_id(),
            span: Span::DUMMY,
            ty,
            name: name.map(str::to_string),
            filter: None,
            block,
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub fn param(&mut self, name: &str, ty: &TypeInfo) -> Parameter {
        let id = self.next_id();
        let type_syntax = self.type_ref(ty);
        self.record(
            id,
            Resolution::symbol(SymbolKind::Parameter, SymbolInfo::new(name), Some(ty.clone())),
        );
        Parameter {
            id,
            span: Span::DUMMY,
            name: name.to_string(),
            ty: Some(type_syntax),
            ref_kind: RefKind::None,
            default_value: None,
            is_params: false,
        }
    }

    /// A type declaration; its own id resolves to `TypeInfo` of the
    /// matching kind named `name`.
    pub fn type_decl(&mut self, kind: TypeDeclKind, name: &str) -> TypeDecl {
        let id = self.next_id();
        let ty = TypeInfo::new(name, name, decl_type_kind(kind));
        self.record(
            id,
            Resolution::symbol(SymbolKind::Type, SymbolInfo::new(name), Some(ty)),
        );
        TypeDecl {
            id,
            span: Span::DUMMY,
            kind,
            name: name.to_string(),
            type_parameters: Vec::new(),
            base_types: Vec::new(),
            modifiers: Modifiers::public(),
            attributes: Vec::new(),
            members: Vec::new(),
            enum_members: Vec::new(),
        }
    }

    pub fn class(&mut self, name: &str) -> TypeDecl {
        self.type_decl(TypeDeclKind::Class, name)
    }

    pub fn member_decl(&mut self, name: &str, modifiers: Modifiers, kind: MemberKind) -> Member {
        Member {
            id: self.next_id(),
            span: Span::DUMMY,
            name: name.to_string(),
            modifiers,
            attributes: Vec::new(),
            kind,
        }
    }

    pub fn field(&mut self, name: &str, ty: &TypeInfo, initializer: Option<Expr>, modifiers: Modifiers) -> Member {
        let ty = self.type_ref(ty);
        self.member_decl(name, modifiers, MemberKind::Field { ty, initializer })
    }

    pub fn auto_property(&mut self, name: &str, ty: &TypeInfo, modifiers: Modifiers) -> Member {
        let ty = self.type_ref(ty);
        let getter = Some(self.accessor(None));
        let setter = Some(self.accessor(None));
        self.member_decl(
            name,
            modifiers,
            MemberKind::Property {
                ty,
                getter,
                setter,
                initializer: None,
                expression_body: None,
            },
        )
    }

    /// `T this[params] { get { getter } set { setter } }`
    pub fn indexer(
        &mut self,
        ty: &TypeInfo,
        parameters: Vec<Parameter>,
        getter: Option<Vec<Stmt>>,
        setter: Option<Vec<Stmt>>,
    ) -> Member {
        let ty = self.type_ref(ty);
        let getter = getter.map(|stmts| self.accessor(Some(Body::Block(stmts))));
        let setter = setter.map(|stmts| self.accessor(Some(Body::Block(stmts))));
        self.member_decl(
            "Item",
            Modifiers::public(),
            MemberKind::Indexer {
                ty,
                parameters,
                getter,
                setter,
            },
        )
    }

    pub fn accessor(&mut self, body: Option<Body>) -> Accessor {
        Accessor {
            id: self.next_id(),
            span: Span::DUMMY,
            body,
        }
    }

    pub fn method_decl(
        &mut self,
        name: &str,
        modifiers: Modifiers,
        parameters: Vec<Parameter>,
        return_type: Option<&TypeInfo>,
        body: Vec<Stmt>,
    ) -> Member {
        let return_type = return_type.map(|t| self.type_ref(t));
        self.member_decl(
            name,
            modifiers,
            MemberKind::Method(MethodDecl {
                type_parameters: Vec::new(),
                parameters,
                return_type,
                body: Some(Body::Block(body)),
            }),
        )
    }

    pub fn constructor(
        &mut self,
        parameters: Vec<Parameter>,
        chained: Option<(ConstructorInitializerKind, Vec<Expr>)>,
        body: Vec<Stmt>,
    ) -> Member {
        let initializer = chained.map(|(kind, args)| ConstructorInitializer {
            id: self.next_id(),
            kind,
            arguments: args.into_iter().map(|a| self.arg(a)).collect(),
        });
        self.member_decl(
            ".ctor",
            Modifiers::public(),
            MemberKind::Constructor(ConstructorDecl {
                parameters,
                initializer,
                body: Some(Body::Block(body)),
            }),
        )
    }
}

fn decl_type_kind(kind: TypeDeclKind) -> crate::types::TypeKind {
    use crate::types::TypeKind;
    match kind {
        TypeDeclKind::Class => TypeKind::Class,
        TypeDeclKind::Struct => TypeKind::Struct,
        TypeDeclKind::Interface => TypeKind::Interface,
        TypeDeclKind::Enum => TypeKind::Enum,
    }
}
