//! Typed source AST.
//!
//! The tree is produced by the external front-end after semantic analysis.
//! Every node that the lowering engine may need to ask the `TypeOracle`
//! about carries a `NodeId`; spans are only used for diagnostics.
//!
//! The node set is closed: lowering dispatches with exhaustive matches, so a
//! new node kind is a compile error in every builder until it is handled.

use luma_common::Span;
use serde::{Deserialize, Serialize};

/// Identity of a source node, assigned by the front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

// =============================================================================
// Compilation unit and declarations
// =============================================================================

/// One source file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationUnit {
    pub file_name: String,
    #[serde(default)]
    pub source_text: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub declarations: Vec<TypeDecl>,
    /// Top-level (global) statements, executed after all declarations.
    #[serde(default)]
    pub statements: Vec<Stmt>,
}

impl CompilationUnit {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            source_text: None,
            namespace: None,
            declarations: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Qualified name of a declaration in this unit.
    pub fn qualified_name(&self, decl: &TypeDecl) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{}", decl.name),
            _ => decl.name.clone(),
        }
    }

    /// Source text covered by `span`, if the unit carries its text.
    pub fn text_of(&self, span: Span) -> &str {
        self.source_text
            .as_deref()
            .map(|text| span.slice(text))
            .unwrap_or("")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDeclKind {
    Class,
    Struct,
    Interface,
    Enum,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accessibility {
    #[default]
    Private,
    Protected,
    Internal,
    Public,
}

/// Declaration modifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Modifiers {
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_async: bool,
    pub is_readonly: bool,
    pub is_const: bool,
    pub is_partial: bool,
}

impl Modifiers {
    pub fn public() -> Self {
        Self {
            accessibility: Accessibility::Public,
            ..Self::default()
        }
    }

    pub fn public_static() -> Self {
        Self {
            accessibility: Accessibility::Public,
            is_static: true,
            ..Self::default()
        }
    }
}

/// `[Name(args)]`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attribute {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Expr>,
}

/// A type as written in source (`List<int>`, `Foo?`, `int[]`).
///
/// The oracle resolves `id` to the semantic `TypeInfo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSyntax {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub type_arguments: Vec<TypeSyntax>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDecl {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeDeclKind,
    pub name: String,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub base_types: Vec<TypeSyntax>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Only populated for enums.
    #[serde(default)]
    pub enum_members: Vec<EnumMember>,
}

impl TypeDecl {
    pub fn constructors(&self) -> impl Iterator<Item = (&Member, &ConstructorDecl)> {
        self.members.iter().filter_map(|m| match &m.kind {
            MemberKind::Constructor(ctor) if !m.modifiers.is_static => Some((m, ctor)),
            _ => None,
        })
    }

    pub fn static_constructor(&self) -> Option<&ConstructorDecl> {
        self.members.iter().find_map(|m| match &m.kind {
            MemberKind::Constructor(ctor) if m.modifiers.is_static => Some(ctor),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumMember {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    pub kind: MemberKind,
}

impl Member {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static || self.modifiers.is_const
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MemberKind {
    Field {
        ty: TypeSyntax,
        initializer: Option<Expr>,
    },
    Property {
        ty: TypeSyntax,
        getter: Option<Accessor>,
        setter: Option<Accessor>,
        initializer: Option<Expr>,
        /// `int X => expr;`
        expression_body: Option<Expr>,
    },
    Event {
        ty: TypeSyntax,
        initializer: Option<Expr>,
    },
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Indexer {
        ty: TypeSyntax,
        parameters: Vec<Parameter>,
        getter: Option<Accessor>,
        setter: Option<Accessor>,
    },
}

impl MemberKind {
    /// An auto property has no accessor bodies and no expression body.
    pub fn is_auto_property(&self) -> bool {
        match self {
            MemberKind::Property {
                getter,
                setter,
                expression_body,
                ..
            } => {
                expression_body.is_none()
                    && getter.as_ref().is_none_or(|g| g.body.is_none())
                    && setter.as_ref().is_none_or(|s| s.body.is_none())
            }
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Accessor {
    pub id: NodeId,
    pub span: Span,
    /// `None` for auto-implemented accessors.
    pub body: Option<Body>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Body {
    Block(Vec<Stmt>),
    Expression(Box<Expr>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    #[default]
    None,
    Ref,
    Out,
    In,
}

impl RefKind {
    /// `ref`/`out` arguments are passed as getter/setter closures; `in` is by value.
    pub fn is_by_reference(self) -> bool {
        matches!(self, RefKind::Ref | RefKind::Out)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub ty: Option<TypeSyntax>,
    #[serde(default)]
    pub ref_kind: RefKind,
    #[serde(default)]
    pub default_value: Option<Expr>,
    /// `params T[] xs`
    #[serde(default)]
    pub is_params: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDecl {
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<TypeSyntax>,
    #[serde(default)]
    pub body: Option<Body>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructorInitializerKind {
    Base,
    This,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructorInitializer {
    pub id: NodeId,
    pub kind: ConstructorInitializerKind,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub initializer: Option<ConstructorInitializer>,
    #[serde(default)]
    pub body: Option<Body>,
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariableDeclarator {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    #[serde(default)]
    pub ty: Option<TypeSyntax>,
    #[serde(default)]
    pub initializer: Option<Expr>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFunctionDecl {
    pub name: String,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<TypeSyntax>,
    pub body: Body,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ForEachVariable {
    /// `foreach (var x in ...)`
    Single { id: NodeId, name: String },
    /// `foreach (var (k, v) in ...)`
    Deconstruct(Vec<(NodeId, String)>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SwitchLabel {
    Case(Expr),
    Pattern {
        pattern: Pattern,
        guard: Option<Expr>,
    },
    Default,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwitchSection {
    pub labels: Vec<SwitchLabel>,
    pub statements: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatchClause {
    pub id: NodeId,
    pub span: Span,
    #[serde(default)]
    pub ty: Option<TypeSyntax>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub filter: Option<Expr>,
    pub block: Vec<Stmt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    Expression(Expr),
    LocalDeclaration(Vec<VariableDeclarator>),
    LocalFunction(Box<LocalFunctionDecl>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
    },
    For {
        declarations: Vec<VariableDeclarator>,
        initializers: Vec<Expr>,
        condition: Option<Expr>,
        incrementors: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        variable: ForEachVariable,
        collection: Expr,
        body: Box<Stmt>,
    },
    Switch {
        governing: Expr,
        sections: Vec<SwitchSection>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Option<Expr>),
    Try {
        block: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Using {
        declarations: Vec<VariableDeclarator>,
        expression: Option<Expr>,
        body: Box<Stmt>,
    },
    YieldReturn(Expr),
    YieldBreak,
    Empty,
    // No lowering rule exists for the following; they are rejected with a
    // diagnostic naming the construct.
    Goto(String),
    Labeled {
        label: String,
        statement: Box<Stmt>,
    },
    Lock {
        expression: Expr,
        body: Box<Stmt>,
    },
    Unsafe(Vec<Stmt>),
}

impl StmtKind {
    /// Human-readable kind name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::Block(_) => "block",
            StmtKind::Expression(_) => "expression statement",
            StmtKind::LocalDeclaration(_) => "local declaration",
            StmtKind::LocalFunction(_) => "local function",
            StmtKind::If { .. } => "if statement",
            StmtKind::While { .. } => "while statement",
            StmtKind::DoWhile { .. } => "do statement",
            StmtKind::For { .. } => "for statement",
            StmtKind::ForEach { .. } => "foreach statement",
            StmtKind::Switch { .. } => "switch statement",
            StmtKind::Break => "break statement",
            StmtKind::Continue => "continue statement",
            StmtKind::Return(_) => "return statement",
            StmtKind::Throw(_) => "throw statement",
            StmtKind::Try { .. } => "try statement",
            StmtKind::Using { .. } => "using statement",
            StmtKind::YieldReturn(_) => "yield return statement",
            StmtKind::YieldBreak => "yield break statement",
            StmtKind::Empty => "empty statement",
            StmtKind::Goto(_) => "goto statement",
            StmtKind::Labeled { .. } => "labeled statement",
            StmtKind::Lock { .. } => "lock statement",
            StmtKind::Unsafe(_) => "unsafe block",
        }
    }
}

// =============================================================================
// Expressions
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseOr,
    ExclusiveOr,
    LogicalAnd,
    LogicalOr,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Negate,
    LogicalNot,
    BitwiseNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn is_increment_or_decrement(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrement
                | UnaryOp::PreDecrement
                | UnaryOp::PostIncrement
                | UnaryOp::PostDecrement
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseAnd,
    BitwiseOr,
    ExclusiveOr,
    LeftShift,
    RightShift,
    Coalesce,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Assign => return None,
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Subtract => BinaryOp::Subtract,
            AssignOp::Multiply => BinaryOp::Multiply,
            AssignOp::Divide => BinaryOp::Divide,
            AssignOp::Modulo => BinaryOp::Modulo,
            AssignOp::BitwiseAnd => BinaryOp::BitwiseAnd,
            AssignOp::BitwiseOr => BinaryOp::BitwiseOr,
            AssignOp::ExclusiveOr => BinaryOp::ExclusiveOr,
            AssignOp::LeftShift => BinaryOp::LeftShift,
            AssignOp::RightShift => BinaryOp::RightShift,
            AssignOp::Coalesce => BinaryOp::Coalesce,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Argument {
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ref_kind: RefKind,
    pub expr: Expr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum InitializerValue {
    Expr(Expr),
    /// `Member = { ... }` without `new`
    Nested(Initializer),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberInitializer {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub value: InitializerValue,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Initializer {
    /// `{ A = 1, B = { ... } }`
    Object(Vec<MemberInitializer>),
    /// `{ 1, 2, 3 }`
    Collection(Vec<Expr>),
    /// `{ ["a"] = 1 }` or `{ { "a", 1 } }`
    Dictionary(Vec<(Expr, Expr)>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LambdaExpr {
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub body: Body,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwitchArm {
    pub pattern: Pattern,
    #[serde(default)]
    pub guard: Option<Expr>,
    pub body: Expr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum InterpolationPart {
    Text(String),
    Expr(Expr),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    This,
    Base,
    Parenthesized(Box<Expr>),
    Member {
        object: Box<Expr>,
        name: String,
    },
    /// `.name` on the receiver of the enclosing conditional access.
    MemberBinding(String),
    /// `[index]` on the receiver of the enclosing conditional access.
    ElementBinding(Box<Expr>),
    /// `object?.<when_not_null>`; `when_not_null` is rooted at a binding node.
    ConditionalAccess {
        object: Box<Expr>,
        when_not_null: Box<Expr>,
    },
    Element {
        object: Box<Expr>,
        indices: Vec<Expr>,
    },
    Invocation {
        callee: Box<Expr>,
        arguments: Vec<Argument>,
    },
    ObjectCreation {
        ty: TypeSyntax,
        arguments: Vec<Argument>,
        initializer: Option<Initializer>,
    },
    ArrayCreation {
        element_type: TypeSyntax,
        /// One entry per dimension; `None` for `new int[] { ... }`.
        sizes: Vec<Option<Expr>>,
        initializer: Option<Vec<Expr>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assignment {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    Lambda(Box<LambdaExpr>),
    Await(Box<Expr>),
    Cast {
        ty: TypeSyntax,
        expr: Box<Expr>,
    },
    Is {
        expr: Box<Expr>,
        pattern: Box<Pattern>,
    },
    As {
        expr: Box<Expr>,
        ty: TypeSyntax,
    },
    Switch {
        governing: Box<Expr>,
        arms: Vec<SwitchArm>,
    },
    Query(Box<QueryExpr>),
    Interpolated(Vec<InterpolationPart>),
    TypeOf(TypeSyntax),
    NameOf(String),
    Default(Option<TypeSyntax>),
    Tuple(Vec<Expr>),
    Throw(Box<Expr>),
    /// `out var x` / `out int x`
    Declaration {
        name: String,
        ty: Option<TypeSyntax>,
    },
    Checked(Box<Expr>),
    // No lowering rule exists for the following.
    Range {
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    IndexFromEnd(Box<Expr>),
    StackAlloc(TypeSyntax),
    AddressOf(Box<Expr>),
    PointerIndirection(Box<Expr>),
}

impl ExprKind {
    /// Human-readable kind name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Literal(_) => "literal",
            ExprKind::Identifier(_) => "identifier",
            ExprKind::This => "this",
            ExprKind::Base => "base",
            ExprKind::Parenthesized(_) => "parenthesized expression",
            ExprKind::Member { .. } => "member access",
            ExprKind::MemberBinding(_) => "member binding",
            ExprKind::ElementBinding(_) => "element binding",
            ExprKind::ConditionalAccess { .. } => "conditional access",
            ExprKind::Element { .. } => "element access",
            ExprKind::Invocation { .. } => "invocation",
            ExprKind::ObjectCreation { .. } => "object creation",
            ExprKind::ArrayCreation { .. } => "array creation",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Unary { .. } => "unary expression",
            ExprKind::Assignment { .. } => "assignment",
            ExprKind::Conditional { .. } => "conditional expression",
            ExprKind::Lambda(_) => "lambda",
            ExprKind::Await(_) => "await expression",
            ExprKind::Cast { .. } => "cast",
            ExprKind::Is { .. } => "is expression",
            ExprKind::As { .. } => "as expression",
            ExprKind::Switch { .. } => "switch expression",
            ExprKind::Query(_) => "query expression",
            ExprKind::Interpolated(_) => "interpolated string",
            ExprKind::TypeOf(_) => "typeof expression",
            ExprKind::NameOf(_) => "nameof expression",
            ExprKind::Default(_) => "default expression",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::Throw(_) => "throw expression",
            ExprKind::Declaration { .. } => "declaration expression",
            ExprKind::Checked(_) => "checked expression",
            ExprKind::Range { .. } => "range expression",
            ExprKind::IndexFromEnd(_) => "index-from-end expression",
            ExprKind::StackAlloc(_) => "stackalloc expression",
            ExprKind::AddressOf(_) => "address-of expression",
            ExprKind::PointerIndirection(_) => "pointer indirection",
        }
    }
}

// =============================================================================
// Patterns
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationalOp {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: PatternKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subpattern {
    pub member: String,
    pub pattern: Pattern,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PatternKind {
    /// `_`
    Discard,
    /// `null`, `3`, `"x"`, `Color.Red`
    Constant(Expr),
    /// `Foo f`
    Declaration { ty: TypeSyntax, name: String },
    /// `var x`
    Var(String),
    /// `Foo`
    Type(TypeSyntax),
    /// `> 5`
    Relational { op: RelationalOp, value: Expr },
    Not(Box<Pattern>),
    And(Box<Pattern>, Box<Pattern>),
    Or(Box<Pattern>, Box<Pattern>),
    /// `Foo { X: 1, Y: var y } f`
    Property {
        ty: Option<TypeSyntax>,
        subpatterns: Vec<Subpattern>,
        designation: Option<String>,
    },
    /// `[1, .., var last]`
    List {
        elements: Vec<Pattern>,
        designation: Option<String>,
    },
    /// `..` or `.. var rest` inside a list pattern
    Slice(Option<Box<Pattern>>),
}

// =============================================================================
// Query expressions
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ordering {
    pub expr: Expr,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum QueryClause {
    Where(Expr),
    OrderBy(Vec<Ordering>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum QueryTerminal {
    Select(Expr),
    GroupBy { element: Expr, key: Expr },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryContinuation {
    pub range_variable: String,
    pub body: QueryBody,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub clauses: Vec<QueryClause>,
    pub terminal: QueryTerminal,
    #[serde(default)]
    pub continuation: Option<Box<QueryContinuation>>,
}

/// `from x in source <body>`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryExpr {
    pub range_variable: String,
    pub source: Expr,
    pub body: QueryBody,
}
