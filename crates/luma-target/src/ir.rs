//! Target IR for lowered Luau code.
//!
//! Lowering builds these trees instead of strings; the printer walks them to
//! produce text. The tree has no back references and no source positions.
//!
//! # Structure
//!
//! - `Expr`: every value-producing construct
//! - `Stmt`: statements; a `Block` is a plain `Vec<Stmt>`
//! - `TypeNode`: type annotations and type alias bodies
//! - `Chunk`: one output file

/// Binary operators, in Luau spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
            BinOp::Concat => "..",
            BinOp::Eq => "==",
            BinOp::Ne => "~=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 3,
            BinOp::Concat => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => 6,
            BinOp::Pow => 8,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, BinOp::Concat | BinOp::Pow)
    }

    /// Operators allowed in a compound assignment (`x += 1`).
    pub fn is_compound_assignable(self) -> bool {
        matches!(
            self,
            BinOp::Add
                | BinOp::Sub
                | BinOp::Mul
                | BinOp::Div
                | BinOp::FloorDiv
                | BinOp::Mod
                | BinOp::Pow
                | BinOp::Concat
        )
    }
}

pub const UNARY_PRECEDENCE: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

impl UnOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "not ",
            UnOp::Len => "#",
        }
    }
}

pub type Block = Vec<Stmt>;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    // =========================================================================
    // Literals
    // =========================================================================
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    /// `...`
    Vararg,

    // =========================================================================
    // Names and access
    // =========================================================================
    Identifier(String),
    /// `object.name`; printed as `object["name"]` when `name` is not a valid
    /// identifier.
    Member {
        object: Box<Expr>,
        name: String,
    },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    // =========================================================================
    // Operators
    // =========================================================================
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// `if c then a else b`
    IfElse {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Parenthesized(Box<Expr>),
    /// `(expr :: T)`
    TypeCast {
        expr: Box<Expr>,
        ty: TypeNode,
    },

    // =========================================================================
    // Calls and constructors
    // =========================================================================
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `receiver:method(args)`
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Function(Box<FunctionBody>),
    Table(Vec<TableField>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableField {
    /// `value`
    Positional(Expr),
    /// `name = value`
    Named(String, Expr),
    /// `[key] = value`
    Keyed(Expr, Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeNode>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionBody {
    pub generics: Vec<String>,
    pub params: Vec<Param>,
    pub is_variadic: bool,
    pub return_type: Option<TypeNode>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub ty: Option<TypeNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `local a, b = x, y`
    Local {
        bindings: Vec<Binding>,
        values: Vec<Expr>,
    },
    /// `a, b = x, y`
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
    },
    /// `a += x`
    CompoundAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    /// A call used as a statement.
    Call(Expr),
    Do(Block),
    If {
        condition: Expr,
        then_block: Block,
        else_ifs: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },
    While {
        condition: Expr,
        body: Block,
    },
    /// `repeat body until condition`
    Repeat {
        body: Block,
        condition: Expr,
    },
    NumericFor {
        var: String,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Block,
    },
    GenericFor {
        vars: Vec<String>,
        exprs: Vec<Expr>,
        body: Block,
    },
    Return(Vec<Expr>),
    Break,
    Continue,
    LocalFunction {
        name: String,
        function: FunctionBody,
    },
    /// `function A.b.c(...)` or `function A.b:c(...)`
    FunctionDecl {
        path: Vec<String>,
        method: Option<String>,
        function: FunctionBody,
    },
    TypeAlias {
        name: String,
        generics: Vec<String>,
        ty: TypeNode,
        exported: bool,
    },
    Comment(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropertyAccess {
    #[default]
    ReadWrite,
    Read,
    Write,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeField {
    pub name: String,
    pub ty: TypeNode,
    pub access: PropertyAccess,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeNode {
    Named {
        name: String,
        args: Vec<TypeNode>,
    },
    Optional(Box<TypeNode>),
    /// `{T}`
    Array(Box<TypeNode>),
    /// `{[K]: V}`
    Map(Box<TypeNode>, Box<TypeNode>),
    Table(Vec<TypeField>),
    Function {
        params: Vec<TypeNode>,
        returns: Vec<TypeNode>,
    },
    Intersection(Vec<TypeNode>),
    Union(Vec<TypeNode>),
    Typeof(Box<Expr>),
    Any,
}

/// One lowered output file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    pub body: Block,
}

// =========================================================================
// Builder helpers
// =========================================================================

impl Expr {
    pub fn id(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn int(n: i64) -> Self {
        Self::Number(n as f64)
    }

    pub fn call(callee: Self, args: Vec<Self>) -> Self {
        Self::Call {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn method_call(receiver: Self, method: impl Into<String>, args: Vec<Self>) -> Self {
        Self::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        }
    }

    pub fn member(object: Self, name: impl Into<String>) -> Self {
        Self::Member {
            object: Box::new(object),
            name: name.into(),
        }
    }

    /// `a.b.c` from a dotted path.
    pub fn path(path: &str) -> Self {
        let mut parts = path.split('.');
        let head = Self::id(parts.next().unwrap_or_default());
        parts.fold(head, Self::member)
    }

    pub fn index(object: Self, index: Self) -> Self {
        Self::Index {
            object: Box::new(object),
            index: Box::new(index),
        }
    }

    pub fn binary(left: Self, op: BinOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnOp, operand: Self) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn not(operand: Self) -> Self {
        Self::unary(UnOp::Not, operand)
    }

    pub fn eq(left: Self, right: Self) -> Self {
        Self::binary(left, BinOp::Eq, right)
    }

    pub fn ne(left: Self, right: Self) -> Self {
        Self::binary(left, BinOp::Ne, right)
    }

    pub fn and(left: Self, right: Self) -> Self {
        Self::binary(left, BinOp::And, right)
    }

    pub fn or(left: Self, right: Self) -> Self {
        Self::binary(left, BinOp::Or, right)
    }

    pub fn if_else(condition: Self, then_expr: Self, else_expr: Self) -> Self {
        Self::IfElse {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    pub fn function(params: Vec<Param>, body: Block) -> Self {
        Self::Function(Box::new(FunctionBody {
            params,
            body,
            ..FunctionBody::default()
        }))
    }

    /// `function(params, ...) body end`
    pub fn variadic_function(params: Vec<Param>, body: Block) -> Self {
        Self::Function(Box::new(FunctionBody {
            params,
            is_variadic: true,
            body,
            ..FunctionBody::default()
        }))
    }

    pub fn array(items: Vec<Self>) -> Self {
        Self::Table(items.into_iter().map(TableField::Positional).collect())
    }

    pub fn empty_table() -> Self {
        Self::Table(Vec::new())
    }

    pub fn paren(self) -> Self {
        Self::Parenthesized(Box::new(self))
    }

    /// `(function() body end)()`
    pub fn iife(body: Block) -> Self {
        Self::call(Self::function(Vec::new(), body), Vec::new())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Literals and plain names: evaluating them twice is unobservable.
    pub fn is_pure(&self) -> bool {
        match self {
            Self::Nil
            | Self::Boolean(_)
            | Self::Number(_)
            | Self::String(_)
            | Self::Identifier(_)
            | Self::Vararg
            | Self::Function(_) => true,
            Self::Parenthesized(inner) => inner.is_pure(),
            Self::Unary { op: UnOp::Neg, operand } => operand.is_pure(),
            _ => false,
        }
    }

    /// Expressions allowed before `(`, `.`, `:` and `[` without parentheses.
    pub fn is_prefix(&self) -> bool {
        matches!(
            self,
            Self::Identifier(_)
                | Self::Member { .. }
                | Self::Index { .. }
                | Self::Call { .. }
                | Self::MethodCall { .. }
                | Self::Parenthesized(_)
                | Self::TypeCast { .. }
        )
    }

    /// Whether the expression can stand alone as a statement.
    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. } | Self::MethodCall { .. })
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Unary {
                op: UnOp::Neg,
                operand,
            } => operand.as_number().map(|n| -n),
            _ => None,
        }
    }
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: TypeNode) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
        }
    }
}

impl Binding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }
}

impl Stmt {
    pub fn local(name: impl Into<String>, value: Option<Expr>) -> Self {
        Self::Local {
            bindings: vec![Binding::new(name)],
            values: value.into_iter().collect(),
        }
    }

    pub fn local_typed(name: impl Into<String>, ty: Option<TypeNode>, value: Option<Expr>) -> Self {
        Self::Local {
            bindings: vec![Binding {
                name: name.into(),
                ty,
            }],
            values: value.into_iter().collect(),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::Assign {
            targets: vec![target],
            values: vec![value],
        }
    }

    /// A call statement. Non-call expressions are bound to `_` since Luau
    /// only accepts calls in statement position.
    pub fn expr(expr: Expr) -> Self {
        if expr.is_call() {
            Self::Call(expr)
        } else {
            Self::local("_", Some(expr))
        }
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::Return(value.into_iter().collect())
    }

    pub fn if_then(condition: Expr, then_block: Block) -> Self {
        Self::If {
            condition,
            then_block,
            else_ifs: Vec::new(),
            else_block: None,
        }
    }

    pub fn if_else(condition: Expr, then_block: Block, else_block: Block) -> Self {
        Self::If {
            condition,
            then_block,
            else_ifs: Vec::new(),
            else_block: Some(else_block),
        }
    }

    /// Whether control can never fall through this statement.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Return(_) | Self::Break | Self::Continue)
    }
}

impl TypeNode {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeNode>) -> Self {
        Self::Named {
            name: name.into(),
            args,
        }
    }

    pub fn optional(self) -> Self {
        match self {
            Self::Optional(_) | Self::Any => self,
            other => Self::Optional(Box::new(other)),
        }
    }

    pub fn array(element: TypeNode) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn map(key: TypeNode, value: TypeNode) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }
}

impl TypeField {
    pub fn new(name: impl Into<String>, ty: TypeNode, access: PropertyAccess) -> Self {
        Self {
            name: name.into(),
            ty,
            access,
        }
    }
}

/// Luau reserved words; these cannot be used as bare identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&name)
}
