//! The type oracle: read-only semantic facts about source nodes.
//!
//! The front-end resolves every expression, declaration and type reference
//! before lowering starts. Lowering only ever asks questions; it never mutates
//! the oracle, so one oracle is shared by every file lowered in parallel.

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, NodeId, RefKind, UnaryOp};
use crate::types::TypeInfo;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Local,
    Parameter,
    Field,
    Property,
    Event,
    Method,
    Constructor,
    Type,
    EnumMember,
    Namespace,
    Indexer,
    RangeVariable,
    /// A computed value with no declared symbol (`a + b`).
    Expression,
    #[default]
    Unknown,
}

impl SymbolKind {
    pub fn is_member(self) -> bool {
        matches!(
            self,
            SymbolKind::Field
                | SymbolKind::Property
                | SymbolKind::Event
                | SymbolKind::Method
                | SymbolKind::Indexer
        )
    }
}

/// The declared symbol a node refers to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SymbolInfo {
    pub name: String,
    /// Full name of the declaring type, for members.
    pub containing_type: Option<String>,
    /// Declaring node, when the declaration is in source.
    pub declaration: Option<NodeId>,
    pub is_static: bool,
    pub ref_kind: RefKind,
    /// Extension methods are invoked as `Type.M(receiver, ...)`.
    pub is_extension: bool,
    /// Properties with user accessor bodies are lowered to `get_X`/`set_X` calls.
    pub has_accessor_bodies: bool,
}

impl SymbolInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn in_type(mut self, containing_type: impl Into<String>) -> Self {
        self.containing_type = Some(containing_type.into());
        self
    }

    #[must_use]
    pub fn declared_at(mut self, declaration: NodeId) -> Self {
        self.declaration = Some(declaration);
        self
    }

    #[must_use]
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// A compile-time constant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
}

impl ConstantValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstantValue::Int(v) => Some(*v),
            ConstantValue::Char(c) => Some(i64::from(u32::from(*c))),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstantValue::Float(v) => Some(*v),
            ConstantValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Null => ConstantValue::Null,
            Literal::Bool(b) => ConstantValue::Bool(*b),
            Literal::Int(v) => ConstantValue::Int(*v),
            Literal::Float(v) => ConstantValue::Float(*v),
            Literal::String(s) => ConstantValue::String(s.clone()),
            Literal::Char(c) => ConstantValue::Char(*c),
        }
    }
}

/// Everything the front-end knows about one node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub kind: SymbolKind,
    pub symbol: Option<SymbolInfo>,
    pub ty: Option<TypeInfo>,
    pub constant: Option<ConstantValue>,
}

impl Resolution {
    pub fn of_type(ty: TypeInfo) -> Self {
        Self {
            kind: SymbolKind::Expression,
            ty: Some(ty),
            ..Self::default()
        }
    }

    pub fn symbol(kind: SymbolKind, symbol: SymbolInfo, ty: Option<TypeInfo>) -> Self {
        Self {
            kind,
            symbol: Some(symbol),
            ty,
            constant: None,
        }
    }

    #[must_use]
    pub fn with_constant(mut self, constant: ConstantValue) -> Self {
        self.constant = Some(constant);
        self
    }
}

/// Read-only semantic queries. Implementations must be deterministic and
/// side-effect free.
pub trait TypeOracle {
    fn resolve(&self, node: NodeId) -> Option<&Resolution>;

    /// Compile-time value of `expr`, if it has one.
    fn constant_fold(&self, expr: &Expr) -> Option<ConstantValue>;

    fn type_of(&self, node: NodeId) -> Option<&TypeInfo> {
        self.resolve(node).and_then(|r| r.ty.as_ref())
    }

    fn symbol_of(&self, node: NodeId) -> Option<&SymbolInfo> {
        self.resolve(node).and_then(|r| r.symbol.as_ref())
    }

    fn kind_of(&self, node: NodeId) -> SymbolKind {
        self.resolve(node).map_or(SymbolKind::Unknown, |r| r.kind)
    }
}

/// Hash-table backed oracle, deserialized from the front-end's export or
/// filled in by hand in tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableOracle {
    resolutions: FxHashMap<NodeId, Resolution>,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, resolution: Resolution) {
        self.resolutions.insert(node, resolution);
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    fn fold(&self, expr: &Expr) -> Option<ConstantValue> {
        if let Some(constant) = self.resolutions.get(&expr.id).and_then(|r| r.constant.clone()) {
            return Some(constant);
        }
        match &expr.kind {
            ExprKind::Literal(literal) => Some(ConstantValue::from_literal(literal)),
            ExprKind::Parenthesized(inner) | ExprKind::Checked(inner) => self.fold(inner),
            ExprKind::Unary { op, operand } => {
                let value = self.fold(operand)?;
                match (op, value) {
                    (UnaryOp::Negate, ConstantValue::Int(v)) => v.checked_neg().map(ConstantValue::Int),
                    (UnaryOp::Negate, ConstantValue::Float(v)) => Some(ConstantValue::Float(-v)),
                    (UnaryOp::Plus, v @ (ConstantValue::Int(_) | ConstantValue::Float(_))) => Some(v),
                    (UnaryOp::LogicalNot, ConstantValue::Bool(b)) => Some(ConstantValue::Bool(!b)),
                    (UnaryOp::BitwiseNot, ConstantValue::Int(v)) => Some(ConstantValue::Int(!v)),
                    _ => None,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.fold(left)?;
                let right = self.fold(right)?;
                fold_binary(*op, &left, &right)
            }
            _ => None,
        }
    }
}

fn fold_binary(op: BinaryOp, left: &ConstantValue, right: &ConstantValue) -> Option<ConstantValue> {
    use ConstantValue as C;
    match (left, right) {
        (C::Int(a), C::Int(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                BinaryOp::Add => C::Int(a.checked_add(b)?),
                BinaryOp::Subtract => C::Int(a.checked_sub(b)?),
                BinaryOp::Multiply => C::Int(a.checked_mul(b)?),
                BinaryOp::Divide => C::Int(a.checked_div(b)?),
                BinaryOp::Modulo => C::Int(a.checked_rem(b)?),
                BinaryOp::LeftShift => C::Int(a.checked_shl(u32::try_from(b).ok()?)?),
                BinaryOp::RightShift => C::Int(a.checked_shr(u32::try_from(b).ok()?)?),
                BinaryOp::BitwiseAnd => C::Int(a & b),
                BinaryOp::BitwiseOr => C::Int(a | b),
                BinaryOp::ExclusiveOr => C::Int(a ^ b),
                BinaryOp::Equals => C::Bool(a == b),
                BinaryOp::NotEquals => C::Bool(a != b),
                BinaryOp::LessThan => C::Bool(a < b),
                BinaryOp::LessThanOrEqual => C::Bool(a <= b),
                BinaryOp::GreaterThan => C::Bool(a > b),
                BinaryOp::GreaterThanOrEqual => C::Bool(a >= b),
                _ => return None,
            })
        }
        (C::Float(_) | C::Int(_), C::Float(_) | C::Int(_)) => {
            let (a, b) = (left.as_f64()?, right.as_f64()?);
            Some(match op {
                BinaryOp::Add => C::Float(a + b),
                BinaryOp::Subtract => C::Float(a - b),
                BinaryOp::Multiply => C::Float(a * b),
                BinaryOp::Divide => C::Float(a / b),
                BinaryOp::LessThan => C::Bool(a < b),
                BinaryOp::LessThanOrEqual => C::Bool(a <= b),
                BinaryOp::GreaterThan => C::Bool(a > b),
                BinaryOp::GreaterThanOrEqual => C::Bool(a >= b),
                _ => return None,
            })
        }
        (C::String(a), C::String(b)) => match op {
            BinaryOp::Add => Some(C::String(format!("{a}{b}"))),
            BinaryOp::Equals => Some(C::Bool(a == b)),
            BinaryOp::NotEquals => Some(C::Bool(a != b)),
            _ => None,
        },
        (C::Bool(a), C::Bool(b)) => match op {
            BinaryOp::LogicalAnd => Some(C::Bool(*a && *b)),
            BinaryOp::LogicalOr => Some(C::Bool(*a || *b)),
            BinaryOp::Equals => Some(C::Bool(a == b)),
            BinaryOp::NotEquals => Some(C::Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

impl TypeOracle for TableOracle {
    fn resolve(&self, node: NodeId) -> Option<&Resolution> {
        self.resolutions.get(&node)
    }

    fn constant_fold(&self, expr: &Expr) -> Option<ConstantValue> {
        self.fold(expr)
    }
}
