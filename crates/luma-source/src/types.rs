//! Semantic type descriptions handed out by the type oracle.

use serde::{Deserialize, Serialize};

/// Built-in value types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Bool,
    Char,
    String,
    Object,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
}

impl PrimitiveKind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::SByte
                | PrimitiveKind::Byte
                | PrimitiveKind::Int16
                | PrimitiveKind::UInt16
                | PrimitiveKind::Int32
                | PrimitiveKind::UInt32
                | PrimitiveKind::Int64
                | PrimitiveKind::UInt64
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer()
            || matches!(
                self,
                PrimitiveKind::Single | PrimitiveKind::Double | PrimitiveKind::Decimal
            )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
    /// `T[]`; the element type is the single type argument.
    Array,
    Primitive(PrimitiveKind),
    TypeParameter,
    Dynamic,
    /// `T?` over a value type; the underlying type is the single type argument.
    Nullable,
    Tuple,
    Void,
}

/// How a collection is indexed and iterated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionKind {
    /// Dense integer-indexed sequence; source indices are 0-based.
    Sequence,
    /// Key/value storage; keys are used as-is.
    Map,
    NotCollection,
}

/// Return shape of an iterator method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratorShape {
    /// `IEnumerable<T>`
    Enumerable,
    /// `IEnumerator<T>`
    Enumerator,
}

const SEQUENCE_TYPES: &[&str] = &[
    "List",
    "IList",
    "IReadOnlyList",
    "ICollection",
    "IReadOnlyCollection",
    "IEnumerable",
    "Queue",
    "Stack",
    "LinkedList",
    "ReadOnlyCollection",
    "ImmutableArray",
    "ImmutableList",
    "Span",
    "ReadOnlySpan",
];

const MAP_TYPES: &[&str] = &[
    "Dictionary",
    "IDictionary",
    "IReadOnlyDictionary",
    "SortedDictionary",
    "SortedList",
    "ConcurrentDictionary",
    "ImmutableDictionary",
    "HashSet",
    "ISet",
    "SortedSet",
];

/// A resolved semantic type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInfo {
    /// Simple name without namespace or arity (`List`).
    pub name: String,
    /// Namespace-qualified name (`System.Collections.Generic.List`).
    pub full_name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub type_arguments: Vec<TypeInfo>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            kind,
            type_arguments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type_arguments(mut self, args: Vec<TypeInfo>) -> Self {
        self.type_arguments = args;
        self
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        let (name, full) = match kind {
            PrimitiveKind::Bool => ("bool", "System.Boolean"),
            PrimitiveKind::Char => ("char", "System.Char"),
            PrimitiveKind::String => ("string", "System.String"),
            PrimitiveKind::Object => ("object", "System.Object"),
            PrimitiveKind::SByte => ("sbyte", "System.SByte"),
            PrimitiveKind::Byte => ("byte", "System.Byte"),
            PrimitiveKind::Int16 => ("short", "System.Int16"),
            PrimitiveKind::UInt16 => ("ushort", "System.UInt16"),
            PrimitiveKind::Int32 => ("int", "System.Int32"),
            PrimitiveKind::UInt32 => ("uint", "System.UInt32"),
            PrimitiveKind::Int64 => ("long", "System.Int64"),
            PrimitiveKind::UInt64 => ("ulong", "System.UInt64"),
            PrimitiveKind::Single => ("float", "System.Single"),
            PrimitiveKind::Double => ("double", "System.Double"),
            PrimitiveKind::Decimal => ("decimal", "System.Decimal"),
        };
        Self::new(name, full, TypeKind::Primitive(kind))
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int32)
    }

    pub fn double() -> Self {
        Self::primitive(PrimitiveKind::Double)
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Bool)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String)
    }

    pub fn object() -> Self {
        Self::primitive(PrimitiveKind::Object)
    }

    pub fn void() -> Self {
        Self::new("void", "System.Void", TypeKind::Void)
    }

    pub fn class(name: &str, full_name: &str) -> Self {
        Self::new(name, full_name, TypeKind::Class)
    }

    pub fn array(element: TypeInfo) -> Self {
        Self::new("Array", "System.Array", TypeKind::Array).with_type_arguments(vec![element])
    }

    pub fn generic(name: &str, namespace: &str, args: Vec<TypeInfo>) -> Self {
        Self::new(name, format!("{namespace}.{name}"), TypeKind::Class).with_type_arguments(args)
    }

    pub fn list(element: TypeInfo) -> Self {
        Self::generic("List", "System.Collections.Generic", vec![element])
    }

    pub fn dictionary(key: TypeInfo, value: TypeInfo) -> Self {
        Self::generic("Dictionary", "System.Collections.Generic", vec![key, value])
    }

    pub fn enumerable(element: TypeInfo) -> Self {
        let mut ty = Self::generic("IEnumerable", "System.Collections.Generic", vec![element]);
        ty.kind = TypeKind::Interface;
        ty
    }

    pub fn enumerator(element: TypeInfo) -> Self {
        let mut ty = Self::generic("IEnumerator", "System.Collections.Generic", vec![element]);
        ty.kind = TypeKind::Interface;
        ty
    }

    pub fn task(result: Option<TypeInfo>) -> Self {
        Self::generic(
            "Task",
            "System.Threading.Tasks",
            result.into_iter().collect(),
        )
    }

    /// The type itself, or the underlying type of a nullable value type.
    pub fn strip_nullable(&self) -> &TypeInfo {
        match (self.kind, self.type_arguments.first()) {
            (TypeKind::Nullable, Some(inner)) => inner,
            _ => self,
        }
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.strip_nullable().kind {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.primitive_kind().is_some_and(PrimitiveKind::is_integer)
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive_kind().is_some_and(PrimitiveKind::is_numeric)
    }

    pub fn is_string(&self) -> bool {
        self.primitive_kind() == Some(PrimitiveKind::String)
    }

    pub fn is_bool(&self) -> bool {
        self.primitive_kind() == Some(PrimitiveKind::Bool)
    }

    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    pub fn is_delegate(&self) -> bool {
        self.kind == TypeKind::Delegate
            || matches!(self.name.as_str(), "Action" | "Func" | "Predicate")
    }

    pub fn collection_kind(&self) -> CollectionKind {
        let ty = self.strip_nullable();
        if ty.kind == TypeKind::Array {
            return CollectionKind::Sequence;
        }
        let name = ty.name.as_str();
        if SEQUENCE_TYPES.contains(&name) {
            CollectionKind::Sequence
        } else if MAP_TYPES.contains(&name) {
            CollectionKind::Map
        } else {
            CollectionKind::NotCollection
        }
    }

    /// Element type of a sequence, or value type of a map.
    pub fn element_type(&self) -> Option<&TypeInfo> {
        match self.collection_kind() {
            CollectionKind::Sequence => self.type_arguments.first(),
            CollectionKind::Map => self.type_arguments.last(),
            CollectionKind::NotCollection => None,
        }
    }

    pub fn generator_shape(&self) -> Option<GeneratorShape> {
        match self.name.as_str() {
            "IEnumerable" => Some(GeneratorShape::Enumerable),
            "IEnumerator" => Some(GeneratorShape::Enumerator),
            _ => None,
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self.name.as_str(), "Task" | "ValueTask")
            && self.full_name.starts_with("System.Threading.Tasks")
    }
}
