//! Intrinsic call and member shapes.
//!
//! A fixed table maps calls and members of a few framework types onto Luau
//! built-ins. Matching only looks at the resolved owner type, the member
//! name and the arity, and runs before generic call lowering.

use super::identifiers::Receiver;
use super::{adjust_index, to_string};
use crate::error::LoweringResult;
use crate::lowerer::Lowerer;
use crate::types::is_set_type;
use luma_source::{Argument, CollectionKind, ExprKind, SymbolKind, TypeInfo, TypeKind};
use luma_target::{BinOp, Expr, Stmt, UnOp};

/// Owners whose static members map onto the `math` library.
const MATH_OWNERS: &[&str] = &["System.Math", "System.MathF"];

const MATH_FUNCTIONS: &[(&str, &str)] = &[
    ("Abs", "abs"),
    ("Floor", "floor"),
    ("Ceiling", "ceil"),
    ("Sqrt", "sqrt"),
    ("Min", "min"),
    ("Max", "max"),
    ("Sin", "sin"),
    ("Cos", "cos"),
    ("Tan", "tan"),
    ("Asin", "asin"),
    ("Acos", "acos"),
    ("Atan", "atan"),
    ("Atan2", "atan2"),
    ("Exp", "exp"),
    ("Log", "log"),
    ("Log10", "log10"),
    ("Round", "round"),
    ("Sign", "sign"),
    ("Clamp", "clamp"),
];

const NUMBER_OWNERS: &[&str] = &[
    "System.Int16",
    "System.Int32",
    "System.Int64",
    "System.UInt16",
    "System.UInt32",
    "System.UInt64",
    "System.Byte",
    "System.Single",
    "System.Double",
    "System.Decimal",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StaticMacro {
    Math(&'static str),
    Pow,
    Truncate,
    Print,
    IsNullOrEmpty,
    IsNullOrWhiteSpace,
    Join,
    Concat,
    Parse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InstanceMacro {
    ToString,
    Equals,
    // string
    Upper,
    Lower,
    StringContains,
    StartsWith,
    EndsWith,
    Substring,
    StringIndexOf,
    Trim,
    Split,
    // sequence
    Append,
    Insert,
    RemoveAt,
    Clear,
    SequenceContains,
    SequenceIndexOf,
    SequenceRemove,
    Sort,
    AddRange,
    PopLast,
    PeekLast,
    PopFirst,
    PeekFirst,
    // map
    MapAdd,
    ContainsKey,
    MapRemove,
    TryGetValue,
    // set
    SetAdd,
    SetContains,
}

#[derive(Clone, Debug, PartialEq)]
enum MemberMacro {
    Length,
    MapCount,
    HasValue,
    Value,
    Constant(Expr),
}

fn static_macro(owner: &str, name: &str, arity: usize) -> Option<StaticMacro> {
    if MATH_OWNERS.contains(&owner) {
        return match name {
            "Pow" if arity == 2 => Some(StaticMacro::Pow),
            "Truncate" if arity == 1 => Some(StaticMacro::Truncate),
            "Round" if arity != 1 => None,
            _ => MATH_FUNCTIONS
                .iter()
                .find(|(source, _)| *source == name)
                .map(|(_, target)| StaticMacro::Math(target)),
        };
    }
    if NUMBER_OWNERS.contains(&owner) {
        return (name == "Parse" && arity == 1).then_some(StaticMacro::Parse);
    }
    match (owner, name, arity) {
        ("System.Console", "WriteLine" | "Write", 0 | 1) => Some(StaticMacro::Print),
        ("System.String", "IsNullOrEmpty", 1) => Some(StaticMacro::IsNullOrEmpty),
        ("System.String", "IsNullOrWhiteSpace", 1) => Some(StaticMacro::IsNullOrWhiteSpace),
        ("System.String", "Join", 2) => Some(StaticMacro::Join),
        ("System.String", "Concat", n) if n > 0 => Some(StaticMacro::Concat),
        _ => None,
    }
}

fn instance_macro(ty: Option<&TypeInfo>, name: &str, arity: usize) -> Option<InstanceMacro> {
    use InstanceMacro as M;
    if name == "ToString" && arity == 0 {
        return Some(M::ToString);
    }
    let ty = ty?.strip_nullable();
    if ty.is_string() {
        return match (name, arity) {
            ("ToUpper" | "ToUpperInvariant", 0) => Some(M::Upper),
            ("ToLower" | "ToLowerInvariant", 0) => Some(M::Lower),
            ("Contains", 1) => Some(M::StringContains),
            ("StartsWith", 1) => Some(M::StartsWith),
            ("EndsWith", 1) => Some(M::EndsWith),
            ("Substring", 1 | 2) => Some(M::Substring),
            ("IndexOf", 1) => Some(M::StringIndexOf),
            ("Trim", 0) => Some(M::Trim),
            ("Split", 1) => Some(M::Split),
            ("Equals", 1) => Some(M::Equals),
            _ => None,
        };
    }
    if ty.is_numeric() || ty.is_bool() || ty.kind == TypeKind::Enum {
        return (name == "Equals" && arity == 1).then_some(M::Equals);
    }
    if is_set_type(ty) {
        return match (name, arity) {
            ("Add", 1) => Some(M::SetAdd),
            ("Contains", 1) => Some(M::SetContains),
            ("Remove", 1) => Some(M::MapRemove),
            ("Clear", 0) => Some(M::Clear),
            _ => None,
        };
    }
    match ty.collection_kind() {
        CollectionKind::Sequence => match (ty.name.as_str(), name, arity) {
            ("Stack", "Push", 1) | ("Queue", "Enqueue", 1) => Some(M::Append),
            ("Stack", "Pop", 0) => Some(M::PopLast),
            ("Stack", "Peek", 0) => Some(M::PeekLast),
            ("Queue", "Dequeue", 0) => Some(M::PopFirst),
            ("Queue", "Peek", 0) => Some(M::PeekFirst),
            (_, "Add", 1) => Some(M::Append),
            (_, "Insert", 2) => Some(M::Insert),
            (_, "RemoveAt", 1) => Some(M::RemoveAt),
            (_, "Clear", 0) => Some(M::Clear),
            (_, "Contains", 1) => Some(M::SequenceContains),
            (_, "IndexOf", 1) => Some(M::SequenceIndexOf),
            (_, "Remove", 1) => Some(M::SequenceRemove),
            (_, "Sort", 0 | 1) => Some(M::Sort),
            (_, "AddRange", 1) => Some(M::AddRange),
            _ => None,
        },
        CollectionKind::Map => match (name, arity) {
            ("Add", 2) => Some(M::MapAdd),
            ("ContainsKey", 1) => Some(M::ContainsKey),
            ("Remove", 1) => Some(M::MapRemove),
            ("TryGetValue", 2) => Some(M::TryGetValue),
            ("Clear", 0) => Some(M::Clear),
            _ => None,
        },
        CollectionKind::NotCollection => None,
    }
}

fn static_member_macro(owner: &str, name: &str) -> Option<MemberMacro> {
    let value = match (owner, name) {
        ("System.Math" | "System.MathF", "PI") => Expr::path("math.pi"),
        ("System.Math" | "System.MathF", "E") => {
            Expr::call(Expr::path("math.exp"), vec![Expr::int(1)])
        }
        ("System.String", "Empty") => Expr::string(""),
        ("System.Int32", "MaxValue") => Expr::int(i64::from(i32::MAX)),
        ("System.Int32", "MinValue") => Expr::int(i64::from(i32::MIN)),
        ("System.Double" | "System.Single", "PositiveInfinity") => Expr::path("math.huge"),
        ("System.Double" | "System.Single", "NegativeInfinity") => {
            Expr::unary(UnOp::Neg, Expr::path("math.huge"))
        }
        ("System.Double" | "System.Single", "NaN") => {
            Expr::binary(Expr::int(0), BinOp::Div, Expr::int(0))
        }
        _ => return None,
    };
    Some(MemberMacro::Constant(value))
}

fn instance_member_macro(ty: Option<&TypeInfo>, name: &str) -> Option<MemberMacro> {
    let ty = ty?;
    if ty.kind == TypeKind::Nullable {
        return match name {
            "HasValue" => Some(MemberMacro::HasValue),
            "Value" => Some(MemberMacro::Value),
            _ => None,
        };
    }
    match (name, ty.collection_kind()) {
        ("Length", _) if ty.is_string() || ty.kind == TypeKind::Array => Some(MemberMacro::Length),
        ("Count", CollectionKind::Sequence) => Some(MemberMacro::Length),
        ("Count", CollectionKind::Map) => Some(MemberMacro::MapCount),
        _ => None,
    }
}

impl Lowerer<'_> {
    // =========================================================================
    // Members
    // =========================================================================

    pub(super) fn lower_member_macro(
        &mut self,
        expr: &luma_source::Expr,
        object: &luma_source::Expr,
        name: &str,
    ) -> LoweringResult<Option<Expr>> {
        if matches!(object.kind, ExprKind::Base) {
            return Ok(None);
        }
        if self.oracle.kind_of(object.id) == SymbolKind::Type {
            let owner = self
                .symbol_of(expr.id)
                .and_then(|s| s.containing_type.as_deref())
                .or_else(|| self.type_of(object.id).map(|t| t.full_name.as_str()));
            return Ok(owner
                .and_then(|owner| static_member_macro(owner, name))
                .map(|m| self.apply_member_macro(m, Expr::Nil)));
        }
        let Some(m) = instance_member_macro(self.type_of(object.id), name) else {
            return Ok(None);
        };
        let receiver = self.lower_expr(object)?;
        Ok(Some(self.apply_member_macro(m, receiver)))
    }

    pub(super) fn lower_bound_member_macro(
        &mut self,
        _expr: &luma_source::Expr,
        receiver: &Receiver,
        name: &str,
    ) -> Option<Expr> {
        let Receiver::Value(value, ty) = receiver else {
            return None;
        };
        let m = instance_member_macro(ty.as_ref(), name)?;
        Some(self.apply_member_macro(m, value.clone()))
    }

    fn apply_member_macro(&mut self, m: MemberMacro, receiver: Expr) -> Expr {
        match m {
            MemberMacro::Length => Expr::unary(UnOp::Len, receiver),
            MemberMacro::MapCount => {
                let count = self.ctx.fresh("_count");
                Expr::iife(vec![
                    Stmt::local(count.clone(), Some(Expr::int(0))),
                    Stmt::GenericFor {
                        vars: vec!["_".to_string()],
                        exprs: vec![receiver],
                        body: vec![Stmt::CompoundAssign {
                            target: Expr::id(count.clone()),
                            op: BinOp::Add,
                            value: Expr::int(1),
                        }],
                    },
                    Stmt::Return(vec![Expr::id(count)]),
                ])
            }
            MemberMacro::HasValue => Expr::ne(receiver, Expr::Nil),
            MemberMacro::Value => receiver,
            MemberMacro::Constant(value) => value,
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Expand an intrinsic call, or `None` when generic lowering applies.
    /// Statement-shaped expansions queue their statements and yield `nil`.
    pub(super) fn lower_call_macro(
        &mut self,
        callee: &luma_source::Expr,
        arguments: &[Argument],
        discarded: bool,
    ) -> LoweringResult<Option<Expr>> {
        let (object, name) = match &callee.kind {
            ExprKind::Member { object, name } => (Some(object.as_ref()), name.as_str()),
            ExprKind::MemberBinding(name) => (None, name.as_str()),
            _ => return Ok(None),
        };
        if arguments.iter().any(|a| a.name.is_some()) {
            return Ok(None);
        }
        let symbol = self.symbol_of(callee.id);

        if symbol.is_some_and(|s| s.is_static) {
            let owner = symbol.and_then(|s| s.containing_type.as_deref()).unwrap_or("");
            let Some(m) = static_macro(owner, name, arguments.len()) else {
                return Ok(None);
            };
            if arguments.iter().any(|a| a.ref_kind.is_by_reference()) {
                return Ok(None);
            }
            let exprs: Vec<&luma_source::Expr> = arguments.iter().map(|a| &a.expr).collect();
            let args = self.lower_ordered(&exprs)?;
            return Ok(Some(self.expand_static_macro(m, args)));
        }

        let receiver_ty = match object {
            Some(object) if matches!(object.kind, ExprKind::Base) => return Ok(None),
            Some(object) => self.type_of(object.id).cloned(),
            None => self.binding_receivers.last().and_then(|r| r.ty.clone()),
        };
        let Some(m) = instance_macro(receiver_ty.as_ref(), name, arguments.len()) else {
            return Ok(None);
        };
        let receiver = match object {
            Some(object) => self.lower_expr(object)?,
            None => match self.binding_receivers.last() {
                Some(receiver) => receiver.value.clone(),
                None => return Ok(None),
            },
        };

        if m == InstanceMacro::TryGetValue {
            let key = &arguments[0].expr;
            let (pre, key) = self.capture(|this| this.lower_expr(key))?;
            let mut earlier = vec![receiver];
            self.pin_before(&mut earlier, pre);
            let place = self.lower_place(&arguments[1].expr, false)?;
            let value = self.bind_temp("_value", Expr::index(earlier.remove(0), key));
            self.emit(place.write(value.clone()));
            return Ok(Some(Expr::ne(value, Expr::Nil)));
        }
        if arguments.iter().any(|a| a.ref_kind.is_by_reference()) {
            return Ok(None);
        }
        let exprs: Vec<&luma_source::Expr> = arguments.iter().map(|a| &a.expr).collect();
        let mut operands = self.lower_ordered_after(vec![receiver], &exprs)?;
        let receiver = operands.remove(0);
        Ok(Some(self.expand_instance_macro(m, receiver, operands, discarded)))
    }

    fn expand_static_macro(&mut self, m: StaticMacro, mut args: Vec<Expr>) -> Expr {
        match m {
            StaticMacro::Math(function) => {
                Expr::call(Expr::path(&format!("math.{function}")), args)
            }
            StaticMacro::Pow => {
                let exponent = args.pop().unwrap_or(Expr::Nil);
                let base = args.pop().unwrap_or(Expr::Nil);
                Expr::binary(base, BinOp::Pow, exponent)
            }
            StaticMacro::Truncate => {
                let value = self.spill(args.remove(0), "_value");
                truncate(value)
            }
            StaticMacro::Print => {
                if args.is_empty() {
                    args.push(Expr::string(""));
                }
                Expr::call(Expr::id("print"), args)
            }
            StaticMacro::IsNullOrEmpty => {
                let value = self.spill(args.remove(0), "_string");
                Expr::or(
                    Expr::eq(value.clone(), Expr::Nil),
                    Expr::eq(value, Expr::string("")),
                )
            }
            StaticMacro::IsNullOrWhiteSpace => {
                let value = self.spill(args.remove(0), "_string");
                Expr::or(
                    Expr::eq(value.clone(), Expr::Nil),
                    Expr::ne(
                        Expr::call(
                            Expr::path("string.match"),
                            vec![value, Expr::string("^%s*$")],
                        ),
                        Expr::Nil,
                    ),
                )
            }
            StaticMacro::Join => {
                let values = args.pop().unwrap_or(Expr::Nil);
                let separator = args.pop().unwrap_or(Expr::Nil);
                Expr::call(Expr::path("table.concat"), vec![values, separator])
            }
            StaticMacro::Concat => {
                let mut iter = args.into_iter().map(to_string);
                let first = iter.next().unwrap_or(Expr::string(""));
                iter.fold(first, |acc, piece| Expr::binary(acc, BinOp::Concat, piece))
            }
            StaticMacro::Parse => Expr::call(Expr::id("tonumber"), args),
        }
    }

    fn expand_instance_macro(
        &mut self,
        m: InstanceMacro,
        receiver: Expr,
        mut args: Vec<Expr>,
        discarded: bool,
    ) -> Expr {
        use InstanceMacro as M;
        let mut arg = |index: usize| {
            if index < args.len() {
                std::mem::replace(&mut args[index], Expr::Nil)
            } else {
                Expr::Nil
            }
        };
        match m {
            M::ToString => match receiver {
                Expr::String(_) => receiver,
                other => to_string(other),
            },
            M::Equals => Expr::eq(receiver, arg(0)),
            M::Upper => Expr::call(Expr::path("string.upper"), vec![receiver]),
            M::Lower => Expr::call(Expr::path("string.lower"), vec![receiver]),
            M::StringContains => Expr::ne(find_plain(receiver, arg(0)), Expr::Nil),
            M::StartsWith => {
                let prefix = arg(0);
                let prefix = self.spill(prefix, "_prefix");
                Expr::eq(
                    Expr::call(
                        Expr::path("string.sub"),
                        vec![receiver, Expr::int(1), Expr::unary(UnOp::Len, prefix.clone())],
                    ),
                    prefix,
                )
            }
            M::EndsWith => {
                let suffix = arg(0);
                let suffix = self.spill(suffix, "_suffix");
                Expr::or(
                    Expr::eq(suffix.clone(), Expr::string("")),
                    Expr::eq(
                        Expr::call(
                            Expr::path("string.sub"),
                            vec![
                                receiver,
                                Expr::unary(UnOp::Neg, Expr::unary(UnOp::Len, suffix.clone())),
                            ],
                        ),
                        suffix,
                    ),
                )
            }
            M::Substring => {
                let start = arg(0);
                let length = arg(1);
                if length.is_nil() {
                    return Expr::call(Expr::path("string.sub"), vec![receiver, adjust_index(start)]);
                }
                let start = self.spill(start, "_start");
                Expr::call(
                    Expr::path("string.sub"),
                    vec![
                        receiver,
                        adjust_index(start.clone()),
                        Expr::binary(start, BinOp::Add, length),
                    ],
                )
            }
            M::StringIndexOf => zero_based(find_plain(receiver, arg(0))),
            M::Trim => Expr::call(
                Expr::path("string.match"),
                vec![receiver, Expr::string("^%s*(.-)%s*$")],
            ),
            M::Split => Expr::call(Expr::path("string.split"), vec![receiver, arg(0)]),
            M::Append => self.effect(Expr::call(Expr::path("table.insert"), vec![receiver, arg(0)])),
            M::Insert => {
                let index = adjust_index(arg(0));
                let value = arg(1);
                self.effect(Expr::call(Expr::path("table.insert"), vec![receiver, index, value]))
            }
            M::RemoveAt => {
                let index = adjust_index(arg(0));
                self.effect(Expr::call(Expr::path("table.remove"), vec![receiver, index]))
            }
            M::Clear => self.effect(Expr::call(Expr::path("table.clear"), vec![receiver])),
            M::SequenceContains => Expr::ne(
                Expr::call(Expr::path("table.find"), vec![receiver, arg(0)]),
                Expr::Nil,
            ),
            M::SequenceIndexOf => {
                zero_based(Expr::call(Expr::path("table.find"), vec![receiver, arg(0)]))
            }
            M::SequenceRemove => {
                let list = self.spill(receiver, "_list");
                let index = self.bind_temp(
                    "_index",
                    Expr::call(Expr::path("table.find"), vec![list.clone(), arg(0)]),
                );
                self.emit(Stmt::if_then(
                    Expr::ne(index.clone(), Expr::Nil),
                    vec![Stmt::Call(Expr::call(
                        Expr::path("table.remove"),
                        vec![list, index.clone()],
                    ))],
                ));
                if discarded { Expr::Nil } else { Expr::ne(index, Expr::Nil) }
            }
            M::Sort => {
                let comparison = arg(0);
                let mut sort_args = vec![receiver];
                if !comparison.is_nil() {
                    let comparison = self.spill(comparison, "_compare");
                    sort_args.push(Expr::function(
                        vec![luma_target::Param::new("a"), luma_target::Param::new("b")],
                        vec![Stmt::Return(vec![Expr::binary(
                            Expr::call(comparison, vec![Expr::id("a"), Expr::id("b")]),
                            BinOp::Lt,
                            Expr::int(0),
                        )])],
                    ));
                }
                self.effect(Expr::call(Expr::path("table.sort"), sort_args))
            }
            M::AddRange => {
                let list = self.spill(receiver, "_list");
                let items = arg(0);
                let items = self.spill(items, "_items");
                self.effect(Expr::call(
                    Expr::path("table.move"),
                    vec![
                        items.clone(),
                        Expr::int(1),
                        Expr::unary(UnOp::Len, items),
                        Expr::binary(Expr::unary(UnOp::Len, list.clone()), BinOp::Add, Expr::int(1)),
                        list,
                    ],
                ))
            }
            M::PopLast => Expr::call(Expr::path("table.remove"), vec![receiver]),
            M::PeekLast => {
                let stack = self.spill(receiver, "_stack");
                Expr::index(stack.clone(), Expr::unary(UnOp::Len, stack))
            }
            M::PopFirst => Expr::call(Expr::path("table.remove"), vec![receiver, Expr::int(1)]),
            M::PeekFirst => Expr::index(receiver, Expr::int(1)),
            M::MapAdd => {
                let key = arg(0);
                let value = arg(1);
                self.emit(Stmt::assign(Expr::index(receiver, key), value));
                Expr::Nil
            }
            M::ContainsKey => Expr::ne(Expr::index(receiver, arg(0)), Expr::Nil),
            M::MapRemove => {
                let map = self.spill(receiver, "_map");
                let key = arg(0);
                let key = self.spill(key, "_key");
                let slot = Expr::index(map, key);
                let result = if discarded {
                    Expr::Nil
                } else {
                    self.bind_temp("_removed", Expr::ne(slot.clone(), Expr::Nil))
                };
                self.emit(Stmt::assign(slot, Expr::Nil));
                result
            }
            M::TryGetValue => Expr::Nil,
            M::SetAdd => {
                let set = self.spill(receiver, "_set");
                let item = arg(0);
                let item = self.spill(item, "_item");
                let slot = Expr::index(set, item);
                let result = if discarded {
                    Expr::Nil
                } else {
                    self.bind_temp("_added", Expr::eq(slot.clone(), Expr::Nil))
                };
                self.emit(Stmt::assign(slot, Expr::Boolean(true)));
                result
            }
            M::SetContains => Expr::eq(Expr::index(receiver, arg(0)), Expr::Boolean(true)),
        }
    }

    /// Queue a call statement; the expression value is `nil`.
    fn effect(&mut self, call: Expr) -> Expr {
        self.emit(Stmt::Call(call));
        Expr::Nil
    }
}

/// `string.find(s, needle, 1, true)`
fn find_plain(haystack: Expr, needle: Expr) -> Expr {
    Expr::call(
        Expr::path("string.find"),
        vec![haystack, needle, Expr::int(1), Expr::Boolean(true)],
    )
}

/// A one-based position or nil as a zero-based index or `-1`.
fn zero_based(position: Expr) -> Expr {
    Expr::binary(
        Expr::or(position, Expr::int(0)).paren(),
        BinOp::Sub,
        Expr::int(1),
    )
}

/// Truncation toward zero of a stable value.
pub(crate) fn truncate(value: Expr) -> Expr {
    Expr::if_else(
        Expr::binary(value.clone(), BinOp::Ge, Expr::int(0)),
        Expr::call(Expr::path("math.floor"), vec![value.clone()]),
        Expr::call(Expr::path("math.ceil"), vec![value]),
    )
}
