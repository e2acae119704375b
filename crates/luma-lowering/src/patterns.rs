//! Pattern compilation.
//!
//! A pattern compiles to a list of tests whose conjunction decides the match.
//! Pattern variables become `local`s queued as prerequisites. A nested value
//! (property, list element, slice) is read into a temporary guarded by every
//! test compiled before it, so reaching it never indexes a value of the
//! wrong shape:
//!
//! ```text
//! -- o is Point { X: > 0, Y: var y }
//! local _value = if CS.is(o, Point) and o.X > 0 then o.Y else nil
//! local y = _value
//! -- condition: CS.is(o, Point) and o.X > 0
//! ```

use crate::error::{LoweringError, LoweringResult};
use crate::lowerer::{Lowerer, is_stable};
use luma_source::{
    CollectionKind, ExprKind, Literal, Pattern, PatternKind, PrimitiveKind, RelationalOp,
    Subpattern, TypeInfo, TypeKind, TypeSyntax,
};
use luma_target::{BinOp, Expr, Stmt, UnOp};

/// `a and b and ...`; `true` when empty.
pub(crate) fn conjunction(tests: Vec<Expr>) -> Expr {
    let mut iter = tests.into_iter();
    match iter.next() {
        Some(first) => iter.fold(first, Expr::and),
        None => Expr::Boolean(true),
    }
}

impl Lowerer<'_> {
    /// `subject is pattern`
    pub(crate) fn lower_is(
        &mut self,
        subject: &luma_source::Expr,
        pattern: &Pattern,
    ) -> LoweringResult<Expr> {
        let value = self.lower_expr(subject)?;
        let value = self.pin_subject(value);
        let ty = self.type_of(subject.id);
        self.compile_pattern(&value, ty, pattern)
    }

    /// Subjects are tested more than once; locals and literals are reused,
    /// anything else is read once into `_subject`.
    pub(crate) fn pin_subject(&mut self, value: Expr) -> Expr {
        match value {
            Expr::Identifier(_) => value,
            other if is_stable(&other) => other,
            other => self.bind_temp("_subject", other),
        }
    }

    /// The condition under which `subject` matches `pattern`. Bindings are
    /// declared in the current scope.
    pub(crate) fn compile_pattern(
        &mut self,
        subject: &Expr,
        subject_ty: Option<&TypeInfo>,
        pattern: &Pattern,
    ) -> LoweringResult<Expr> {
        let tests = self.pattern_tests(subject, subject_ty, pattern, &[])?;
        Ok(conjunction(tests))
    }

    fn pattern_tests(
        &mut self,
        subject: &Expr,
        subject_ty: Option<&TypeInfo>,
        pattern: &Pattern,
        guard: &[Expr],
    ) -> LoweringResult<Vec<Expr>> {
        match &pattern.kind {
            PatternKind::Discard => Ok(Vec::new()),
            PatternKind::Constant(value) => {
                if matches!(value.kind, ExprKind::Literal(Literal::Null)) {
                    return Ok(vec![Expr::eq(subject.clone(), Expr::Nil)]);
                }
                let value = match self.folded_constant(value) {
                    Some(constant) => constant,
                    None => self.lower_expr(value)?,
                };
                Ok(vec![Expr::eq(subject.clone(), value)])
            }
            PatternKind::Type(ty) => Ok(vec![self.type_test(subject.clone(), ty)]),
            PatternKind::Declaration { ty, name } => {
                self.bind_pattern_variable(name, subject.clone());
                Ok(vec![self.type_test(subject.clone(), ty)])
            }
            PatternKind::Var(name) => {
                self.bind_pattern_variable(name, subject.clone());
                Ok(Vec::new())
            }
            PatternKind::Relational { op, value } => {
                let value = match self.folded_constant(value) {
                    Some(constant) => constant,
                    None => self.lower_expr(value)?,
                };
                let op = match op {
                    RelationalOp::LessThan => BinOp::Lt,
                    RelationalOp::LessThanOrEqual => BinOp::Le,
                    RelationalOp::GreaterThan => BinOp::Gt,
                    RelationalOp::GreaterThanOrEqual => BinOp::Ge,
                };
                let mut tests = Vec::with_capacity(2);
                if !subject_ty.is_some_and(is_plain_number) {
                    tests.push(Expr::ne(subject.clone(), Expr::Nil));
                }
                tests.push(Expr::binary(subject.clone(), op, value));
                Ok(tests)
            }
            PatternKind::Not(inner) => {
                let tests = self.pattern_tests(subject, subject_ty, inner, guard)?;
                if tests.is_empty() {
                    return Ok(vec![Expr::Boolean(false)]);
                }
                Ok(vec![Expr::not(conjunction(tests).paren())])
            }
            PatternKind::And(left, right) => {
                let mut tests = self.pattern_tests(subject, subject_ty, left, guard)?;
                let extended: Vec<Expr> = guard.iter().cloned().chain(tests.iter().cloned()).collect();
                tests.extend(self.pattern_tests(subject, subject_ty, right, &extended)?);
                Ok(tests)
            }
            PatternKind::Or(left, right) => {
                let left = self.pattern_tests(subject, subject_ty, left, guard)?;
                let right = self.pattern_tests(subject, subject_ty, right, guard)?;
                if left.is_empty() || right.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![Expr::or(conjunction(left), conjunction(right))])
            }
            PatternKind::Property {
                ty,
                subpatterns,
                designation,
            } => self.property_tests(
                subject,
                subject_ty,
                ty.as_ref(),
                subpatterns,
                designation.as_deref(),
                guard,
            ),
            PatternKind::List {
                elements,
                designation,
            } => self.list_tests(subject, subject_ty, elements, designation.as_deref(), guard),
            PatternKind::Slice(_) => Err(LoweringError::unsupported(
                "slice pattern",
                "a slice pattern is only valid directly inside a list pattern",
                pattern.span,
            )),
        }
    }

    fn bind_pattern_variable(&mut self, name: &str, value: Expr) {
        let emitted = self.declare_local(name);
        self.emit(Stmt::local(emitted, Some(value)));
    }

    /// Runtime type test for a type named in a pattern.
    fn type_test(&mut self, subject: Expr, syntax: &TypeSyntax) -> Expr {
        let Some(ty) = self.type_of(syntax.id) else {
            let reference = self.type_syntax_reference(syntax);
            return self.runtime.is(subject, reference);
        };
        let ty = ty.strip_nullable();
        let primitive = match ty.kind {
            TypeKind::Primitive(PrimitiveKind::Bool) => Some("boolean"),
            TypeKind::Primitive(PrimitiveKind::String | PrimitiveKind::Char) => Some("string"),
            TypeKind::Primitive(PrimitiveKind::Object) => {
                return Expr::ne(subject, Expr::Nil);
            }
            TypeKind::Primitive(_) | TypeKind::Enum => Some("number"),
            _ => None,
        };
        match primitive {
            Some(name) => Expr::eq(
                Expr::call(Expr::id("typeof"), vec![subject]),
                Expr::string(name),
            ),
            None => {
                let reference = self.type_reference(ty);
                self.runtime.is(subject, reference)
            }
        }
    }

    // =========================================================================
    // Nested values
    // =========================================================================

    /// `if <guard> then value else nil` in a temporary, or `value` itself
    /// when the sub-pattern only tests it.
    fn nested_subject(&mut self, value: Expr, guard: &[Expr], pattern: &Pattern) -> Expr {
        let direct = matches!(
            pattern.kind,
            PatternKind::Discard | PatternKind::Constant(_) | PatternKind::Relational { .. } | PatternKind::Type(_)
        );
        if direct {
            return value;
        }
        let guarded = if guard.is_empty() {
            value
        } else {
            Expr::if_else(conjunction(guard.to_vec()), value, Expr::Nil)
        };
        self.bind_temp("_value", guarded)
    }

    fn property_tests(
        &mut self,
        subject: &Expr,
        subject_ty: Option<&TypeInfo>,
        ty: Option<&TypeSyntax>,
        subpatterns: &[Subpattern],
        designation: Option<&str>,
        guard: &[Expr],
    ) -> LoweringResult<Vec<Expr>> {
        let mut tests = vec![match ty {
            Some(ty) => self.type_test(subject.clone(), ty),
            None => Expr::ne(subject.clone(), Expr::Nil),
        }];
        let owner = ty.and_then(|t| self.type_of(t.id)).or(subject_ty);
        if let Some(name) = designation {
            self.bind_pattern_variable(name, subject.clone());
        }
        for sub in subpatterns {
            let access = self.pattern_member(subject.clone(), owner, &sub.member);
            let so_far: Vec<Expr> = guard.iter().cloned().chain(tests.iter().cloned()).collect();
            let value = self.nested_subject(access, &so_far, &sub.pattern);
            let member_ty = self.type_of(sub.pattern.id);
            tests.extend(self.pattern_tests(&value, member_ty, &sub.pattern, &so_far)?);
        }
        Ok(tests)
    }

    /// Read of `member` in a property pattern.
    fn pattern_member(&self, subject: Expr, owner: Option<&TypeInfo>, member: &str) -> Expr {
        if let Some(owner) = owner {
            let owner = owner.strip_nullable();
            if owner.kind == TypeKind::Tuple
                && let Some(index) = member.strip_prefix("Item").and_then(|n| n.parse::<i64>().ok())
            {
                return Expr::index(subject, Expr::int(index));
            }
            if matches!(member, "Length" | "Count")
                && (owner.is_string() || owner.collection_kind() == CollectionKind::Sequence)
            {
                return Expr::unary(UnOp::Len, subject);
            }
            if self
                .metadata
                .get(&owner.full_name)
                .is_some_and(|meta| meta.computed_properties.contains(member))
            {
                return Expr::method_call(subject, format!("get_{member}"), Vec::new());
            }
        }
        Expr::member(subject, member)
    }

    fn list_tests(
        &mut self,
        subject: &Expr,
        subject_ty: Option<&TypeInfo>,
        elements: &[Pattern],
        designation: Option<&str>,
        guard: &[Expr],
    ) -> LoweringResult<Vec<Expr>> {
        let slice = elements
            .iter()
            .position(|e| matches!(e.kind, PatternKind::Slice(_)));
        let fixed = elements.len() - usize::from(slice.is_some());
        let length = Expr::unary(UnOp::Len, subject.clone());
        let mut tests = vec![
            Expr::eq(
                Expr::call(Expr::id("typeof"), vec![subject.clone()]),
                Expr::string("table"),
            ),
            Expr::binary(
                length.clone(),
                if slice.is_some() { BinOp::Ge } else { BinOp::Eq },
                Expr::int(fixed as i64),
            ),
        ];
        if let Some(name) = designation {
            self.bind_pattern_variable(name, subject.clone());
        }
        let element_ty = subject_ty.and_then(TypeInfo::element_type);
        let after = slice.map_or(0, |s| elements.len() - s - 1);

        for (position, element) in elements.iter().enumerate() {
            let so_far: Vec<Expr> = guard.iter().cloned().chain(tests.iter().cloned()).collect();
            let (value, ty) = match (&element.kind, slice) {
                (PatternKind::Slice(inner), Some(start)) => {
                    let Some(inner) = inner else {
                        continue;
                    };
                    // table.move(xs, start + 1, #xs - after, 1, {})
                    let end = match after {
                        0 => length.clone(),
                        n => Expr::binary(length.clone(), BinOp::Sub, Expr::int(n as i64)),
                    };
                    let rest = Expr::call(
                        Expr::path("table.move"),
                        vec![
                            subject.clone(),
                            Expr::int(start as i64 + 1),
                            end,
                            Expr::int(1),
                            Expr::empty_table(),
                        ],
                    );
                    let value = self.nested_subject(rest, &so_far, inner);
                    let sub_tests = self.pattern_tests(&value, subject_ty, inner, &so_far)?;
                    tests.extend(sub_tests);
                    continue;
                }
                (_, Some(start)) if position > start => {
                    let from_end = (elements.len() - position - 1) as i64;
                    let index = match from_end {
                        0 => length.clone(),
                        n => Expr::binary(length.clone(), BinOp::Sub, Expr::int(n)),
                    };
                    (Expr::index(subject.clone(), index), element_ty)
                }
                _ => (
                    Expr::index(subject.clone(), Expr::int(position as i64 + 1)),
                    element_ty,
                ),
            };
            let value = self.nested_subject(value, &so_far, element);
            tests.extend(self.pattern_tests(&value, ty, element, &so_far)?);
        }
        Ok(tests)
    }
}

/// A non-nullable number, where relational tests need no nil check.
fn is_plain_number(ty: &TypeInfo) -> bool {
    ty.kind != TypeKind::Nullable && ty.is_numeric()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use luma_common::Span;
    use luma_source::{CompilationUnit, NodeId, SyntaxFactory};
    use luma_target::{print_block, print_expr};

    fn pattern(kind: PatternKind) -> Pattern {
        Pattern {
            id: NodeId::NONE,
            span: Span::DUMMY,
            kind,
        }
    }

    #[test]
    fn test_relational_and_pattern() {
        let mut f = SyntaxFactory::new();
        let low = f.int(0);
        let high = f.int(10);
        let range = pattern(PatternKind::And(
            Box::new(pattern(PatternKind::Relational {
                op: RelationalOp::GreaterThanOrEqual,
                value: low,
            })),
            Box::new(pattern(PatternKind::Relational {
                op: RelationalOp::LessThan,
                value: high,
            })),
        ));
        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions::default();
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        lowerer.ctx.begin_capture();
        let condition = lowerer
            .compile_pattern(&Expr::id("n"), Some(&TypeInfo::int()), &range)
            .expect("compiled");
        assert!(lowerer.ctx.end_capture().is_empty());
        assert_eq!(print_expr(&condition), "n >= 0 and n < 10");
    }

    #[test]
    fn test_list_pattern_with_slice_binds_last() {
        let f = SyntaxFactory::new();
        let list = pattern(PatternKind::List {
            elements: vec![
                pattern(PatternKind::Discard),
                pattern(PatternKind::Slice(None)),
                pattern(PatternKind::Var("last".into())),
            ],
            designation: None,
        });
        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions::default();
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        lowerer.ctx.begin_capture();
        let condition = lowerer
            .compile_pattern(&Expr::id("xs"), None, &list)
            .expect("compiled");
        let prerequisites = lowerer.ctx.end_capture();
        assert_eq!(print_expr(&condition), "typeof(xs) == \"table\" and #xs >= 2");
        assert_eq!(
            print_block(&prerequisites),
            "local _value = if typeof(xs) == \"table\" and #xs >= 2 then xs[#xs] else nil\nlocal last = _value\n"
        );
    }

    #[test]
    fn test_not_null_pattern() {
        let mut f = SyntaxFactory::new();
        let null = f.null();
        let not_null = pattern(PatternKind::Not(Box::new(pattern(PatternKind::Constant(null)))));
        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions::default();
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        lowerer.ctx.begin_capture();
        let condition = lowerer
            .compile_pattern(&Expr::id("o"), None, &not_null)
            .expect("compiled");
        lowerer.ctx.end_capture();
        assert_eq!(print_expr(&condition), "not (o == nil)");
    }
}
