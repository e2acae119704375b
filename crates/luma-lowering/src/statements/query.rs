//! Query comprehensions.
//!
//! `from x in xs where p(x) orderby k(x) select f(x)` copies the source into
//! a `_query` table, then runs one pass per clause over it. Every clause body
//! becomes a one-parameter helper function bound in a fresh scope, so the
//! range variable never leaks into the surrounding block.

use crate::error::LoweringResult;
use crate::lowerer::Lowerer;
use crate::types::is_set_type;
use luma_source::{
    CollectionKind, Expr, ExprKind, Ordering, QueryBody, QueryClause, QueryExpr, QueryTerminal,
    TypeInfo,
};
use luma_target::{
    BinOp, Block, Expr as Target, FunctionBody, Param, Stmt as TStmt, TableField, UnOp,
};

impl Lowerer<'_> {
    pub(crate) fn lower_query(&mut self, _expr: &Expr, query: &QueryExpr) -> LoweringResult<Target> {
        let source_ty = self.type_of(query.source.id);
        let source = self.lower_expr(&query.source)?;

        // Grouping alone reads the source directly.
        if query.body.clauses.is_empty()
            && query.body.continuation.is_none()
            && let QueryTerminal::GroupBy { element, key } = &query.body.terminal
        {
            let source = self.spill(source, "_source");
            tracing::trace!("[lowering] query grouped straight from source");
            let groups = self.lower_group_by(&query.range_variable, source, source_ty, element, key)?;
            return Ok(Target::id(groups));
        }

        let result = self.ctx.fresh("_query");
        self.copy_source(&result, source, source_ty);

        let mut range = query.range_variable.as_str();
        let mut body: &QueryBody = &query.body;
        loop {
            for clause in &body.clauses {
                match clause {
                    QueryClause::Where(predicate) => self.lower_where(&result, range, predicate)?,
                    QueryClause::OrderBy(orderings) => self.lower_order_by(&result, range, orderings)?,
                }
            }
            match &body.terminal {
                QueryTerminal::Select(projection) => {
                    if !is_identity(projection, range) {
                        self.lower_select(&result, range, projection)?;
                    }
                }
                QueryTerminal::GroupBy { element, key } => {
                    let groups =
                        self.lower_group_by(range, Target::id(result.clone()), None, element, key)?;
                    self.emit(TStmt::assign(Target::id(result.clone()), Target::id(groups)));
                }
            }
            let Some(continuation) = &body.continuation else {
                break;
            };
            range = continuation.range_variable.as_str();
            body = &continuation.body;
        }
        Ok(Target::id(result))
    }

    /// `local _query = table.clone(xs)` for sequences, else a copy loop.
    fn copy_source(&mut self, result: &str, source: Target, source_ty: Option<&TypeInfo>) {
        if source_ty.is_some_and(|t| t.collection_kind() == CollectionKind::Sequence) {
            self.emit(TStmt::local(
                result,
                Some(Target::call(Target::path("table.clone"), vec![source])),
            ));
            return;
        }
        self.emit(TStmt::local(result, Some(Target::empty_table())));
        let value = self.ctx.fresh("_v");
        let insert = TStmt::Call(Target::call(
            Target::path("table.insert"),
            vec![Target::id(result), Target::id(value.clone())],
        ));
        let copy = self.iterate(source, source_ty, value, vec![insert]);
        self.emit(copy);
    }

    /// A loop over `source` that binds each element to `value`.
    fn iterate(
        &mut self,
        source: Target,
        source_ty: Option<&TypeInfo>,
        value: String,
        mut body: Block,
    ) -> TStmt {
        match source_ty {
            Some(ty) if is_set_type(ty) => TStmt::GenericFor {
                vars: vec![value],
                exprs: vec![source],
                body,
            },
            Some(ty) if ty.collection_kind() == CollectionKind::Map => {
                let key = self.ctx.fresh("_key");
                let entry = self.ctx.fresh("_entry");
                body.insert(
                    0,
                    TStmt::local(
                        value,
                        Some(Target::Table(vec![
                            TableField::Named("Key".into(), Target::id(key.clone())),
                            TableField::Named("Value".into(), Target::id(entry.clone())),
                        ])),
                    ),
                );
                TStmt::GenericFor {
                    vars: vec![key, entry],
                    exprs: vec![source],
                    body,
                }
            }
            _ => TStmt::GenericFor {
                vars: vec!["_".into(), value],
                exprs: vec![source],
                body,
            },
        }
    }

    /// `local function _name(x) return <body> end`, returning the helper's name.
    fn query_helper(&mut self, base: &str, range: &str, body: &Expr) -> LoweringResult<String> {
        let name = self.ctx.fresh(base);
        let (param, block) = self.with_function(|this| {
            let param = this.declare_local(range);
            let (mut block, value) = this.capture(|this| this.lower_expr(body))?;
            block.push(TStmt::Return(vec![value]));
            Ok((param, block))
        })?;
        self.emit(TStmt::LocalFunction {
            name: name.clone(),
            function: FunctionBody {
                params: vec![Param::new(param)],
                body: block,
                ..FunctionBody::default()
            },
        });
        Ok(name)
    }

    // =========================================================================
    // Clauses
    // =========================================================================

    /// Rejected slots are set to nil, then the survivors are compacted.
    fn lower_where(&mut self, result: &str, range: &str, predicate: &Expr) -> LoweringResult<()> {
        let helper = self.query_helper("_where", range, predicate)?;
        let count = self.ctx.fresh("_n");
        let index = self.ctx.fresh("_i");
        let kept = self.ctx.fresh("_kept");
        let slot = || Target::index(Target::id(result), Target::id(index.clone()));

        self.emit(TStmt::local(
            count.clone(),
            Some(Target::unary(UnOp::Len, Target::id(result))),
        ));
        self.emit(counted_loop(
            &index,
            &count,
            vec![TStmt::if_then(
                Target::not(Target::call(Target::id(helper), vec![slot()])),
                vec![TStmt::assign(slot(), Target::Nil)],
            )],
        ));
        self.emit(TStmt::local(kept.clone(), Some(Target::empty_table())));
        self.emit(counted_loop(
            &index,
            &count,
            vec![TStmt::if_then(
                Target::ne(slot(), Target::Nil),
                vec![TStmt::Call(Target::call(
                    Target::path("table.insert"),
                    vec![Target::id(kept.clone()), slot()],
                ))],
            )],
        ));
        self.emit(TStmt::assign(Target::id(result), Target::id(kept)));
        Ok(())
    }

    fn lower_select(&mut self, result: &str, range: &str, projection: &Expr) -> LoweringResult<()> {
        let helper = self.query_helper("_select", range, projection)?;
        let index = self.ctx.fresh("_i");
        let value = self.ctx.fresh("_v");
        self.emit(TStmt::GenericFor {
            vars: vec![index.clone(), value.clone()],
            exprs: vec![Target::id(result)],
            body: vec![TStmt::assign(
                Target::index(Target::id(result), Target::id(index)),
                Target::call(Target::id(helper), vec![Target::id(value)]),
            )],
        });
        Ok(())
    }

    /// A three-state `_compare(a, b)` over the clause's keys, in priority
    /// order, fed to `table.sort`.
    fn lower_order_by(
        &mut self,
        result: &str,
        range: &str,
        orderings: &[Ordering],
    ) -> LoweringResult<()> {
        let keys = orderings
            .iter()
            .map(|o| Ok((self.query_helper("_orderKey", range, &o.expr)?, o.descending)))
            .collect::<LoweringResult<Vec<_>>>()?;

        let compare = self.ctx.fresh("_compare");
        let mut body = Vec::with_capacity(keys.len() * 2 + 1);
        for (helper, descending) in keys {
            let left = self.ctx.fresh("_ka");
            let right = self.ctx.fresh("_kb");
            let (before, after) = if descending { (1, -1) } else { (-1, 1) };
            body.push(TStmt::Local {
                bindings: vec![
                    luma_target::Binding::new(left.clone()),
                    luma_target::Binding::new(right.clone()),
                ],
                values: vec![
                    Target::call(Target::id(helper.clone()), vec![Target::id("a")]),
                    Target::call(Target::id(helper), vec![Target::id("b")]),
                ],
            });
            body.push(TStmt::If {
                condition: Target::binary(Target::id(left.clone()), BinOp::Lt, Target::id(right.clone())),
                then_block: vec![TStmt::Return(vec![Target::int(before)])],
                else_ifs: vec![(
                    Target::binary(Target::id(left), BinOp::Gt, Target::id(right)),
                    vec![TStmt::Return(vec![Target::int(after)])],
                )],
                else_block: None,
            });
        }
        body.push(TStmt::Return(vec![Target::int(0)]));
        self.emit(TStmt::LocalFunction {
            name: compare.clone(),
            function: FunctionBody {
                params: vec![Param::new("a"), Param::new("b")],
                body,
                ..FunctionBody::default()
            },
        });

        let less = Target::function(
            vec![Param::new("a"), Param::new("b")],
            vec![TStmt::Return(vec![Target::binary(
                Target::call(Target::id(compare), vec![Target::id("a"), Target::id("b")]),
                BinOp::Lt,
                Target::int(0),
            )])],
        );
        self.emit(TStmt::Call(Target::call(
            Target::path("table.sort"),
            vec![Target::id(result), less],
        )));
        Ok(())
    }

    /// Groups in first-occurrence order of their key. Each group is a
    /// sequence of elements whose `Key` resolves through its metatable.
    /// Returns the name of the grouping table.
    fn lower_group_by(
        &mut self,
        range: &str,
        source: Target,
        source_ty: Option<&TypeInfo>,
        element: &Expr,
        key: &Expr,
    ) -> LoweringResult<String> {
        let key_helper = self.query_helper("_groupKey", range, key)?;
        let element_helper = if is_identity(element, range) {
            None
        } else {
            Some(self.query_helper("_groupElement", range, element)?)
        };

        let groups = self.ctx.fresh("_groups");
        let group_index = self.ctx.fresh("_groupIndex");
        let value = self.ctx.fresh("_v");
        let group_key = self.ctx.fresh("_key");
        let index = self.ctx.fresh("_index");
        self.emit(TStmt::local(groups.clone(), Some(Target::empty_table())));
        self.emit(TStmt::local(group_index.clone(), Some(Target::empty_table())));

        let lookup = || Target::index(Target::id(group_index.clone()), Target::id(group_key.clone()));
        let new_group = Target::call(
            Target::id("setmetatable"),
            vec![
                Target::empty_table(),
                Target::Table(vec![TableField::Named(
                    "__index".into(),
                    Target::Table(vec![TableField::Named(
                        "Key".into(),
                        Target::id(group_key.clone()),
                    )]),
                )]),
            ],
        );
        let member = match element_helper {
            Some(helper) => Target::call(Target::id(helper), vec![Target::id(value.clone())]),
            None => Target::id(value.clone()),
        };
        let body = vec![
            TStmt::local(
                group_key.clone(),
                Some(Target::call(Target::id(key_helper), vec![Target::id(value.clone())])),
            ),
            TStmt::local(index.clone(), Some(lookup())),
            TStmt::if_then(
                Target::eq(Target::id(index.clone()), Target::Nil),
                vec![
                    TStmt::Call(Target::call(
                        Target::path("table.insert"),
                        vec![Target::id(groups.clone()), new_group],
                    )),
                    TStmt::assign(
                        Target::id(index.clone()),
                        Target::unary(UnOp::Len, Target::id(groups.clone())),
                    ),
                    TStmt::assign(lookup(), Target::id(index.clone())),
                ],
            ),
            TStmt::Call(Target::call(
                Target::path("table.insert"),
                vec![
                    Target::index(Target::id(groups.clone()), Target::id(index)),
                    member,
                ],
            )),
        ];
        let grouping = self.iterate(source, source_ty, value, body);
        self.emit(grouping);
        Ok(groups)
    }
}

/// `for i = 1, n do body end`
fn counted_loop(index: &str, count: &str, body: Block) -> TStmt {
    TStmt::NumericFor {
        var: index.to_string(),
        start: Target::int(1),
        limit: Target::id(count),
        step: None,
        body,
    }
}

/// `select x` over range variable `x`.
fn is_identity(expr: &Expr, range: &str) -> bool {
    matches!(&expr.kind, ExprKind::Identifier(name) if name == range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BindingKind;
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use luma_source::{BinaryOp, CompilationUnit, SyntaxFactory};
    use luma_target::print_block;

    fn lower(f: SyntaxFactory, query: &Expr) -> String {
        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions {
            emit_type_annotations: false,
            ..LoweringOptions::default()
        };
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        lowerer.ctx.declare("items", BindingKind::Local);
        let (mut block, value) = lowerer
            .capture(|this| this.lower_expr(query))
            .expect("lowered");
        block.push(TStmt::Return(vec![value]));
        print_block(&block)
    }

    fn query(f: &mut SyntaxFactory, body: QueryBody) -> Expr {
        let source = f.local("items", TypeInfo::list(TypeInfo::int()));
        f.typed(
            ExprKind::Query(Box::new(QueryExpr {
                range_variable: "x".into(),
                source,
                body,
            })),
            TypeInfo::list(TypeInfo::int()),
        )
    }

    #[test]
    fn test_where_select_uses_helpers() {
        let mut f = SyntaxFactory::new();
        let x = f.local("x", TypeInfo::int());
        let zero = f.int(0);
        let predicate = f.binary(BinaryOp::GreaterThan, x, zero, TypeInfo::bool());
        let x = f.local("x", TypeInfo::int());
        let two = f.int(2);
        let projection = f.binary(BinaryOp::Multiply, x, two, TypeInfo::int());
        let expr = query(
            &mut f,
            QueryBody {
                clauses: vec![QueryClause::Where(predicate)],
                terminal: QueryTerminal::Select(projection),
                continuation: None,
            },
        );
        let printed = lower(f, &expr);
        assert!(printed.starts_with("local _query = table.clone(items)\n"), "{printed}");
        assert!(printed.contains("local function _where(x)\n    return x > 0\nend"), "{printed}");
        assert!(printed.contains("if not _where(_query[_i]) then"), "{printed}");
        assert!(printed.contains("_query = _kept"), "{printed}");
        assert!(printed.contains("] = _select(_v)"), "{printed}");
        assert!(printed.ends_with("return _query\n"), "{printed}");
    }

    #[test]
    fn test_group_by_alone_reads_source() {
        let mut f = SyntaxFactory::new();
        let element = f.local("x", TypeInfo::int());
        let x = f.local("x", TypeInfo::int());
        let two = f.int(2);
        let key = f.binary(BinaryOp::Modulo, x, two, TypeInfo::int());
        let expr = query(
            &mut f,
            QueryBody {
                clauses: Vec::new(),
                terminal: QueryTerminal::GroupBy { element, key },
                continuation: None,
            },
        );
        let printed = lower(f, &expr);
        assert!(!printed.contains("_query"), "{printed}");
        assert!(!printed.contains("_groupElement"), "{printed}");
        assert!(printed.contains("for _, _v in items do"), "{printed}");
        assert!(
            printed.contains("setmetatable({}, {__index = {Key = _key}})"),
            "{printed}"
        );
        assert!(printed.ends_with("return _groups\n"), "{printed}");
    }

    #[test]
    fn test_descending_order_flips_comparator() {
        let mut f = SyntaxFactory::new();
        let key = f.local("x", TypeInfo::int());
        let projection = f.local("x", TypeInfo::int());
        let expr = query(
            &mut f,
            QueryBody {
                clauses: vec![QueryClause::OrderBy(vec![Ordering {
                    expr: key,
                    descending: true,
                }])],
                terminal: QueryTerminal::Select(projection),
                continuation: None,
            },
        );
        let printed = lower(f, &expr);
        assert!(
            printed.contains(
                "if _ka < _kb then\n        return 1\n    elseif _ka > _kb then\n        return -1\n    end"
            ),
            "{printed}"
        );
        assert!(printed.contains("table.sort(_query, function(a, b)"), "{printed}");
        assert!(!printed.contains("_select"), "{printed}");
    }
}
