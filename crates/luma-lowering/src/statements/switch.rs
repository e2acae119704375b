//! Switch statements and switch expressions.
//!
//! The governing value is read once. Each section becomes one arm of an
//! `if`/`elseif` chain whose condition ORs the section's labels, tested in
//! source order; the default section is the final `else`. An arm whose test
//! queues prerequisites (pattern bindings) opens a nested `else` block, so
//! those statements only run once every earlier arm failed.
//!
//! A `break` other than the trailing one of a section needs a native
//! target: the chain is wrapped in `repeat ... until true`, and a
//! `continue` aimed at an enclosing loop leaves the wrapper through a flag.

use crate::context::LoopKind;
use crate::error::LoweringResult;
use crate::lowerer::Lowerer;
use luma_source::{Expr, PatternKind, Stmt, StmtKind, SwitchArm, SwitchLabel, SwitchSection, TypeInfo};
use luma_target::{Block, Expr as Target, Stmt as TStmt};

/// One arm of a lowered chain.
struct Arm {
    pre: Vec<TStmt>,
    condition: Target,
    body: Block,
}

impl Lowerer<'_> {
    pub(super) fn lower_switch(
        &mut self,
        governing: &Expr,
        sections: &[SwitchSection],
    ) -> LoweringResult<Vec<TStmt>> {
        let subject = self.lower_expr(governing)?;
        let subject = self.pin_subject(subject);
        let subject_ty = self.type_of(governing.id);
        let needs_wrapper = sections.iter().any(|s| breaks_early(&s.statements));
        let flag = (needs_wrapper
            && sections
                .iter()
                .any(|s| s.statements.iter().any(|st| contains_jump(st, Jump::Continue))))
        .then(|| self.ctx.fresh("_continue"));

        let chain = self.with_scope(|this| {
            this.with_loop(LoopKind::Switch, needs_wrapper, flag.clone(), |this| {
                let mut arms = Vec::with_capacity(sections.len());
                let mut default = None;
                for section in sections {
                    if section.labels.iter().any(|l| matches!(l, SwitchLabel::Default)) {
                        default = Some(this.lower_section_body(&section.statements)?);
                        continue;
                    }
                    let (pre, condition) = this.capture(|this| {
                        this.section_condition(&subject, subject_ty, &section.labels)
                    })?;
                    let body = this.lower_section_body(&section.statements)?;
                    arms.push(Arm {
                        pre,
                        condition,
                        body,
                    });
                }
                Ok(if_chain(arms, default))
            })
        })?;

        let mut block = Vec::new();
        if let Some(flag) = &flag {
            block.push(TStmt::local(flag.clone(), Some(Target::Boolean(false))));
        }
        if needs_wrapper {
            tracing::debug!("[lowering] switch wrapped for non-trailing break");
            block.push(TStmt::Repeat {
                body: chain,
                condition: Target::Boolean(true),
            });
        } else {
            block.extend(chain);
        }
        if let Some(flag) = flag {
            let resume = self.continue_here().unwrap_or_else(|| vec![TStmt::Continue]);
            block.push(TStmt::if_then(Target::id(flag), resume));
        }
        Ok(block)
    }

    /// Section statements without the trailing `break`.
    fn lower_section_body(&mut self, stmts: &[Stmt]) -> LoweringResult<Block> {
        let stmts = match stmts.split_last() {
            Some((last, rest)) if matches!(last.kind, StmtKind::Break) => rest,
            _ => stmts,
        };
        self.lower_block(stmts)
    }

    fn section_condition(
        &mut self,
        subject: &Target,
        subject_ty: Option<&TypeInfo>,
        labels: &[SwitchLabel],
    ) -> LoweringResult<Target> {
        let mut condition: Option<Target> = None;
        for label in labels {
            let test = match label {
                SwitchLabel::Case(value) => {
                    let value = match self.folded_constant(value) {
                        Some(constant) => constant,
                        None => self.lower_expr(value)?,
                    };
                    Target::eq(subject.clone(), value)
                }
                SwitchLabel::Pattern { pattern, guard } => {
                    let test = self.compile_pattern(subject, subject_ty, pattern)?;
                    self.guarded(test, guard.as_ref())?
                }
                SwitchLabel::Default => Target::Boolean(true),
            };
            condition = Some(match condition {
                Some(previous) => Target::or(previous, test),
                None => test,
            });
        }
        Ok(condition.unwrap_or(Target::Boolean(false)))
    }

    /// `test and guard`. A guard that queues prerequisites runs them in a
    /// closure so they only happen once the pattern matched.
    fn guarded(&mut self, test: Target, guard: Option<&Expr>) -> LoweringResult<Target> {
        let Some(guard) = guard else {
            return Ok(test);
        };
        let (pre, value) = self.capture(|this| this.lower_condition(guard))?;
        let value = if pre.is_empty() {
            value
        } else {
            let mut block = pre;
            block.push(TStmt::Return(vec![value]));
            Target::iife(block)
        };
        Ok(match test {
            Target::Boolean(true) => value,
            test => Target::and(test, value),
        })
    }

    // =========================================================================
    // Switch expressions
    // =========================================================================

    /// `subject switch { p1 => v1, p2 when g => v2, _ => v3 }`. Without
    /// prerequisites this is a nested if-expression; otherwise arms assign a
    /// `_result` temporary. A switch with no catch-all arm throws when
    /// nothing matched.
    pub(crate) fn lower_switch_expr(
        &mut self,
        _expr: &Expr,
        governing: &Expr,
        arms: &[SwitchArm],
    ) -> LoweringResult<Target> {
        let subject = self.lower_expr(governing)?;
        let subject = self.pin_subject(subject);
        let subject_ty = self.type_of(governing.id);

        let mut lowered = Vec::with_capacity(arms.len());
        let mut exhaustive = false;
        for arm in arms {
            let (pre, (condition, value_pre, value)) = self.capture(|this| {
                let test = this.compile_pattern(&subject, subject_ty, &arm.pattern)?;
                let condition = this.guarded(test, arm.guard.as_ref())?;
                let (value_pre, value) = this.capture(|this| this.lower_expr(&arm.body))?;
                Ok((condition, value_pre, value))
            })?;
            lowered.push((pre, condition, value_pre, value));
            if arm.guard.is_none() && matches!(arm.pattern.kind, PatternKind::Discard | PatternKind::Var(_)) {
                exhaustive = true;
                break;
            }
        }

        let no_match = self
            .runtime
            .throw(Target::string("non-exhaustive switch expression"));

        if lowered
            .iter()
            .all(|(pre, _, value_pre, _)| pre.is_empty() && value_pre.is_empty())
        {
            let mut rev = lowered.into_iter().rev();
            let mut result = match (exhaustive, rev.next()) {
                (true, Some((_, _, _, value))) => value,
                (false, Some((_, condition, _, value))) => {
                    Target::if_else(condition, value, no_match)
                }
                (_, None) => no_match,
            };
            for (_, condition, _, value) in rev {
                result = Target::if_else(condition, value, result);
            }
            return Ok(result);
        }

        let result = self.ctx.fresh("_result");
        self.emit(TStmt::local(result.clone(), None));
        let mut chain_arms = Vec::with_capacity(lowered.len());
        let mut default = None;
        let last = lowered.len().saturating_sub(1);
        for (index, (pre, condition, mut body, value)) in lowered.into_iter().enumerate() {
            body.push(TStmt::assign(Target::id(result.clone()), value));
            if exhaustive && index == last {
                let mut block = pre;
                block.extend(body);
                default = Some(block);
            } else {
                chain_arms.push(Arm {
                    pre,
                    condition,
                    body,
                });
            }
        }
        let default = default.unwrap_or_else(|| vec![TStmt::Call(no_match)]);
        for stmt in if_chain(chain_arms, Some(default)) {
            self.emit(stmt);
        }
        Ok(Target::id(result))
    }
}

/// `pre; if c1 then b1 elseif c2 then b2 ... else default end`, opening a
/// nested `else` at the first later arm with prerequisites.
fn if_chain(arms: Vec<Arm>, default: Option<Block>) -> Block {
    let mut arms = arms.into_iter();
    let Some(first) = arms.next() else {
        return default.unwrap_or_default();
    };
    let mut block = first.pre;
    let mut else_ifs = Vec::new();
    let mut rest = Vec::new();
    for arm in arms {
        if rest.is_empty() && arm.pre.is_empty() {
            else_ifs.push((arm.condition, arm.body));
        } else {
            rest.push(arm);
        }
    }
    let else_block = if rest.is_empty() {
        default
    } else {
        Some(if_chain(rest, default))
    };
    block.push(TStmt::If {
        condition: first.condition,
        then_block: first.body,
        else_ifs,
        else_block: else_block.filter(|b| !b.is_empty()),
    });
    block
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Jump {
    Break,
    Continue,
}

/// A `break` targeting the enclosing switch other than the section's
/// trailing one.
fn breaks_early(stmts: &[Stmt]) -> bool {
    let body = match stmts.split_last() {
        Some((last, rest)) if matches!(last.kind, StmtKind::Break) => rest,
        _ => stmts,
    };
    body.iter().any(|s| contains_jump(s, Jump::Break))
}

/// Whether `stmt` holds a `jump` that leaves through the enclosing switch.
/// Loops capture both; a nested switch captures `break` only.
fn contains_jump(stmt: &Stmt, jump: Jump) -> bool {
    let any = |stmts: &[Stmt]| stmts.iter().any(|s| contains_jump(s, jump));
    match &stmt.kind {
        StmtKind::Break => jump == Jump::Break,
        StmtKind::Continue => jump == Jump::Continue,
        StmtKind::Block(stmts) | StmtKind::Unsafe(stmts) => any(stmts),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            contains_jump(then_branch, jump)
                || else_branch.as_deref().is_some_and(|s| contains_jump(s, jump))
        }
        StmtKind::Try {
            block,
            catches,
            finally,
        } => {
            any(block)
                || catches.iter().any(|c| any(&c.block))
                || finally.as_deref().is_some_and(any)
        }
        StmtKind::Using { body, .. }
        | StmtKind::Lock { body, .. }
        | StmtKind::Labeled {
            statement: body, ..
        } => contains_jump(body, jump),
        StmtKind::Switch { sections, .. } => {
            jump == Jump::Continue && sections.iter().any(|s| any(&s.statements))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BindingKind;
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use luma_source::{CompilationUnit, SyntaxFactory};
    use luma_target::print_block;

    fn lower(f: SyntaxFactory, stmts: &[Stmt]) -> String {
        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions {
            emit_type_annotations: false,
            ..LoweringOptions::default()
        };
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        lowerer.ctx.declare("x", BindingKind::Local);
        lowerer.ctx.declare("log", BindingKind::Local);
        let block = lowerer.lower_block(stmts).expect("lowered");
        print_block(&block)
    }

    fn call_stmt(f: &mut SyntaxFactory, name: &str) -> Stmt {
        let callee = f.local(name, TypeInfo::void());
        let call = f.call(callee, Vec::new(), TypeInfo::void());
        f.expr_stmt(call)
    }

    #[test]
    fn test_labels_are_ored_and_default_is_last() {
        let mut f = SyntaxFactory::new();
        let x = f.local("x", TypeInfo::int());
        let one = f.int(1);
        let two = f.int(2);
        let default_body = call_stmt(&mut f, "log");
        let brk = f.brk();
        let brk2 = f.brk();
        let first_body = call_stmt(&mut f, "log");
        let switch = f.stmt(StmtKind::Switch {
            governing: x,
            sections: vec![
                SwitchSection {
                    labels: vec![SwitchLabel::Default],
                    statements: vec![default_body, brk],
                },
                SwitchSection {
                    labels: vec![SwitchLabel::Case(one), SwitchLabel::Case(two)],
                    statements: vec![first_body, brk2],
                },
            ],
        });
        let printed = lower(f, &[switch]);
        assert_eq!(
            printed,
            "if x == 1 or x == 2 then\n    log()\nelse\n    log()\nend\n"
        );
    }

    #[test]
    fn test_early_break_wraps_chain() {
        let mut f = SyntaxFactory::new();
        let x = f.local("x", TypeInfo::int());
        let one = f.int(1);
        let flag = f.boolean(true);
        let inner_break = f.brk();
        let guard = f.if_stmt(flag, inner_break, None);
        let after = call_stmt(&mut f, "log");
        let trailing = f.brk();
        let switch = f.stmt(StmtKind::Switch {
            governing: x,
            sections: vec![SwitchSection {
                labels: vec![SwitchLabel::Case(one)],
                statements: vec![guard, after, trailing],
            }],
        });
        let printed = lower(f, &[switch]);
        assert!(printed.starts_with("repeat\n    if x == 1 then\n"), "{printed}");
        assert!(printed.ends_with("until true\n"), "{printed}");
    }

    #[test]
    fn test_jump_scan_stops_at_nested_loops() {
        let mut f = SyntaxFactory::new();
        let brk = f.brk();
        let body = f.block(vec![brk]);
        let condition = f.boolean(true);
        let inner_loop = f.while_stmt(condition, body);
        assert!(!breaks_early(&[inner_loop]));
        let brk = f.brk();
        let cont = f.cont();
        assert!(breaks_early(&[brk.clone(), cont.clone()]));
        assert!(!breaks_early(&[cont, brk]));
    }
}
