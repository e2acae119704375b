//! Read-only traversal over the source AST.
//!
//! Implement `Visitor` and override the hooks of interest; call the matching
//! `walk_*` function from an override to keep descending.

use crate::ast::{
    Body, Expr, ExprKind, ForEachVariable, Initializer, InitializerValue, InterpolationPart,
    Pattern, PatternKind, QueryBody, QueryClause, QueryTerminal, Stmt, StmtKind, SwitchLabel,
};

pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        walk_pattern(self, pattern);
    }

    /// Bodies of lambdas and local functions. Override to stop at function
    /// boundaries.
    fn visit_nested_body(&mut self, body: &Body) {
        walk_body(self, body);
    }
}

pub fn walk_body<V: Visitor + ?Sized>(v: &mut V, body: &Body) {
    match body {
        Body::Block(stmts) => {
            for stmt in stmts {
                v.visit_stmt(stmt);
            }
        }
        Body::Expression(expr) => v.visit_expr(expr),
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Block(stmts) | StmtKind::Unsafe(stmts) => {
            for s in stmts {
                v.visit_stmt(s);
            }
        }
        StmtKind::Expression(expr) | StmtKind::YieldReturn(expr) => v.visit_expr(expr),
        StmtKind::LocalDeclaration(decls) => {
            for decl in decls {
                if let Some(init) = &decl.initializer {
                    v.visit_expr(init);
                }
            }
        }
        StmtKind::LocalFunction(func) => v.visit_nested_body(&func.body),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            v.visit_expr(condition);
            v.visit_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                v.visit_stmt(else_branch);
            }
        }
        StmtKind::While { condition, body } | StmtKind::DoWhile { body, condition } => {
            v.visit_expr(condition);
            v.visit_stmt(body);
        }
        StmtKind::For {
            declarations,
            initializers,
            condition,
            incrementors,
            body,
        } => {
            for decl in declarations {
                if let Some(init) = &decl.initializer {
                    v.visit_expr(init);
                }
            }
            for e in initializers {
                v.visit_expr(e);
            }
            if let Some(condition) = condition {
                v.visit_expr(condition);
            }
            for e in incrementors {
                v.visit_expr(e);
            }
            v.visit_stmt(body);
        }
        StmtKind::ForEach {
            variable: _,
            collection,
            body,
        } => {
            v.visit_expr(collection);
            v.visit_stmt(body);
        }
        StmtKind::Switch {
            governing,
            sections,
        } => {
            v.visit_expr(governing);
            for section in sections {
                for label in &section.labels {
                    match label {
                        SwitchLabel::Case(e) => v.visit_expr(e),
                        SwitchLabel::Pattern { pattern, guard } => {
                            v.visit_pattern(pattern);
                            if let Some(guard) = guard {
                                v.visit_expr(guard);
                            }
                        }
                        SwitchLabel::Default => {}
                    }
                }
                for s in &section.statements {
                    v.visit_stmt(s);
                }
            }
        }
        StmtKind::Return(expr) | StmtKind::Throw(expr) => {
            if let Some(expr) = expr {
                v.visit_expr(expr);
            }
        }
        StmtKind::Try {
            block,
            catches,
            finally,
        } => {
            for s in block {
                v.visit_stmt(s);
            }
            for catch in catches {
                if let Some(filter) = &catch.filter {
                    v.visit_expr(filter);
                }
                for s in &catch.block {
                    v.visit_stmt(s);
                }
            }
            for s in finally.iter().flatten() {
                v.visit_stmt(s);
            }
        }
        StmtKind::Using {
            declarations,
            expression,
            body,
        } => {
            for decl in declarations {
                if let Some(init) = &decl.initializer {
                    v.visit_expr(init);
                }
            }
            if let Some(expression) = expression {
                v.visit_expr(expression);
            }
            v.visit_stmt(body);
        }
        StmtKind::Labeled { statement, .. } => v.visit_stmt(statement),
        StmtKind::Lock { expression, body } => {
            v.visit_expr(expression);
            v.visit_stmt(body);
        }
        StmtKind::Break
        | StmtKind::Continue
        | StmtKind::YieldBreak
        | StmtKind::Empty
        | StmtKind::Goto(_) => {}
    }
}

fn walk_initializer<V: Visitor + ?Sized>(v: &mut V, init: &Initializer) {
    match init {
        Initializer::Object(members) => {
            for member in members {
                match &member.value {
                    InitializerValue::Expr(e) => v.visit_expr(e),
                    InitializerValue::Nested(nested) => walk_initializer(v, nested),
                }
            }
        }
        Initializer::Collection(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        Initializer::Dictionary(entries) => {
            for (key, value) in entries {
                v.visit_expr(key);
                v.visit_expr(value);
            }
        }
    }
}

fn walk_query_body<V: Visitor + ?Sized>(v: &mut V, body: &QueryBody) {
    for clause in &body.clauses {
        match clause {
            QueryClause::Where(e) => v.visit_expr(e),
            QueryClause::OrderBy(orderings) => {
                for ordering in orderings {
                    v.visit_expr(&ordering.expr);
                }
            }
        }
    }
    match &body.terminal {
        QueryTerminal::Select(e) => v.visit_expr(e),
        QueryTerminal::GroupBy { element, key } => {
            v.visit_expr(element);
            v.visit_expr(key);
        }
    }
    if let Some(continuation) = &body.continuation {
        walk_query_body(v, &continuation.body);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Identifier(_)
        | ExprKind::This
        | ExprKind::Base
        | ExprKind::MemberBinding(_)
        | ExprKind::TypeOf(_)
        | ExprKind::NameOf(_)
        | ExprKind::Default(_)
        | ExprKind::Declaration { .. }
        | ExprKind::StackAlloc(_) => {}
        ExprKind::Parenthesized(e)
        | ExprKind::ElementBinding(e)
        | ExprKind::Await(e)
        | ExprKind::Throw(e)
        | ExprKind::Checked(e)
        | ExprKind::IndexFromEnd(e)
        | ExprKind::AddressOf(e)
        | ExprKind::PointerIndirection(e)
        | ExprKind::Cast { expr: e, .. }
        | ExprKind::As { expr: e, .. }
        | ExprKind::Member { object: e, .. } => v.visit_expr(e),
        ExprKind::ConditionalAccess {
            object,
            when_not_null,
        } => {
            v.visit_expr(object);
            v.visit_expr(when_not_null);
        }
        ExprKind::Element { object, indices } => {
            v.visit_expr(object);
            for index in indices {
                v.visit_expr(index);
            }
        }
        ExprKind::Invocation { callee, arguments } => {
            v.visit_expr(callee);
            for arg in arguments {
                v.visit_expr(&arg.expr);
            }
        }
        ExprKind::ObjectCreation {
            arguments,
            initializer,
            ..
        } => {
            for arg in arguments {
                v.visit_expr(&arg.expr);
            }
            if let Some(init) = initializer {
                walk_initializer(v, init);
            }
        }
        ExprKind::ArrayCreation {
            sizes, initializer, ..
        } => {
            for size in sizes.iter().flatten() {
                v.visit_expr(size);
            }
            for item in initializer.iter().flatten() {
                v.visit_expr(item);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        ExprKind::Unary { operand, .. } => v.visit_expr(operand),
        ExprKind::Assignment { target, value, .. } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        ExprKind::Conditional {
            condition,
            when_true,
            when_false,
        } => {
            v.visit_expr(condition);
            v.visit_expr(when_true);
            v.visit_expr(when_false);
        }
        ExprKind::Lambda(lambda) => v.visit_nested_body(&lambda.body),
        ExprKind::Is { expr, pattern } => {
            v.visit_expr(expr);
            v.visit_pattern(pattern);
        }
        ExprKind::Switch { governing, arms } => {
            v.visit_expr(governing);
            for arm in arms {
                v.visit_pattern(&arm.pattern);
                if let Some(guard) = &arm.guard {
                    v.visit_expr(guard);
                }
                v.visit_expr(&arm.body);
            }
        }
        ExprKind::Query(query) => {
            v.visit_expr(&query.source);
            walk_query_body(v, &query.body);
        }
        ExprKind::Interpolated(parts) => {
            for part in parts {
                if let InterpolationPart::Expr(e) = part {
                    v.visit_expr(e);
                }
            }
        }
        ExprKind::Tuple(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        ExprKind::Range { start, end } => {
            if let Some(start) = start {
                v.visit_expr(start);
            }
            if let Some(end) = end {
                v.visit_expr(end);
            }
        }
    }
}

pub fn walk_pattern<V: Visitor + ?Sized>(v: &mut V, pattern: &Pattern) {
    match &pattern.kind {
        PatternKind::Discard
        | PatternKind::Declaration { .. }
        | PatternKind::Var(_)
        | PatternKind::Type(_) => {}
        PatternKind::Constant(e) | PatternKind::Relational { value: e, .. } => v.visit_expr(e),
        PatternKind::Not(p) => v.visit_pattern(p),
        PatternKind::And(a, b) | PatternKind::Or(a, b) => {
            v.visit_pattern(a);
            v.visit_pattern(b);
        }
        PatternKind::Property { subpatterns, .. } => {
            for sub in subpatterns {
                v.visit_pattern(&sub.pattern);
            }
        }
        PatternKind::List { elements, .. } => {
            for element in elements {
                v.visit_pattern(element);
            }
        }
        PatternKind::Slice(inner) => {
            if let Some(inner) = inner {
                v.visit_pattern(inner);
            }
        }
    }
}

/// Names bound by a `foreach` variable.
pub fn foreach_names(variable: &ForEachVariable) -> Vec<&str> {
    match variable {
        ForEachVariable::Single { name, .. } => vec![name.as_str()],
        ForEachVariable::Deconstruct(names) => names.iter().map(|(_, n)| n.as_str()).collect(),
    }
}

// =============================================================================
// Common queries
// =============================================================================

struct YieldFinder {
    found: bool,
}

impl Visitor for YieldFinder {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if matches!(stmt.kind, StmtKind::YieldReturn(_) | StmtKind::YieldBreak) {
            self.found = true;
            return;
        }
        walk_stmt(self, stmt);
    }

    fn visit_nested_body(&mut self, _body: &Body) {}
}

/// Whether a function body contains `yield` outside nested functions.
pub fn body_contains_yield(body: &Body) -> bool {
    let mut finder = YieldFinder { found: false };
    walk_body(&mut finder, body);
    finder.found
}

struct AssignmentFinder<'a> {
    name: &'a str,
    found: bool,
}

impl AssignmentFinder<'_> {
    fn targets_name(&self, target: &Expr) -> bool {
        match &target.kind {
            ExprKind::Identifier(n) => n == self.name,
            ExprKind::Parenthesized(inner) => self.targets_name(inner),
            _ => false,
        }
    }
}

impl Visitor for AssignmentFinder<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Assignment { target, .. } if self.targets_name(target) => {
                self.found = true;
            }
            ExprKind::Unary { op, operand }
                if op.is_increment_or_decrement() && self.targets_name(operand) =>
            {
                self.found = true;
            }
            ExprKind::Invocation { arguments, .. }
                if arguments
                    .iter()
                    .any(|a| a.ref_kind.is_by_reference() && self.targets_name(&a.expr)) =>
            {
                self.found = true;
            }
            _ => walk_expr(self, expr),
        }
    }
}

/// Whether `stmt` writes to the local `name` (assignment, increment, or
/// `ref`/`out` argument), including inside closures.
pub fn stmt_assigns(stmt: &Stmt, name: &str) -> bool {
    let mut finder = AssignmentFinder { name, found: false };
    finder.visit_stmt(stmt);
    finder.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignOp, Literal, NodeId};
    use luma_common::Span;

    fn expr(kind: ExprKind) -> Expr {
        Expr {
            id: NodeId(0),
            span: Span::DUMMY,
            kind,
        }
    }

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt {
            id: NodeId(0),
            span: Span::DUMMY,
            kind,
        }
    }

    #[test]
    fn test_stmt_assigns_detects_compound_assignment() {
        let body = stmt(StmtKind::Block(vec![stmt(StmtKind::Expression(expr(
            ExprKind::Assignment {
                op: AssignOp::Add,
                target: Box::new(expr(ExprKind::Identifier("i".into()))),
                value: Box::new(expr(ExprKind::Literal(Literal::Int(1)))),
            },
        )))]));
        assert!(stmt_assigns(&body, "i"));
        assert!(!stmt_assigns(&body, "j"));
    }

    #[test]
    fn test_yield_inside_lambda_is_not_counted() {
        let lambda = expr(ExprKind::Lambda(Box::new(crate::ast::LambdaExpr {
            is_async: false,
            parameters: Vec::new(),
            body: Body::Block(vec![stmt(StmtKind::YieldBreak)]),
        })));
        let body = Body::Block(vec![stmt(StmtKind::Expression(lambda))]);
        assert!(!body_contains_yield(&body));
        assert!(body_contains_yield(&Body::Block(vec![stmt(
            StmtKind::YieldBreak
        )])));
    }
}
