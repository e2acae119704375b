//! Luau text rendering for the target IR.
//!
//! A mechanical walk over the tree: no semantic transformation happens here.
//! Parentheses are inserted from operator precedence, so lowering never has
//! to wrap operands itself.

use crate::ir::{
    BinOp, Binding, Block, Chunk, Expr, FunctionBody, Param, PropertyAccess, Stmt, TableField,
    TypeField, TypeNode, UNARY_PRECEDENCE, UnOp, is_valid_identifier,
};
use std::fmt::Write as _;

/// Renders IR to Luau source text.
pub struct LuauPrinter {
    output: String,
    indent_level: u32,
    indent_str: &'static str,
}

impl Default for LuauPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a whole chunk.
pub fn print_chunk(chunk: &Chunk) -> String {
    let mut printer = LuauPrinter::new();
    printer.emit_block(&chunk.body);
    printer.finish()
}

/// Render a list of statements at top level.
pub fn print_block(block: &[Stmt]) -> String {
    let mut printer = LuauPrinter::new();
    printer.emit_block(block);
    printer.finish()
}

/// Render a single expression.
pub fn print_expr(expr: &Expr) -> String {
    let mut printer = LuauPrinter::new();
    printer.emit_expr(expr, 0);
    printer.finish()
}

/// Render a single type.
pub fn print_type(ty: &TypeNode) -> String {
    let mut printer = LuauPrinter::new();
    printer.emit_type(ty);
    printer.finish()
}

impl LuauPrinter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
            indent_str: "    ",
        }
    }

    pub fn finish(self) -> String {
        self.output
    }

    // =========================================================================
    // Writer
    // =========================================================================

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn write_line(&mut self) {
        self.output.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.output.push_str(self.indent_str);
        }
    }

    const fn increase_indent(&mut self) {
        self.indent_level += 1;
    }

    const fn decrease_indent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    fn write_escaped(&mut self, s: &str) {
        self.output.push('"');
        for c in s.chars() {
            match c {
                '"' => self.output.push_str("\\\""),
                '\\' => self.output.push_str("\\\\"),
                '\n' => self.output.push_str("\\n"),
                '\r' => self.output.push_str("\\r"),
                '\t' => self.output.push_str("\\t"),
                '\0' => self.output.push_str("\\0"),
                c if (c as u32) < 0x20 || c == '\x7F' => {
                    let _ = write!(self.output, "\\x{:02X}", c as u32);
                }
                _ => self.output.push(c),
            }
        }
        self.output.push('"');
    }

    fn write_number(&mut self, n: f64) {
        if n.is_nan() {
            self.write("0 / 0");
        } else if n.is_infinite() {
            self.write(if n > 0.0 { "math.huge" } else { "-math.huge" });
        } else if n.fract() == 0.0 && n.abs() < 1e15 {
            let _ = write!(self.output, "{}", n as i64);
        } else {
            let _ = write!(self.output, "{n}");
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Each statement on its own line at the current indentation.
    pub fn emit_block(&mut self, block: &[Stmt]) {
        for stmt in block {
            self.write_indent();
            self.emit_stmt(stmt);
            self.write_line();
        }
    }

    fn emit_nested_block(&mut self, block: &[Stmt]) {
        self.write_line();
        self.increase_indent();
        self.emit_block(block);
        self.decrease_indent();
        self.write_indent();
    }

    fn emit_bindings(&mut self, bindings: &[Binding]) {
        for (i, binding) in bindings.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&binding.name);
            if let Some(ty) = &binding.ty {
                self.write(": ");
                self.emit_type(ty);
            }
        }
    }

    fn emit_expr_list(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.emit_expr(expr, 0);
        }
    }

    pub fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Local { bindings, values } => {
                self.write("local ");
                self.emit_bindings(bindings);
                if !values.is_empty() {
                    self.write(" = ");
                    self.emit_expr_list(values);
                }
            }
            Stmt::Assign { targets, values } => {
                self.emit_expr_list(targets);
                self.write(" = ");
                self.emit_expr_list(values);
            }
            Stmt::CompoundAssign { target, op, value } => {
                self.emit_expr(target, 0);
                self.write(" ");
                self.write(op.as_str());
                self.write("= ");
                self.emit_expr(value, 0);
            }
            Stmt::Call(expr) => self.emit_expr(expr, 0),
            Stmt::Do(body) => {
                self.write("do");
                self.emit_nested_block(body);
                self.write("end");
            }
            Stmt::If {
                condition,
                then_block,
                else_ifs,
                else_block,
            } => {
                self.write("if ");
                self.emit_expr(condition, 0);
                self.write(" then");
                self.emit_nested_block(then_block);
                for (cond, block) in else_ifs {
                    self.write("elseif ");
                    self.emit_expr(cond, 0);
                    self.write(" then");
                    self.emit_nested_block(block);
                }
                if let Some(else_block) = else_block {
                    self.write("else");
                    self.emit_nested_block(else_block);
                }
                self.write("end");
            }
            Stmt::While { condition, body } => {
                self.write("while ");
                self.emit_expr(condition, 0);
                self.write(" do");
                self.emit_nested_block(body);
                self.write("end");
            }
            Stmt::Repeat { body, condition } => {
                self.write("repeat");
                self.emit_nested_block(body);
                self.write("until ");
                self.emit_expr(condition, 0);
            }
            Stmt::NumericFor {
                var,
                start,
                limit,
                step,
                body,
            } => {
                self.write("for ");
                self.write(var);
                self.write(" = ");
                self.emit_expr(start, 0);
                self.write(", ");
                self.emit_expr(limit, 0);
                if let Some(step) = step {
                    self.write(", ");
                    self.emit_expr(step, 0);
                }
                self.write(" do");
                self.emit_nested_block(body);
                self.write("end");
            }
            Stmt::GenericFor { vars, exprs, body } => {
                self.write("for ");
                self.write(&vars.join(", "));
                self.write(" in ");
                self.emit_expr_list(exprs);
                self.write(" do");
                self.emit_nested_block(body);
                self.write("end");
            }
            Stmt::Return(values) => {
                self.write("return");
                if !values.is_empty() {
                    self.write(" ");
                    self.emit_expr_list(values);
                }
            }
            Stmt::Break => self.write("break"),
            Stmt::Continue => self.write("continue"),
            Stmt::LocalFunction { name, function } => {
                self.write("local function ");
                self.write(name);
                self.emit_function_tail(function);
            }
            Stmt::FunctionDecl {
                path,
                method,
                function,
            } => {
                self.write("function ");
                self.write(&path.join("."));
                if let Some(method) = method {
                    self.write(":");
                    self.write(method);
                }
                self.emit_function_tail(function);
            }
            Stmt::TypeAlias {
                name,
                generics,
                ty,
                exported,
            } => {
                if *exported {
                    self.write("export ");
                }
                self.write("type ");
                self.write(name);
                self.emit_generics(generics);
                self.write(" = ");
                self.emit_type(ty);
            }
            Stmt::Comment(text) => {
                for (i, line) in text.lines().enumerate() {
                    if i > 0 {
                        self.write_line();
                        self.write_indent();
                    }
                    self.write("-- ");
                    self.write(line);
                }
            }
        }
    }

    fn emit_generics(&mut self, generics: &[String]) {
        if !generics.is_empty() {
            self.write("<");
            self.write(&generics.join(", "));
            self.write(">");
        }
    }

    fn emit_params(&mut self, params: &[Param], is_variadic: bool) {
        self.write("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&param.name);
            if let Some(ty) = &param.ty {
                self.write(": ");
                self.emit_type(ty);
            }
        }
        if is_variadic {
            if !params.is_empty() {
                self.write(", ");
            }
            self.write("...");
        }
        self.write(")");
    }

    /// `<generics>(params): ret` followed by the body and `end`.
    fn emit_function_tail(&mut self, function: &FunctionBody) {
        self.emit_generics(&function.generics);
        self.emit_params(&function.params, function.is_variadic);
        if let Some(ret) = &function.return_type {
            self.write(": ");
            self.emit_type(ret);
        }
        if function.body.is_empty() {
            self.write(" end");
        } else {
            self.emit_nested_block(&function.body);
            self.write("end");
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Emit `expr`, parenthesized if it binds looser than `min_prec`.
    pub fn emit_expr(&mut self, expr: &Expr, min_prec: u8) {
        match expr {
            Expr::Nil => self.write("nil"),
            Expr::Boolean(b) => self.write(if *b { "true" } else { "false" }),
            Expr::Number(n) => {
                let needs_parens = (n.is_nan() && min_prec > 6)
                    || (n.is_sign_negative() && *n != 0.0 && min_prec > UNARY_PRECEDENCE);
                if needs_parens {
                    self.write("(");
                }
                self.write_number(*n);
                if needs_parens {
                    self.write(")");
                }
            }
            Expr::String(s) => self.write_escaped(s),
            Expr::Vararg => self.write("..."),
            Expr::Identifier(name) => self.write(name),
            Expr::Member { object, name } => {
                self.emit_prefix(object);
                if is_valid_identifier(name) {
                    self.write(".");
                    self.write(name);
                } else {
                    self.write("[");
                    self.write_escaped(name);
                    self.write("]");
                }
            }
            Expr::Index { object, index } => {
                self.emit_prefix(object);
                self.write("[");
                self.emit_expr(index, 0);
                self.write("]");
            }
            Expr::Binary { left, op, right } => {
                let prec = op.precedence();
                let wrap = prec < min_prec;
                if wrap {
                    self.write("(");
                }
                let (left_prec, right_prec) = if op.is_right_associative() {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                self.emit_expr(left, left_prec);
                self.write(" ");
                self.write(op.as_str());
                self.write(" ");
                self.emit_expr(right, right_prec);
                if wrap {
                    self.write(")");
                }
            }
            Expr::Unary { op, operand } => {
                let wrap = UNARY_PRECEDENCE < min_prec;
                if wrap {
                    self.write("(");
                }
                self.write(op.as_str());
                // `- -x` must not print as the comment `--x`.
                if *op == UnOp::Neg && starts_with_minus(operand) {
                    self.write(" ");
                }
                self.emit_expr(operand, UNARY_PRECEDENCE);
                if wrap {
                    self.write(")");
                }
            }
            Expr::IfElse {
                condition,
                then_expr,
                else_expr,
            } => {
                let wrap = min_prec > 0;
                if wrap {
                    self.write("(");
                }
                self.write("if ");
                self.emit_expr(condition, 0);
                self.write(" then ");
                self.emit_expr(then_expr, 0);
                self.write(" else ");
                self.emit_expr(else_expr, 0);
                if wrap {
                    self.write(")");
                }
            }
            Expr::Parenthesized(inner) => {
                self.write("(");
                self.emit_expr(inner, 0);
                self.write(")");
            }
            Expr::TypeCast { expr, ty } => {
                self.write("(");
                self.emit_expr(expr, 0);
                self.write(" :: ");
                self.emit_type(ty);
                self.write(")");
            }
            Expr::Call { callee, args } => {
                self.emit_prefix(callee);
                self.write("(");
                self.emit_expr_list(args);
                self.write(")");
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.emit_prefix(receiver);
                self.write(":");
                self.write(method);
                self.write("(");
                self.emit_expr_list(args);
                self.write(")");
            }
            Expr::Function(function) => {
                self.write("function");
                self.emit_function_tail(function);
            }
            Expr::Table(fields) => self.emit_table(fields),
        }
    }

    fn emit_prefix(&mut self, expr: &Expr) {
        if expr.is_prefix() {
            self.emit_expr(expr, 0);
        } else {
            self.write("(");
            self.emit_expr(expr, 0);
            self.write(")");
        }
    }

    fn emit_table_field(&mut self, field: &TableField) {
        match field {
            TableField::Positional(value) => self.emit_expr(value, 0),
            TableField::Named(name, value) => {
                if is_valid_identifier(name) {
                    self.write(name);
                } else {
                    self.write("[");
                    self.write_escaped(name);
                    self.write("]");
                }
                self.write(" = ");
                self.emit_expr(value, 0);
            }
            TableField::Keyed(key, value) => {
                self.write("[");
                self.emit_expr(key, 0);
                self.write("] = ");
                self.emit_expr(value, 0);
            }
        }
    }

    /// Tables holding function literals are laid out one field per line;
    /// everything else stays inline.
    fn emit_table(&mut self, fields: &[TableField]) {
        if fields.is_empty() {
            self.write("{}");
            return;
        }
        let multiline = fields.iter().any(|f| {
            matches!(
                f,
                TableField::Positional(Expr::Function(_))
                    | TableField::Named(_, Expr::Function(_))
                    | TableField::Keyed(_, Expr::Function(_))
            )
        });
        if multiline {
            self.write("{");
            self.write_line();
            self.increase_indent();
            for field in fields {
                self.write_indent();
                self.emit_table_field(field);
                self.write(",");
                self.write_line();
            }
            self.decrease_indent();
            self.write_indent();
            self.write("}");
        } else {
            self.write("{");
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.emit_table_field(field);
            }
            self.write("}");
        }
    }

    // =========================================================================
    // Types
    // =========================================================================

    pub fn emit_type(&mut self, ty: &TypeNode) {
        match ty {
            TypeNode::Named { name, args } => {
                self.write(name);
                if !args.is_empty() {
                    self.write("<");
                    self.emit_type_list(args, ", ");
                    self.write(">");
                }
            }
            TypeNode::Optional(inner) => {
                let wrap = matches!(
                    **inner,
                    TypeNode::Function { .. } | TypeNode::Union(_) | TypeNode::Intersection(_)
                );
                if wrap {
                    self.write("(");
                }
                self.emit_type(inner);
                if wrap {
                    self.write(")");
                }
                self.write("?");
            }
            TypeNode::Array(element) => {
                self.write("{");
                self.emit_type(element);
                self.write("}");
            }
            TypeNode::Map(key, value) => {
                self.write("{[");
                self.emit_type(key);
                self.write("]: ");
                self.emit_type(value);
                self.write("}");
            }
            TypeNode::Table(fields) => self.emit_table_type(fields),
            TypeNode::Function { params, returns } => {
                self.write("(");
                self.emit_type_list(params, ", ");
                self.write(") -> ");
                if returns.len() == 1 {
                    self.emit_type(&returns[0]);
                } else {
                    self.write("(");
                    self.emit_type_list(returns, ", ");
                    self.write(")");
                }
            }
            TypeNode::Intersection(parts) => self.emit_type_list(parts, " & "),
            TypeNode::Union(parts) => self.emit_type_list(parts, " | "),
            TypeNode::Typeof(expr) => {
                self.write("typeof(");
                self.emit_expr(expr, 0);
                self.write(")");
            }
            TypeNode::Any => self.write("any"),
        }
    }

    fn emit_type_list(&mut self, types: &[TypeNode], separator: &str) {
        for (i, ty) in types.iter().enumerate() {
            if i > 0 {
                self.write(separator);
            }
            self.emit_type(ty);
        }
    }

    fn emit_table_type(&mut self, fields: &[TypeField]) {
        if fields.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{");
        self.write_line();
        self.increase_indent();
        for field in fields {
            self.write_indent();
            match field.access {
                PropertyAccess::ReadWrite => {}
                PropertyAccess::Read => self.write("read "),
                PropertyAccess::Write => self.write("write "),
            }
            if is_valid_identifier(&field.name) {
                self.write(&field.name);
            } else {
                self.write("[");
                self.write_escaped(&field.name);
                self.write("]");
            }
            self.write(": ");
            self.emit_type(&field.ty);
            self.write(",");
            self.write_line();
        }
        self.decrease_indent();
        self.write_indent();
        self.write("}");
    }
}

fn starts_with_minus(expr: &Expr) -> bool {
    match expr {
        Expr::Number(n) => n.is_sign_negative() && *n != 0.0,
        Expr::Unary { op: UnOp::Neg, .. } => true,
        Expr::Binary { left, .. } => starts_with_minus(left),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinOp;

    #[test]
    fn test_precedence_parenthesizes_lower_binding_operand() {
        let sum = Expr::binary(Expr::id("a"), BinOp::Add, Expr::id("b"));
        let product = Expr::binary(sum, BinOp::Mul, Expr::id("c"));
        assert_eq!(print_expr(&product), "(a + b) * c");
    }

    #[test]
    fn test_left_associative_subtraction() {
        let inner = Expr::binary(Expr::id("b"), BinOp::Sub, Expr::id("c"));
        let outer = Expr::binary(Expr::id("a"), BinOp::Sub, inner);
        assert_eq!(print_expr(&outer), "a - (b - c)");
    }

    #[test]
    fn test_concat_is_right_associative() {
        let inner = Expr::binary(Expr::id("b"), BinOp::Concat, Expr::id("c"));
        let outer = Expr::binary(Expr::id("a"), BinOp::Concat, inner);
        assert_eq!(print_expr(&outer), "a .. b .. c");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(print_expr(&Expr::Number(3.0)), "3");
        assert_eq!(print_expr(&Expr::Number(0.5)), "0.5");
        assert_eq!(print_expr(&Expr::Number(f64::INFINITY)), "math.huge");
    }

    #[test]
    fn test_double_negation_keeps_space() {
        let e = Expr::unary(UnOp::Neg, Expr::unary(UnOp::Neg, Expr::id("x")));
        assert_eq!(print_expr(&e), "- -x");
    }

    #[test]
    fn test_non_prefix_callee_is_wrapped() {
        let call = Expr::iife(vec![Stmt::ret(Some(Expr::int(1)))]);
        assert_eq!(print_expr(&call), "(function()\n    return 1\nend)()");
    }

    #[test]
    fn test_reserved_member_uses_index() {
        let e = Expr::member(Expr::id("self"), "end");
        assert_eq!(print_expr(&e), "self[\"end\"]");
    }
}
