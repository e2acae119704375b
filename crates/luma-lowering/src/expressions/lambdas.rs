//! Closures and the function-body builder shared by every callable.

use crate::context::BindingKind;
use crate::error::LoweringResult;
use crate::lowerer::Lowerer;
use luma_source::{Body, ExprKind, GeneratorShape, LambdaExpr, Parameter, TypeInfo, TypeSyntax};
use luma_target::{Block, Expr, FunctionBody, Param, Stmt, TypeNode};

/// A callable body to lower.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FunctionSpec<'s> {
    pub parameters: &'s [Parameter],
    pub body: &'s Body,
    pub return_type: Option<&'s TypeSyntax>,
    /// `self` is declared as the first parameter.
    pub self_param: bool,
    /// An expression body is returned rather than evaluated for effects.
    pub returns_value: bool,
    pub generator: Option<GeneratorShape>,
}

impl<'s> FunctionSpec<'s> {
    /// A method-shaped body: returns a value unless the return type is `void`.
    pub(crate) fn method(
        parameters: &'s [Parameter],
        body: &'s Body,
        return_type: Option<&'s TypeSyntax>,
        returns_value: bool,
    ) -> Self {
        Self {
            parameters,
            body,
            return_type,
            self_param: false,
            returns_value,
            generator: None,
        }
    }

    pub(crate) fn with_self(mut self) -> Self {
        self.self_param = true;
        self
    }

    pub(crate) fn with_generator(mut self, shape: Option<GeneratorShape>) -> Self {
        self.generator = shape;
        self
    }
}

impl Lowerer<'_> {
    pub(super) fn lower_lambda(
        &mut self,
        expr: &luma_source::Expr,
        lambda: &LambdaExpr,
    ) -> LoweringResult<Expr> {
        let spec = FunctionSpec {
            parameters: &lambda.parameters,
            body: &lambda.body,
            return_type: None,
            self_param: false,
            returns_value: self.lambda_returns_value(expr, &lambda.body),
            generator: None,
        };
        let function = self.build_function(&spec)?;
        Ok(if lambda.is_async {
            self.async_function(function)
        } else {
            Expr::Function(Box::new(function))
        })
    }

    /// `Action<...>` bodies and void expression bodies are run for effects.
    fn lambda_returns_value(&self, expr: &luma_source::Expr, body: &Body) -> bool {
        let Body::Expression(inner) = body else {
            return true;
        };
        if let Some(delegate) = self.type_of(expr.id) {
            match delegate.name.as_str() {
                "Action" => return false,
                "Func" | "Predicate" | "Comparison" => return true,
                _ => {}
            }
        }
        !self.type_of(inner.id).is_some_and(TypeInfo::is_void)
            && !matches!(inner.kind, ExprKind::Assignment { .. })
    }

    pub(crate) fn build_function(&mut self, spec: &FunctionSpec<'_>) -> LoweringResult<FunctionBody> {
        self.build_function_with(spec, |_| Ok(Vec::new()))
    }

    /// Lower a callable body in a new function frame. `prologue` runs after
    /// the parameters are bound and its statements precede the body.
    pub(crate) fn build_function_with(
        &mut self,
        spec: &FunctionSpec<'_>,
        prologue: impl FnOnce(&mut Self) -> LoweringResult<Block>,
    ) -> LoweringResult<FunctionBody> {
        self.with_function(|this| {
            let mut params = Vec::with_capacity(spec.parameters.len() + 1);
            if spec.self_param {
                params.push(Param::new("self"));
            }
            let mut block = Vec::new();
            let mut is_variadic = false;
            for parameter in spec.parameters {
                if parameter.is_params {
                    // `params T[] xs` collects the trailing arguments.
                    let emitted = this.declare_local(&parameter.name);
                    block.push(Stmt::local(
                        emitted,
                        Some(Expr::array(vec![Expr::Vararg])),
                    ));
                    is_variadic = true;
                    continue;
                }
                let (emitted, annotation) = if parameter.ref_kind.is_by_reference() {
                    (this.ctx.declare(&parameter.name, BindingKind::RefParameter), None)
                } else {
                    let annotation = this.parameter_annotation(parameter);
                    (this.declare_local(&parameter.name), annotation)
                };
                if let Some(default) = &parameter.default_value {
                    let (mut fill, value) = this.capture(|this| this.lower_expr(default))?;
                    fill.push(Stmt::assign(Expr::id(emitted.clone()), value));
                    block.push(Stmt::if_then(
                        Expr::eq(Expr::id(emitted.clone()), Expr::Nil),
                        fill,
                    ));
                }
                params.push(Param {
                    name: emitted,
                    ty: annotation,
                });
            }

            block.extend(prologue(this)?);

            match spec.generator {
                Some(shape) => block.extend(this.lower_generator_body(shape, spec.body)?),
                None => block.extend(this.lower_function_body(spec.body, spec.returns_value)?),
            }

            let return_type = match spec.generator {
                Some(shape) => this.generator_annotation(shape, spec.return_type),
                None if spec.returns_value => this.syntax_annotation(spec.return_type),
                None => None,
            };
            Ok(FunctionBody {
                generics: Vec::new(),
                params,
                is_variadic,
                return_type,
                body: block,
            })
        })
    }

    fn parameter_annotation(&self, parameter: &Parameter) -> Option<TypeNode> {
        if parameter.ty.is_some() {
            let annotation = self.syntax_annotation(parameter.ty.as_ref())?;
            return Some(match parameter.default_value {
                Some(_) => annotation.optional(),
                None => annotation,
            });
        }
        if !self.options.emit_type_annotations {
            return None;
        }
        self.type_of(parameter.id).map(|ty| self.type_annotation(ty))
    }

    /// Statements of a block body, or an expression body returned or
    /// evaluated.
    pub(crate) fn lower_function_body(
        &mut self,
        body: &Body,
        returns_value: bool,
    ) -> LoweringResult<Block> {
        match body {
            Body::Block(stmts) => self.lower_stmts(stmts),
            Body::Expression(expr) if returns_value => {
                self.lower_into_block(expr, |value| Stmt::Return(vec![value]))
            }
            Body::Expression(expr) => self.lower_expression_statement(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataTable;
    use crate::options::LoweringOptions;
    use luma_source::{CompilationUnit, SyntaxFactory};
    use luma_target::print_expr;

    #[test]
    fn test_default_parameter_is_filled_when_nil() {
        let mut f = SyntaxFactory::new();
        let mut param = f.param("count", &TypeInfo::int());
        param.default_value = Some(f.int(3));
        let local = f.local("count", TypeInfo::int());
        let lambda = f.lambda(vec![param], Body::Expression(Box::new(local)));

        let unit = CompilationUnit::new("Main.cs");
        let metadata = MetadataTable::new();
        let options = LoweringOptions {
            emit_type_annotations: false,
            ..LoweringOptions::default()
        };
        let oracle = f.into_oracle();
        let mut lowerer = Lowerer::new(&unit, &oracle, &metadata, &options);
        lowerer.ctx.begin_capture();
        let lowered = lowerer.lower_expr(&lambda).expect("lowered");
        assert!(lowerer.ctx.end_capture().is_empty());
        assert_eq!(
            print_expr(&lowered),
            "function(count)\n    if count == nil then\n        count = 3\n    end\n    return count\nend"
        );
    }
}
