//! Member builders for the class layout, and the structural type fields
//! every layout's type alias is made of.
//!
//! Instance methods are installed with `function T:M(...)`, static methods
//! with `function T.M(...)`. Computed properties become `get_X`/`set_X`
//! pairs and indexers `get_Item`/`set_Item`; an accessor without a body
//! inside a computed property reads or writes the raw field `X`.

use crate::error::{LoweringError, LoweringResult};
use crate::expressions::FunctionSpec;
use crate::lowerer::Lowerer;
use crate::metadata::TypeMetadata;
use crate::runtime::SIGNAL_NEW;
use luma_source::visit::{Visitor, walk_expr};
use luma_source::{
    Accessor, AssignOp, Body, ExprKind, Member, MemberKind, MethodDecl, NodeId, Parameter,
    RefKind, TypeDecl, TypeSyntax,
};
use luma_target::{
    Expr, FunctionBody, Param, PropertyAccess, Stmt as TStmt, TableField, TypeField, TypeNode,
};

impl Lowerer<'_> {
    // =========================================================================
    // Runtime members
    // =========================================================================

    /// Methods, accessors and static storage, in source order.
    pub(super) fn lower_class_members(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
        local: &str,
    ) -> LoweringResult<Vec<TStmt>> {
        let mut block = Vec::new();
        for member in &decl.members {
            let lowered = match &member.kind {
                MemberKind::Method(method) => self.lower_method(member, method, meta, local)?,
                MemberKind::Property {
                    ty,
                    getter,
                    setter,
                    expression_body,
                    ..
                } if !member.kind.is_auto_property() => self.lower_computed_property(
                    member,
                    ty,
                    getter.as_ref(),
                    setter.as_ref(),
                    expression_body.as_ref(),
                    local,
                )?,
                MemberKind::Field { ty, initializer }
                | MemberKind::Property {
                    ty, initializer, ..
                } if member.is_static() => {
                    let target = Expr::member(Expr::id(local), member.name.clone());
                    self.member_default(target, ty, initializer.as_ref())?
                }
                MemberKind::Event { initializer, .. } if member.is_static() => {
                    if initializer.is_none() && static_constructor_assigns(decl, &member.name) {
                        tracing::debug!(event = %member.name, "[lowering] static event assigned by static constructor");
                        Vec::new()
                    } else {
                        let target = Expr::member(Expr::id(local), member.name.clone());
                        self.event_signal(target, initializer.as_ref())?
                    }
                }
                MemberKind::Indexer {
                    ty,
                    parameters,
                    getter,
                    setter,
                } => self.lower_indexer(member, ty, parameters, getter.as_ref(), setter.as_ref(), local)?,
                _ => Vec::new(),
            };
            block.extend(lowered);
        }
        Ok(block)
    }

    fn lower_method(
        &mut self,
        member: &Member,
        method: &MethodDecl,
        meta: &TypeMetadata,
        local: &str,
    ) -> LoweringResult<Vec<TStmt>> {
        // Abstract methods have nothing to install.
        let Some(body) = &method.body else {
            return Ok(Vec::new());
        };
        let name = meta.method_name(Some(member.id), &member.name);
        let is_static = member.is_static();
        let spec = FunctionSpec::method(
            &method.parameters,
            body,
            method.return_type.as_ref(),
            self.syntax_returns_value(method.return_type.as_ref()),
        )
        .with_generator(meta.generator_methods.get(&member.id).copied());

        if meta.async_methods.contains(&member.id) {
            let spec = if is_static { spec } else { spec.with_self() };
            let function = self.build_function(&spec)?;
            let value = self.async_function(function);
            return Ok(vec![TStmt::assign(Expr::member(Expr::id(local), name), value)]);
        }

        let function = self.build_function(&spec)?;
        let mut block = vec![install(local, name.clone(), is_static, function)];
        if !is_static && member.name == "ToString" && method.parameters.is_empty() {
            // Instances share `T` as their metatable.
            let to_string = Expr::function(
                vec![Param::new("self")],
                vec![TStmt::Return(vec![Expr::method_call(
                    Expr::id("self"),
                    name,
                    Vec::new(),
                )])],
            );
            block.push(TStmt::assign(
                Expr::member(Expr::id(local), "__tostring"),
                to_string,
            ));
        }
        Ok(block)
    }

    fn lower_computed_property(
        &mut self,
        member: &Member,
        ty: &TypeSyntax,
        getter: Option<&Accessor>,
        setter: Option<&Accessor>,
        expression_body: Option<&luma_source::Expr>,
        local: &str,
    ) -> LoweringResult<Vec<TStmt>> {
        let is_static = member.is_static();
        let field = if is_static {
            Expr::member(Expr::id(local), member.name.clone())
        } else {
            Expr::member(Expr::id("self"), member.name.clone())
        };
        let expression = expression_body.map(|expr| Body::Expression(Box::new(expr.clone())));
        let getter_body = match (&expression, getter) {
            (Some(body), _) => Some(Some(body)),
            (None, Some(accessor)) => Some(accessor.body.as_ref()),
            (None, None) => None,
        };

        let mut block = Vec::with_capacity(2);
        if let Some(body) = getter_body {
            let function = match body {
                Some(body) => {
                    self.build_function(&FunctionSpec::method(&[], body, Some(ty), true))?
                }
                None => FunctionBody {
                    body: vec![TStmt::Return(vec![field.clone()])],
                    ..FunctionBody::default()
                },
            };
            block.push(install(local, format!("get_{}", member.name), is_static, function));
        }
        if let Some(setter) = setter {
            let parameters = [value_parameter(ty)];
            let function = match &setter.body {
                Some(body) => {
                    self.build_function(&FunctionSpec::method(&parameters, body, None, false))?
                }
                None => FunctionBody {
                    params: vec![Param::new("value")],
                    body: vec![TStmt::assign(field, Expr::id("value"))],
                    ..FunctionBody::default()
                },
            };
            block.push(install(local, format!("set_{}", member.name), is_static, function));
        }
        Ok(block)
    }

    fn lower_indexer(
        &mut self,
        member: &Member,
        ty: &TypeSyntax,
        parameters: &[Parameter],
        getter: Option<&Accessor>,
        setter: Option<&Accessor>,
        local: &str,
    ) -> LoweringResult<Vec<TStmt>> {
        let accessors = self.indexer_accessors(member, ty, parameters, getter, setter, false)?;
        Ok(accessors
            .into_iter()
            .map(|(name, function)| install(local, name, false, function))
            .collect())
    }

    /// `get_Item = function(self, ...)` fields for a struct factory table.
    pub(super) fn indexer_fields(&mut self, decl: &TypeDecl) -> LoweringResult<Vec<TableField>> {
        let mut fields = Vec::new();
        for member in &decl.members {
            if let MemberKind::Indexer {
                ty,
                parameters,
                getter,
                setter,
            } = &member.kind
            {
                let accessors =
                    self.indexer_accessors(member, ty, parameters, getter.as_ref(), setter.as_ref(), true)?;
                fields.extend(accessors.into_iter().map(|(name, function)| {
                    TableField::Named(name, Expr::Function(Box::new(function)))
                }));
            }
        }
        Ok(fields)
    }

    fn indexer_accessors(
        &mut self,
        member: &Member,
        ty: &TypeSyntax,
        parameters: &[Parameter],
        getter: Option<&Accessor>,
        setter: Option<&Accessor>,
        self_param: bool,
    ) -> LoweringResult<Vec<(String, FunctionBody)>> {
        let mut accessors = Vec::with_capacity(2);
        if let Some(getter) = getter {
            let body = accessor_body(member, getter)?;
            let mut spec = FunctionSpec::method(parameters, body, Some(ty), true);
            if self_param {
                spec = spec.with_self();
            }
            accessors.push(("get_Item".to_string(), self.build_function(&spec)?));
        }
        if let Some(setter) = setter {
            let body = accessor_body(member, setter)?;
            let mut with_value = parameters.to_vec();
            with_value.push(value_parameter(ty));
            let mut spec = FunctionSpec::method(&with_value, body, None, false);
            if self_param {
                spec = spec.with_self();
            }
            accessors.push(("set_Item".to_string(), self.build_function(&spec)?));
        }
        Ok(accessors)
    }

    // =========================================================================
    // Storage defaults
    // =========================================================================

    /// `target = initializer`, or `target = default(T)` when that is not nil.
    pub(super) fn member_default(
        &mut self,
        target: Expr,
        ty: &TypeSyntax,
        initializer: Option<&luma_source::Expr>,
    ) -> LoweringResult<Vec<TStmt>> {
        if let Some(initializer) = initializer {
            return self.lower_into_block(initializer, |value| TStmt::assign(target, value));
        }
        let default = match self.type_of(ty.id) {
            Some(ty) => self.default_value(ty),
            None => Expr::Nil,
        };
        Ok(if default.is_nil() {
            Vec::new()
        } else {
            vec![TStmt::assign(target, default)]
        })
    }

    /// `target = CS.Signal.new()`, connecting the initializer's handler.
    pub(super) fn event_signal(
        &mut self,
        target: Expr,
        initializer: Option<&luma_source::Expr>,
    ) -> LoweringResult<Vec<TStmt>> {
        let mut block = vec![TStmt::assign(
            target.clone(),
            self.runtime.call(SIGNAL_NEW, Vec::new()),
        )];
        if let Some(initializer) = initializer {
            block.extend(self.lower_into_block(initializer, |handler| {
                TStmt::Call(Expr::method_call(target, "Connect", vec![handler]))
            })?);
        }
        Ok(block)
    }

    /// Instance storage set up by every constructor that does not chain to
    /// `this(...)`: properties, then fields, then events.
    pub(super) fn instance_defaults(&mut self, decl: &TypeDecl) -> LoweringResult<Vec<TStmt>> {
        let mut properties = Vec::new();
        let mut fields = Vec::new();
        let mut events = Vec::new();
        for member in decl.members.iter().filter(|m| !m.is_static()) {
            let target = Expr::member(Expr::id("self"), member.name.clone());
            match &member.kind {
                MemberKind::Property {
                    ty, initializer, ..
                } if member.kind.is_auto_property() => {
                    properties.extend(self.member_default(target, ty, initializer.as_ref())?);
                }
                MemberKind::Field { ty, initializer } => {
                    fields.extend(self.member_default(target, ty, initializer.as_ref())?);
                }
                MemberKind::Event { initializer, .. } => {
                    events.extend(self.event_signal(target, initializer.as_ref())?);
                }
                _ => {}
            }
        }
        properties.extend(fields);
        properties.extend(events);
        Ok(properties)
    }

    // =========================================================================
    // Structural type
    // =========================================================================

    /// Fields of the structural type of an instance: storage, accessor
    /// functions and methods taking `self_type` first. Static members and
    /// constructors are left out.
    pub(super) fn structural_fields(
        &self,
        members: &[Member],
        meta: &TypeMetadata,
        self_type: &TypeNode,
    ) -> Vec<TypeField> {
        let mut fields = Vec::new();
        for member in members.iter().filter(|m| !m.is_static()) {
            match &member.kind {
                MemberKind::Field { ty, .. } => {
                    let access = if member.modifiers.is_readonly {
                        PropertyAccess::Read
                    } else {
                        PropertyAccess::ReadWrite
                    };
                    fields.push(TypeField::new(member.name.clone(), self.annotation_of(ty), access));
                }
                MemberKind::Property { ty, getter, setter, .. } if member.kind.is_auto_property() => {
                    let access = match (getter.is_some(), setter.is_some()) {
                        (true, false) => PropertyAccess::Read,
                        (false, true) => PropertyAccess::Write,
                        _ => PropertyAccess::ReadWrite,
                    };
                    fields.push(TypeField::new(member.name.clone(), self.annotation_of(ty), access));
                }
                MemberKind::Property {
                    ty,
                    getter,
                    setter,
                    expression_body,
                    ..
                } => {
                    let value = self.annotation_of(ty);
                    if getter.is_some() || expression_body.is_some() {
                        fields.push(accessor_field(
                            format!("get_{}", member.name),
                            vec![self_type.clone()],
                            vec![value.clone()],
                        ));
                    }
                    if setter.is_some() {
                        fields.push(accessor_field(
                            format!("set_{}", member.name),
                            vec![self_type.clone(), value],
                            Vec::new(),
                        ));
                    }
                }
                MemberKind::Event { .. } => {
                    fields.push(TypeField::new(member.name.clone(), TypeNode::Any, PropertyAccess::Read));
                }
                MemberKind::Method(method) => {
                    let mut params = vec![self_type.clone()];
                    params.extend(self.parameter_annotations(&method.parameters));
                    let returns = match meta.generator_methods.get(&member.id) {
                        Some(shape) => self
                            .generator_annotation(*shape, method.return_type.as_ref())
                            .into_iter()
                            .collect(),
                        None => self.return_annotations(method.return_type.as_ref()),
                    };
                    fields.push(accessor_field(
                        meta.method_name(Some(member.id), &member.name),
                        params,
                        returns,
                    ));
                }
                MemberKind::Indexer {
                    ty,
                    parameters,
                    getter,
                    setter,
                } => {
                    let value = self.annotation_of(ty);
                    let mut params = vec![self_type.clone()];
                    params.extend(self.parameter_annotations(parameters));
                    if getter.is_some() {
                        fields.push(accessor_field("get_Item".into(), params.clone(), vec![value.clone()]));
                    }
                    if setter.is_some() {
                        params.push(value);
                        fields.push(accessor_field("set_Item".into(), params, Vec::new()));
                    }
                }
                MemberKind::Constructor(_) => {}
            }
        }
        fields
    }

    fn annotation_of(&self, syntax: &TypeSyntax) -> TypeNode {
        self.type_of(syntax.id)
            .map_or(TypeNode::Any, |ty| self.type_annotation(ty))
    }

    fn parameter_annotations(&self, parameters: &[Parameter]) -> Vec<TypeNode> {
        parameters
            .iter()
            .map(|p| p.ty.as_ref().map_or(TypeNode::Any, |ty| self.annotation_of(ty)))
            .collect()
    }

    fn return_annotations(&self, return_type: Option<&TypeSyntax>) -> Vec<TypeNode> {
        match self.syntax_type(return_type) {
            Some(ty) if !ty.is_void() => vec![self.type_annotation(ty)],
            _ => Vec::new(),
        }
    }
}

/// `function T:name(...)` or `function T.name(...)`.
fn install(local: &str, name: String, is_static: bool, function: FunctionBody) -> TStmt {
    if is_static {
        TStmt::FunctionDecl {
            path: vec![local.to_string(), name],
            method: None,
            function,
        }
    } else {
        TStmt::FunctionDecl {
            path: vec![local.to_string()],
            method: Some(name),
            function,
        }
    }
}

fn accessor_field(name: String, params: Vec<TypeNode>, returns: Vec<TypeNode>) -> TypeField {
    TypeField::new(name, TypeNode::Function { params, returns }, PropertyAccess::ReadWrite)
}

/// The implicit `value` parameter of a setter.
fn value_parameter(ty: &TypeSyntax) -> Parameter {
    Parameter {
        id: NodeId::NONE,
        span: ty.span,
        name: "value".to_string(),
        ty: Some(ty.clone()),
        ref_kind: RefKind::None,
        default_value: None,
        is_params: false,
    }
}

fn accessor_body<'m>(member: &Member, accessor: &'m Accessor) -> LoweringResult<&'m Body> {
    accessor.body.as_ref().ok_or_else(|| {
        LoweringError::unsupported("indexer", "accessor without a body", member.span)
    })
}

/// Whether the static constructor assigns `name` directly.
fn static_constructor_assigns(decl: &TypeDecl, name: &str) -> bool {
    let Some(Body::Block(stmts)) = decl.static_constructor().and_then(|c| c.body.as_ref()) else {
        return false;
    };
    let mut finder = AssignmentFinder { name, found: false };
    for stmt in stmts {
        finder.visit_stmt(stmt);
    }
    finder.found
}

struct AssignmentFinder<'n> {
    name: &'n str,
    found: bool,
}

impl Visitor for AssignmentFinder<'_> {
    fn visit_expr(&mut self, expr: &luma_source::Expr) {
        if let ExprKind::Assignment {
            op: AssignOp::Assign,
            target,
            ..
        } = &expr.kind
        {
            let assigned = match &target.kind {
                ExprKind::Identifier(name) | ExprKind::Member { name, .. } => name == self.name,
                _ => false,
            };
            if assigned {
                self.found = true;
                return;
            }
        }
        walk_expr(self, expr);
    }

    fn visit_nested_body(&mut self, _body: &Body) {}
}
