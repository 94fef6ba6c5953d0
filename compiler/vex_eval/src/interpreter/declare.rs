//! Declarations: functions, classes, unions and enums.
//!
//! A declaration registers into the scope it executes in. Each declaration
//! node is processed once, so re-entering a block or calling a function
//! again does not re-register what it declares.

use std::rc::Rc;

use smallvec::SmallVec;
use tracing::debug;
use vex_ir::{NodeKind, NodeRef};

use super::Interpreter;
use crate::errors::{redefinition, type_conversion_failure, unexpected_node, unknown_type, EvalResult};
use crate::function::{Function, FunctionBody, FunctionFlags, FunctionId, Param};
use crate::scope::{ScopeId, ScopeKind};
use crate::template::{TemplateId, TemplateItem};
use crate::types::{Field, FieldInit, StructKind, StructuralType, TemplateArg, TemplateKind, TypeId};

/// Split a `VariableDefinition` into its declared type and initializer.
pub(crate) fn definition_parts(node: NodeRef<'_>) -> (Option<NodeRef<'_>>, Option<NodeRef<'_>>) {
    match node.child(0) {
        Some(ty) if ty.kind() == NodeKind::TypeName => (Some(ty), node.child(1)),
        init => (None, init),
    }
}

impl Interpreter {
    pub(crate) fn declare(&mut self, node: NodeRef<'_>, scope: ScopeId) -> EvalResult<()> {
        match node.kind() {
            NodeKind::Function => self.declare_function(node, scope, None).map(|_| ()),
            NodeKind::Class => self.declare_class(node, scope, StructKind::Class),
            NodeKind::Union => self.declare_class(node, scope, StructKind::Union),
            NodeKind::Enum => self.declare_enum(node, scope),
            other => Err(unexpected_node(other)),
        }
    }

    pub(crate) fn declare_function(
        &mut self,
        node: NodeRef<'_>,
        scope: ScopeId,
        owner: Option<TypeId>,
    ) -> EvalResult<Option<FunctionId>> {
        if !self.declared.insert(node.key()) {
            return Ok(None);
        }
        self.define_function(node, scope, owner)
    }

    /// Register a function (or function template) into `scope`.
    pub(crate) fn define_function(
        &mut self,
        node: NodeRef<'_>,
        scope: ScopeId,
        owner: Option<TypeId>,
    ) -> EvalResult<Option<FunctionId>> {
        if let Some(params) = node.find_child(NodeKind::TemplateParameters) {
            let id = self.declare_template(node, params, scope, TemplateItem::Function { owner })?;
            self.scopes
                .get_mut(scope)
                .register_template_function(node.text(), id);
            return Ok(None);
        }
        let fn_scope = self.scopes.scope_for(node.key(), ScopeKind::Function, scope);
        let id = self.build_function(node, fn_scope, owner)?;
        let name = self.functions.get(id).name;
        if self.operator_symbol(node).is_some() {
            self.scopes.get_mut(scope).register_operator(name, id);
        } else {
            self.scopes.get_mut(scope).register_function(name, id);
        }
        Ok(Some(id))
    }

    /// `+` for a function named `operator+`.
    fn operator_symbol(&self, node: NodeRef<'_>) -> Option<&'static str> {
        self.name(node.text())
            .strip_prefix("operator")
            .filter(|s| !s.is_empty())
    }

    /// Build the function record for a `Function` node whose signature
    /// resolves in `fn_scope`.
    pub(crate) fn build_function(
        &mut self,
        node: NodeRef<'_>,
        fn_scope: ScopeId,
        owner: Option<TypeId>,
    ) -> EvalResult<FunctionId> {
        let name = match self.operator_symbol(node) {
            Some(symbol) => self.intern(symbol),
            None => node.text(),
        };
        let params_node = node
            .find_child(NodeKind::Parameters)
            .ok_or_else(|| unexpected_node(NodeKind::Function))?;

        let mut params = Vec::with_capacity(params_node.child_count() + 1);
        let mut flags = FunctionFlags::empty();
        if let Some(class) = owner {
            let explicit_self = params_node
                .child(0)
                .is_some_and(|p| p.text() == self.names.self_);
            if !explicit_self {
                params.push(Param {
                    name: self.names.self_,
                    ty: self.reference_type(class)?,
                });
            }
        }
        for param in params_node.children() {
            if param.text() == self.names.ellipsis {
                flags |= FunctionFlags::VARIADIC;
                params.push(Param {
                    name: param.text(),
                    ty: TypeId::VOID,
                });
                break;
            }
            let ty_node = param
                .find_child(NodeKind::TypeName)
                .ok_or_else(|| unknown_type(self.name(param.text())).with_hint("parameters need a type"))?;
            params.push(Param {
                name: param.text(),
                ty: self.resolve_type(ty_node, fn_scope)?,
            });
        }

        let ret = match node.find_child(NodeKind::TypeName) {
            Some(ty) => self.resolve_type(ty, fn_scope)?,
            None => TypeId::VOID,
        };
        if name == self.names.construct {
            flags |= FunctionFlags::CONSTRUCTOR;
        }
        if self.types.get(ret).reference_target().is_some() {
            flags |= FunctionFlags::RETURNS_REF;
        }

        let body = FunctionBody::Interpreted {
            tree: Rc::clone(&self.current_tree),
            node: node.id(),
            scope: fn_scope,
        };
        let param_count = params.len();
        let function = Function::new(name, params, ret, flags, owner, body, self.names.self_);
        let id = self.functions.add(function);
        debug!(name = self.name(node.text()), params = param_count, "declared function");
        Ok(id)
    }

    fn declare_class(&mut self, node: NodeRef<'_>, scope: ScopeId, kind: StructKind) -> EvalResult<()> {
        if !self.declared.insert(node.key()) {
            return Ok(());
        }
        if let Some(params) = node.find_child(NodeKind::TemplateParameters) {
            let item = TemplateItem::Class {
                union: kind == StructKind::Union,
            };
            let id = self.declare_template(node, params, scope, item)?;
            return self
                .scopes
                .get_mut(scope)
                .register_template_type(node.text(), id)
                .map_err(|_| redefinition(self.name(node.text())));
        }
        let class_scope = self.scopes.scope_for(node.key(), ScopeKind::Class, scope);
        let name = self.name(node.text()).to_owned();
        self.define_class_body(node, scope, class_scope, name, kind, None)?;
        Ok(())
    }

    /// Register a class under `name`, lay out its fields and declare its
    /// methods into `class_scope`.
    ///
    /// Template instances pass their origin and are not bound by name in
    /// `decl_scope`; their rendered name is found through the registry.
    pub(crate) fn define_class_body(
        &mut self,
        node: NodeRef<'_>,
        decl_scope: ScopeId,
        class_scope: ScopeId,
        name: String,
        kind: StructKind,
        origin: Option<(TemplateId, &[TemplateArg])>,
    ) -> EvalResult<TypeId> {
        let ty = self.types.register(name, StructuralType::shell(kind), class_scope)?;
        match origin {
            Some((template, args)) => self.types.set_template_origin(ty, template, args),
            None => self
                .scopes
                .get_mut(decl_scope)
                .register_type(node.text(), ty)
                .map_err(|_| redefinition(self.name(node.text())))?,
        }
        self.scopes.get_mut(class_scope).set_owner(ty);

        let mut fields = Vec::new();
        for child in node.children().filter(|c| c.kind() == NodeKind::VariableDefinition) {
            let (ty_node, init) = definition_parts(child);
            let ty_node = ty_node.ok_or_else(|| {
                unknown_type(self.name(child.text())).with_hint("fields need a declared type")
            })?;
            fields.push(Field {
                name: child.text(),
                ty: self.resolve_type(ty_node, class_scope)?,
                offset: 0,
                init: init.map(|e| FieldInit {
                    tree: Rc::clone(&self.current_tree),
                    node: e.id(),
                }),
            });
        }
        self.types.complete(ty, fields, Vec::new())?;

        for child in node.children().filter(|c| c.kind() == NodeKind::Function) {
            self.define_function(child, class_scope, Some(ty))?;
        }
        debug!(name = self.type_name(ty), size = self.types.size(ty), "declared class");
        Ok(ty)
    }

    fn declare_enum(&mut self, node: NodeRef<'_>, scope: ScopeId) -> EvalResult<()> {
        if !self.declared.insert(node.key()) {
            return Ok(());
        }
        let enum_scope = self.scopes.scope_for(node.key(), ScopeKind::Class, scope);
        let name = self.name(node.text()).to_owned();
        let ty = self
            .types
            .register(name, StructuralType::shell(StructKind::Enum), enum_scope)?;
        self.scopes
            .get_mut(scope)
            .register_type(node.text(), ty)
            .map_err(|_| redefinition(self.name(node.text())))?;
        self.scopes.get_mut(enum_scope).set_owner(ty);

        let mut variants = Vec::new();
        let mut next = 0i64;
        for value in node.children().filter(|c| c.kind() == NodeKind::EnumValue) {
            if let Some(expr) = value.child(0) {
                let v = self.evaluate_expression(expr)?;
                let v = self.strip_ref(v)?;
                if !matches!(self.scalar_kind(v.ty), Some(k) if k.is_integer()) {
                    return Err(type_conversion_failure(self.type_name(v.ty), "Int32"));
                }
                next = self.read_scalar(v)?.as_i64();
            }
            variants.push((value.text(), next));
            next += 1;
        }
        self.types.complete(ty, Vec::new(), variants)?;
        debug!(name = self.type_name(ty), "declared enum");
        Ok(())
    }

    /// Resolve a `TypeName` node from `scope`.
    pub(crate) fn resolve_type(&mut self, node: NodeRef<'_>, scope: ScopeId) -> EvalResult<TypeId> {
        let name = node.text();
        if node.child_count() == 0 {
            if let Some(binding) = self.find_template_param(scope, name) {
                return match binding.arg {
                    TemplateArg::Type(t) => Ok(t),
                    TemplateArg::Int(_) => Err(unknown_type(self.name(name))
                        .with_hint("a value template parameter is not a type")),
                };
            }
            return self
                .resolve_type_name(scope, name)
                .ok_or_else(|| unknown_type(self.name(name)));
        }

        let mut args: SmallVec<[TemplateArg; 2]> = SmallVec::new();
        for child in node.children() {
            args.push(self.resolve_template_arg(child, scope)?);
        }
        if let Some(kind) = TemplateKind::from_name(self.name(name)) {
            return Ok(self.types.find_or_create(&mut self.scopes, kind, &args)?.id);
        }
        if let Some(template) = self.find_template_type(scope, name) {
            return self.instantiate_class(template, &args);
        }
        Err(unknown_type(self.name(name)))
    }

    /// One template argument: a type, an integer literal, a value template
    /// parameter in scope, or a constant expression.
    pub(crate) fn resolve_template_arg(&mut self, node: NodeRef<'_>, scope: ScopeId) -> EvalResult<TemplateArg> {
        match node.kind() {
            NodeKind::IntegerLiteral => {
                let text = self.name(node.text());
                text.parse::<i64>()
                    .map(TemplateArg::Int)
                    .map_err(|_| type_conversion_failure(text, "Int64"))
            }
            NodeKind::Identifier | NodeKind::TypeName if node.child_count() == 0 => {
                match self.find_template_param(scope, node.text()) {
                    Some(binding) => Ok(binding.arg),
                    None => self.resolve_type(node, scope).map(TemplateArg::Type),
                }
            }
            NodeKind::TypeName => self.resolve_type(node, scope).map(TemplateArg::Type),
            NodeKind::Expression => {
                let v = self.evaluate_expression(node)?;
                let v = self.strip_ref(v)?;
                match self.scalar_kind(v.ty) {
                    Some(k) if k.is_integer() => Ok(TemplateArg::Int(self.read_scalar(v)?.as_i64())),
                    _ => Err(type_conversion_failure(self.type_name(v.ty), "Int64")),
                }
            }
            other => Err(unexpected_node(other)),
        }
    }
}
