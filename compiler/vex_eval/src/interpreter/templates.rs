//! Template declaration, argument deduction and instantiation.
//!
//! A template is kept as its declaration node plus the scope it was
//! declared in. Instantiating binds the arguments in a fresh template scope
//! under that declaration scope and re-runs the declaration there, so the
//! body sees `T` exactly as an ordinary declaration sees a type name.

use std::rc::Rc;

use tracing::debug;
use vex_ir::{NodeKind, NodeRef};

use super::Interpreter;
use crate::errors::{unknown_type, EvalResult};
use crate::function::FunctionId;
use crate::scope::{ScopeId, ScopeKind, TemplateBinding};
use crate::template::{TemplateDef, TemplateId, TemplateItem, TemplateParam, TemplateParamKind};
use crate::types::{StructKind, TemplateArg, TemplateKind, TypeId, TypeKind};

impl Interpreter {
    pub(crate) fn declare_template(
        &mut self,
        node: NodeRef<'_>,
        params: NodeRef<'_>,
        scope: ScopeId,
        item: TemplateItem,
    ) -> EvalResult<TemplateId> {
        let mut out = Vec::with_capacity(params.child_count());
        for param in params.children() {
            let kind = match param.find_child(NodeKind::TypeName) {
                Some(ty) => TemplateParamKind::Value(self.resolve_type(ty, scope)?),
                None => TemplateParamKind::Type,
            };
            out.push(TemplateParam {
                name: param.text(),
                kind,
            });
        }
        let id = self.templates.add(TemplateDef {
            name: node.text(),
            params: out,
            tree: Rc::clone(&self.current_tree),
            node: node.id(),
            scope,
            item,
        });
        debug!(name = self.name(node.text()), "declared template");
        Ok(id)
    }

    fn render_instance(&self, def: &TemplateDef, args: &[TemplateArg]) -> String {
        format!("{}<{}>", self.name(def.name), self.types.render_args(args))
    }

    /// A template scope binding `args` to the parameters of `def`.
    fn bind_template_scope(&mut self, def: &TemplateDef, args: &[TemplateArg]) -> EvalResult<ScopeId> {
        let shape_ok = args.len() == def.params.len()
            && def.params.iter().zip(args).all(|(p, &a)| p.admits(a));
        if !shape_ok {
            return Err(unknown_type(self.render_instance(def, args)).with_hint(format!(
                "`{}` takes {} template argument(s)",
                self.name(def.name),
                def.params.len()
            )));
        }
        let scope = self.scopes.create(ScopeKind::Template, Some(def.scope));
        for (param, &arg) in def.params.iter().zip(args) {
            let value_type = match param.kind {
                TemplateParamKind::Value(t) => Some(t),
                TemplateParamKind::Type => None,
            };
            self.scopes
                .get_mut(scope)
                .bind_template_param(param.name, TemplateBinding { arg, value_type });
        }
        Ok(scope)
    }

    /// The class `template<args>`, instantiated on first use.
    pub(crate) fn instantiate_class(&mut self, template: TemplateId, args: &[TemplateArg]) -> EvalResult<TypeId> {
        let def = self.templates.get(template).clone();
        let rendered = self.render_instance(&def, args);
        if let Some(ty) = self.types.find_by_name(&rendered) {
            return Ok(ty);
        }
        let kind = match def.item {
            TemplateItem::Class { union: true } => StructKind::Union,
            _ => StructKind::Class,
        };
        let inst = self.bind_template_scope(&def, args)?;
        let class_scope = self.scopes.create(ScopeKind::Class, Some(inst));
        let ty = self.with_tree(Rc::clone(&def.tree), |interp, tree| {
            interp.define_class_body(
                tree.node(def.node),
                inst,
                class_scope,
                rendered,
                kind,
                Some((template, args)),
            )
        })?;
        debug!(name = self.type_name(ty), "instantiated class template");
        Ok(ty)
    }

    /// The function `template<args>`, instantiated once per argument list.
    pub(crate) fn instantiate_function(
        &mut self,
        template: TemplateId,
        args: &[TemplateArg],
    ) -> EvalResult<FunctionId> {
        if let Some(f) = self.templates.cached_function(template, args) {
            return Ok(f);
        }
        let def = self.templates.get(template).clone();
        let owner = match def.item {
            TemplateItem::Function { owner } => owner,
            TemplateItem::Class { .. } => None,
        };
        let inst = self.bind_template_scope(&def, args)?;
        let fn_scope = self.scopes.create(ScopeKind::Function, Some(inst));
        let id = self.with_tree(Rc::clone(&def.tree), |interp, tree| {
            interp.build_function(tree.node(def.node), fn_scope, owner)
        })?;
        self.templates.cache_function(template, args, id);
        debug!(
            name = %self.render_instance(&def, args),
            "instantiated function template"
        );
        Ok(id)
    }

    /// Complete the argument list of a function template from `explicit`
    /// arguments and the types of the call's arguments.
    ///
    /// Returns `None` when the call cannot match: a conflicting deduction,
    /// or a parameter left unbound.
    pub(crate) fn deduce_template_args(
        &self,
        template: TemplateId,
        arg_types: &[TypeId],
        explicit: &[TemplateArg],
    ) -> Option<Vec<TemplateArg>> {
        let def = self.templates.get(template);
        if explicit.len() > def.params.len() {
            return None;
        }
        let mut bound: Vec<Option<TemplateArg>> = vec![None; def.params.len()];
        for (slot, &arg) in bound.iter_mut().zip(explicit) {
            *slot = Some(arg);
        }

        let node = def.tree.node(def.node);
        let Some(params) = node.find_child(NodeKind::Parameters) else {
            return None;
        };
        let mut args = arg_types;
        if let TemplateItem::Function { owner: Some(_) } = def.item {
            let explicit_self = params
                .child(0)
                .is_some_and(|p| p.text() == self.names.self_);
            if !explicit_self && !args.is_empty() {
                args = &args[1..];
            }
        }

        for (param, &arg) in params.children().zip(args) {
            if param.text() == self.names.ellipsis {
                break;
            }
            if let Some(pattern) = param.find_child(NodeKind::TypeName) {
                if !self.deduce_from(def, pattern, arg, &mut bound) {
                    return None;
                }
            }
        }
        bound.into_iter().collect()
    }

    /// Match the type pattern `pattern` against `arg`, binding template
    /// parameters it names. `false` on a conflict.
    fn deduce_from(
        &self,
        def: &TemplateDef,
        pattern: NodeRef<'_>,
        arg: TypeId,
        bound: &mut [Option<TemplateArg>],
    ) -> bool {
        let name = pattern.text();
        if pattern.child_count() == 0 {
            return match def
                .params
                .iter()
                .position(|p| p.name == name && p.kind == TemplateParamKind::Type)
            {
                Some(i) => bind(bound, i, TemplateArg::Type(arg)),
                None => true,
            };
        }

        let arg_ty = self.types.get(arg);
        match TemplateKind::from_name(self.name(name)) {
            Some(TemplateKind::Ref) => {
                let target = arg_ty.reference_target().unwrap_or(arg);
                pattern
                    .child(0)
                    .map_or(true, |inner| self.deduce_from(def, inner, target, bound))
            }
            Some(kind) => match arg_ty.kind() {
                TypeKind::Template { kind: k, args } if *k == kind => {
                    self.deduce_args(def, pattern, args, bound)
                }
                _ => false,
            },
            None => match arg_ty.structural().and_then(|s| s.template.as_ref()) {
                Some((origin, args)) if self.templates.get(*origin).name == name => {
                    self.deduce_args(def, pattern, args, bound)
                }
                // Not a template pattern this argument can inform.
                _ => true,
            },
        }
    }

    fn deduce_args(
        &self,
        def: &TemplateDef,
        pattern: NodeRef<'_>,
        args: &[TemplateArg],
        bound: &mut [Option<TemplateArg>],
    ) -> bool {
        for (child, &arg) in pattern.children().zip(args) {
            let ok = match arg {
                TemplateArg::Type(t) => self.deduce_from(def, child, t, bound),
                TemplateArg::Int(n) if child.child_count() == 0 => {
                    match def.params.iter().position(|p| {
                        p.name == child.text() && matches!(p.kind, TemplateParamKind::Value(_))
                    }) {
                        Some(i) => bind(bound, i, TemplateArg::Int(n)),
                        None => true,
                    }
                }
                TemplateArg::Int(_) => true,
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

/// Bind parameter `i`, or check an earlier binding agrees.
fn bind(bound: &mut [Option<TemplateArg>], i: usize, arg: TemplateArg) -> bool {
    match bound[i] {
        Some(existing) => existing == arg,
        None => {
            bound[i] = Some(arg);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::bind;
    use crate::types::{TemplateArg, TypeId};

    #[test]
    fn conflicting_bindings_are_rejected() {
        let mut bound = vec![None, None];
        assert!(bind(&mut bound, 0, TemplateArg::Type(TypeId::INT32)));
        assert!(bind(&mut bound, 0, TemplateArg::Type(TypeId::INT32)));
        assert!(!bind(&mut bound, 0, TemplateArg::Type(TypeId::INT64)));
        assert!(bind(&mut bound, 1, TemplateArg::Int(3)));
        assert_eq!(bound[1], Some(TemplateArg::Int(3)));
    }
}
