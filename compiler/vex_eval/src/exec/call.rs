//! Calls, member access, scope resolution and indexing.

use smallvec::SmallVec;
use vex_ir::{Name, NodeKind, NodeRef};

use super::expr::Operand;
use crate::errors::{
    invalid_memory_access, no_matching_overload, type_conversion_failure, unexpected_node,
    unresolved_identifier, EvalResult,
};
use crate::interpreter::arg_types;
use crate::memory::{Scalar, Value};
use crate::scope::{resolve, signature_matches, CallSite};
use crate::types::{TemplateArg, TypeId};
use crate::Interpreter;

type Args = SmallVec<[Value; 4]>;

impl Interpreter {
    /// `callee(args...)`: arguments evaluate left to right before the
    /// callee is resolved.
    pub(crate) fn reduce_call<'t>(&mut self, callee: Operand<'t>, node: NodeRef<'t>) -> EvalResult<Operand<'t>> {
        let mut args = Args::with_capacity(node.child_count());
        for arg in node.children() {
            args.push(self.evaluate_expression(arg)?);
        }
        let result = self.call_operand(callee, &args)?;
        Ok(Operand::Value(result.unwrap_or_else(|| self.void_value())))
    }

    fn call_operand(&mut self, callee: Operand<'_>, args: &[Value]) -> EvalResult<Option<Value>> {
        match callee {
            Operand::Pending(node) if node.kind() == NodeKind::Identifier => {
                self.call_named(node.text(), &[], args)
            }
            Operand::Pending(node) => {
                let resolved = self.resolve_operand(node)?;
                self.call_operand(resolved, args)
            }
            Operand::Type(ty) => self.construct_new(ty, args).map(Some),
            Operand::Functions { name, explicit } => self.call_named(name, &explicit, args),
            Operand::Overloads { name, candidates } => {
                let types = arg_types(args);
                let found = resolve(&self.types, &self.functions, &candidates, CallSite::free(&types))
                    .or_else(|| {
                        resolve(&self.types, &self.functions, &candidates, CallSite::method(&types))
                    });
                match found {
                    Some(f) => self.invoke(f, args),
                    None => Err(no_matching_overload(self.name(name), &self.type_names(args))),
                }
            }
            Operand::Method { receiver, name } => self.call_method(receiver, name, args),
            Operand::Value(value) => self.call_value(value, args),
        }
    }

    /// Call by name.
    ///
    /// Tried in order: a variable holding a function, overloads and
    /// same-named types in scope, function templates, then methods of
    /// `self` when inside a method.
    fn call_named(&mut self, name: Name, explicit: &[TemplateArg], args: &[Value]) -> EvalResult<Option<Value>> {
        if explicit.is_empty() {
            if let Some(value) = self.lookup_variable(name)? {
                return self.call_value(value, args);
            }
        }

        let mut seen = false;
        if explicit.is_empty() {
            let candidates = self.function_candidates(name);
            seen |= !candidates.is_empty();
            if let Some(callee) = self.select_callee(&candidates, args)? {
                return self.invoke_callee(callee, args);
            }
        }

        let types = arg_types(args);
        let templates = self.template_function_candidates(name);
        seen |= !templates.is_empty();
        for template in templates {
            let Some(targs) = self.deduce_template_args(template, &types, explicit) else {
                continue;
            };
            let f = self.instantiate_function(template, &targs)?;
            if signature_matches(&self.types, self.functions.get(f), CallSite::free(&types)) {
                return self.invoke(f, args);
            }
        }

        if let Some(receiver) = self.implicit_self()? {
            let members = self.types.get(receiver.ty).members();
            let scope = self.scopes.get(members);
            if !scope.find_function(name).is_empty() || !scope.find_template_functions(name).is_empty() {
                return self.call_method(receiver, name, args);
            }
        }

        if !seen {
            let scope = self.current_scope();
            if let Some(TemplateArg::Type(ty)) = self.find_template_param(scope, name).map(|b| b.arg) {
                return self.construct_new(ty, args).map(Some);
            }
            if let Some(ty) = self.resolve_type_name(scope, name) {
                return self.construct_new(ty, args).map(Some);
            }
            return Err(unresolved_identifier(self.name(name)));
        }
        Err(no_matching_overload(self.name(name), &self.type_names(args)))
    }

    /// The receiver of the innermost method call, if any.
    fn implicit_self(&self) -> EvalResult<Option<Value>> {
        if self.current_call().and_then(|c| c.class).is_none() {
            return Ok(None);
        }
        match self.lookup_variable(self.names.self_)? {
            Some(this) => self.strip_ref(this).map(Some),
            None => Ok(None),
        }
    }

    /// Call through a value: a function or method value, or an object with
    /// an `operator()`.
    fn call_value(&mut self, value: Value, args: &[Value]) -> EvalResult<Option<Value>> {
        let value = self.strip_ref(value)?;
        match value.ty {
            TypeId::FUNCTION => {
                let raw = self.stack.read_u64(value.addr)?;
                let f = self
                    .functions
                    .checked(raw)
                    .ok_or_else(|| invalid_memory_access(value.addr, 8))?;
                self.invoke(f, args)
            }
            TypeId::METHOD => {
                let receiver_addr = self.stack.read_addr(value.addr)?;
                let raw = self.stack.read_u64(value.addr + 8)?;
                let f = self
                    .functions
                    .checked(raw)
                    .ok_or_else(|| invalid_memory_access(value.addr + 8, 8))?;
                let Some(class) = self.functions.get(f).owner else {
                    return self.invoke(f, args);
                };
                let mut full = Args::with_capacity(args.len() + 1);
                full.push(Value::new(class, receiver_addr));
                full.extend_from_slice(args);
                self.invoke(f, &full)
            }
            _ => {
                let mut full = Args::with_capacity(args.len() + 1);
                full.push(value);
                full.extend_from_slice(args);
                match self.try_operator(self.ops.call, &full)? {
                    Some(result) => Ok(Some(result)),
                    None => Err(type_conversion_failure(self.type_name(value.ty), "function")
                        .with_hint("the value has no operator()")),
                }
            }
        }
    }

    /// `left.right`.
    pub(crate) fn member_access<'t>(&mut self, left: Operand<'t>, right: Operand<'t>) -> EvalResult<Operand<'t>> {
        let receiver = self.operand_value(left)?;
        let Operand::Pending(member) = right else {
            return Err(unexpected_node(NodeKind::Operator));
        };
        self.member_of(receiver, member.text())
    }

    /// A field of `receiver` as a view into it, or a method reference.
    /// A reference with no such member of its own is looked through.
    fn member_of<'t>(&mut self, receiver: Value, name: Name) -> EvalResult<Operand<'t>> {
        let field = self
            .types
            .get(receiver.ty)
            .structural()
            .and_then(|s| s.field(name))
            .map(|f| (f.ty, f.offset));
        if let Some((ty, offset)) = field {
            return Ok(Operand::Value(receiver.at_offset(ty, offset)));
        }

        self.ensure_initialized(receiver.ty)?;
        let members = self.scopes.get(self.types.get(receiver.ty).members());
        if !members.find_function(name).is_empty() || !members.find_template_functions(name).is_empty() {
            return Ok(Operand::Method { receiver, name });
        }

        if self.types.get(receiver.ty).reference_target().is_some() {
            let target = self.strip_ref(receiver)?;
            return self.member_of(target, name);
        }
        Err(unresolved_identifier(format!(
            "{}.{}",
            self.type_name(receiver.ty),
            self.name(name)
        )))
    }

    /// `Type::name`: an enumeration constant, a member function set or a
    /// nested type.
    pub(crate) fn scope_resolution<'t>(&mut self, left: Operand<'t>, right: Operand<'t>) -> EvalResult<Operand<'t>> {
        let left = match left {
            Operand::Pending(node) => self.resolve_operand(node)?,
            other => other,
        };
        let Operand::Type(ty) = left else {
            return Err(unexpected_node(NodeKind::Operator)
                .with_hint("the left side of `::` must name a type"));
        };
        let Operand::Pending(member) = right else {
            return Err(unexpected_node(NodeKind::Operator));
        };
        let name = member.text();

        let variant = self
            .types
            .get(ty)
            .structural()
            .and_then(|s| s.variant(name));
        if let Some(v) = variant {
            return self.alloc_scalar(ty, Scalar::Int(v)).map(Operand::Value);
        }

        self.ensure_initialized(ty)?;
        let members = self.scopes.get(self.types.get(ty).members());
        let candidates = members.find_function(name).to_vec();
        if !candidates.is_empty() {
            return Ok(Operand::Overloads { name, candidates });
        }
        if let Some(nested) = members.find_type(name) {
            return Ok(Operand::Type(nested));
        }
        Err(unresolved_identifier(format!(
            "{}::{}",
            self.type_name(ty),
            self.name(name)
        )))
    }

    /// `target[index]`.
    pub(crate) fn reduce_index<'t>(&mut self, target: Operand<'t>, node: NodeRef<'t>) -> EvalResult<Operand<'t>> {
        let target = self.operand_value(target)?;
        let index = node
            .child(0)
            .ok_or_else(|| unexpected_node(NodeKind::Index))?;
        let index = self.evaluate_expression(index)?;
        self.binary_operator(self.ops.index, target, index)
            .map(Operand::Value)
    }
}
