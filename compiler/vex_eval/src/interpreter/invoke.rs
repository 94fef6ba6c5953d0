//! Function invocation and call-target selection.

use std::rc::Rc;

use smallvec::SmallVec;
use tracing::debug;
use vex_ir::{Name, NodeId, NodeKind, SyntaxTree};

use super::{Callee, Interpreter};
use crate::errors::{no_matching_overload, unexpected_node, EvalResult};
use crate::function::{FunctionBody, FunctionId};
use crate::memory::{CallInfo, FrameKind, Value};
use crate::recursion::{check_call_depth, ensure_sufficient_stack};
use crate::scope::{resolve, signature_matches, CallSite, ScopeId};
use crate::types::TypeId;

pub(crate) type ArgTypes = SmallVec<[TypeId; 4]>;

pub(crate) fn arg_types(args: &[Value]) -> ArgTypes {
    args.iter().map(|a| a.ty).collect()
}

impl Interpreter {
    /// Call a function with already-evaluated arguments.
    ///
    /// Returns the return slot for functions with a non-`Void` result.
    #[tracing::instrument(level = "debug", skip_all, fields(function = id.raw()))]
    pub fn invoke(&mut self, id: FunctionId, args: &[Value]) -> EvalResult<Option<Value>> {
        let function = self.functions.get(id);
        if args.len() < function.fixed_params().len() {
            let label = self.name(function.name);
            return Err(no_matching_overload(label, &self.type_names(args)));
        }
        match &function.body {
            FunctionBody::Native(native) => {
                let native = Rc::clone(native);
                let args = self.adapt_native_args(id, args)?;
                native(self, &args)
            }
            FunctionBody::Interpreted { tree, node, scope } => {
                let (tree, node, scope) = (Rc::clone(tree), *node, *scope);
                self.invoke_interpreted(id, tree, node, scope, args)
            }
        }
    }

    /// Natives see places, never references to places: a `Ref<X>`
    /// parameter receives the `X` itself and a by-value parameter handed a
    /// `Ref` receives its target.
    fn adapt_native_args(&self, id: FunctionId, args: &[Value]) -> EvalResult<SmallVec<[Value; 4]>> {
        let fixed = self.functions.get(id).fixed_params();
        let mut out = SmallVec::with_capacity(args.len());
        for (i, &arg) in args.iter().enumerate() {
            let Some(param) = fixed.get(i) else {
                out.push(arg);
                continue;
            };
            let arg_target = self.types.get(arg.ty).reference_target();
            let adapted = match self.types.get(param.ty).reference_target() {
                Some(target) if arg.ty == target || arg_target == Some(target) => {
                    self.place_of(arg, target)?
                }
                Some(_) => arg,
                None if arg_target == Some(param.ty) => self.strip_ref(arg)?,
                None => arg,
            };
            out.push(adapted);
        }
        Ok(out)
    }

    fn invoke_interpreted(
        &mut self,
        id: FunctionId,
        tree: Rc<SyntaxTree>,
        node: NodeId,
        scope: ScopeId,
        args: &[Value],
    ) -> EvalResult<Option<Value>> {
        check_call_depth(self.call_depth, self.max_call_depth)?;
        let function = self.functions.get(id);
        let params: SmallVec<[_; 4]> = function.fixed_params().iter().copied().collect();
        let (ret, owner) = (function.ret, function.owner);
        debug!(name = self.name(function.name), args = args.len(), "call");

        // The return slot belongs to the caller's frame so it outlives ours.
        let return_slot = if ret == TypeId::VOID {
            None
        } else {
            Some(self.allocate(ret)?)
        };
        let call = CallInfo {
            function: id,
            class: owner,
            return_slot,
        };

        self.call_depth += 1;
        let result = ensure_sufficient_stack(|| {
            self.with_tree(tree, |interp, tree| {
                interp.with_frame(scope, FrameKind::Function, Some(call), |interp| {
                    let frame = interp.stack.depth() - 1;
                    for (param, &arg) in params.iter().zip(args) {
                        let slot = interp.stack.reserve(&interp.types, param.ty, false)?;
                        let place = interp.stack.resolve(slot, frame);
                        interp.copy_construct(place, arg)?;
                        interp.stack.frame_mut(frame).bind(param.name, slot);
                    }
                    let body = tree
                        .node(node)
                        .find_child(NodeKind::Block)
                        .ok_or_else(|| unexpected_node(NodeKind::Function))?;
                    interp.exec_statements(body)?;
                    Ok(())
                })
            })
        });
        self.call_depth -= 1;
        result?;
        Ok(return_slot)
    }

    /// Whether `callee` accepts `args` as a free call.
    fn callee_accepts(&mut self, callee: Callee, args: &[Value], types: &[TypeId]) -> EvalResult<bool> {
        match callee {
            Callee::Function(f) => Ok(signature_matches(
                &self.types,
                self.functions.get(f),
                CallSite::free(types),
            )),
            Callee::Constructor(ty) => {
                Ok(args.is_empty() || self.constructor_for(ty, args)?.is_some())
            }
        }
    }

    /// First callee accepting `args`.
    pub(crate) fn select_callee(
        &mut self,
        candidates: &[Callee],
        args: &[Value],
    ) -> EvalResult<Option<Callee>> {
        let types = arg_types(args);
        for (i, &callee) in candidates.iter().enumerate() {
            if !self.callee_accepts(callee, args, &types)? {
                continue;
            }
            for &other in &candidates[i + 1..] {
                if self.callee_accepts(other, args, &types)? {
                    tracing::warn!(?callee, ?other, "ambiguous call; using the first declared");
                    break;
                }
            }
            return Ok(Some(callee));
        }
        Ok(None)
    }

    pub(crate) fn invoke_callee(&mut self, callee: Callee, args: &[Value]) -> EvalResult<Option<Value>> {
        match callee {
            Callee::Function(f) => self.invoke(f, args),
            Callee::Constructor(ty) => self.construct_new(ty, args).map(Some),
        }
    }

    /// Call a method of `receiver`'s type.
    pub(crate) fn call_method(
        &mut self,
        receiver: Value,
        name: Name,
        args: &[Value],
    ) -> EvalResult<Option<Value>> {
        self.ensure_initialized(receiver.ty)?;
        let mut full: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
        full.push(receiver);
        full.extend_from_slice(args);
        let types = arg_types(&full);

        let members = self.types.get(receiver.ty).members();
        let candidates = self.scopes.get(members).find_function(name).to_vec();
        if let Some(f) = resolve(&self.types, &self.functions, &candidates, CallSite::method(&types)) {
            return self.invoke(f, &full);
        }

        let templates = self.scopes.get(members).find_template_functions(name).to_vec();
        for tid in templates {
            let Some(targs) = self.deduce_template_args(tid, &types, &[]) else {
                continue;
            };
            let f = self.instantiate_function(tid, &targs)?;
            if signature_matches(&self.types, self.functions.get(f), CallSite::method(&types)) {
                return self.invoke(f, &full);
            }
        }

        let label = format!("{}.{}", self.type_name(receiver.ty), self.name(name));
        Err(no_matching_overload(label, &self.type_names(args)))
    }

    /// Rendered argument types for diagnostics.
    pub(crate) fn type_names(&self, args: &[Value]) -> Vec<&str> {
        args.iter().map(|a| self.type_name(a.ty)).collect()
    }
}
