//! Runtime name resolution.
//!
//! Variables live in frames, so they are found by walking the live frame
//! stack. Declarations live in scopes, so types resolve along the lexical
//! scope chain, while function names gather candidates from the scopes of
//! every live frame.

use rustc_hash::FxHashSet;
use vex_ir::Name;

use super::Interpreter;
use crate::errors::EvalResult;
use crate::function::FunctionId;
use crate::memory::{FrameKind, Value};
use crate::scope::{ScopeId, TemplateBinding};
use crate::template::TemplateId;
use crate::types::TypeId;

/// Something a call by name can reach.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Callee {
    Function(FunctionId),
    /// A same-named type: the call constructs it.
    Constructor(TypeId),
}

impl Interpreter {
    /// Find a variable.
    ///
    /// Frames are searched innermost first up to the nearest function or
    /// root frame. Inside a method, fields of `self` come next. Globals
    /// come last: those of the module the code belongs to, then of the
    /// modules it imports, then of the universe. Locals of calling
    /// functions and globals of unrelated modules are never visible.
    pub fn lookup_variable(&self, name: Name) -> EvalResult<Option<Value>> {
        let frames = self.stack.frames();
        let mut method = None;
        for (index, frame) in frames.iter().enumerate().rev() {
            if let Some(slot) = frame.local(name) {
                return Ok(Some(self.stack.resolve(slot, index)));
            }
            if frame.kind == FrameKind::Function || frame.kind.is_root() {
                method = frame.call.and_then(|c| c.class).map(|class| (index, class));
                break;
            }
        }

        if let Some((index, class)) = method {
            if let Some(field) = self.field_through_self(index, class, name)? {
                return Ok(Some(field));
            }
        }

        for index in self.global_frames(self.current_scope()) {
            if let Some(slot) = frames[index].local(name) {
                return Ok(Some(self.stack.resolve(slot, index)));
            }
        }
        Ok(None)
    }

    /// Root frames holding the globals visible from `scope`, in lookup
    /// order.
    fn global_frames(&self, scope: ScopeId) -> Vec<usize> {
        let own = self.scopes.enclosing_module(scope);
        let imported = self
            .scopes
            .ancestors(scope)
            .flat_map(|s| self.scopes.get(s).imports().iter().copied());
        let mut out = Vec::new();
        for s in own.into_iter().chain(imported).chain(std::iter::once(ScopeId::UNIVERSE)) {
            if let Some(index) = self.root_frame(s) {
                if !out.contains(&index) {
                    out.push(index);
                }
            }
        }
        out
    }

    /// Index of the live root frame of module (or universe) scope `scope`.
    fn root_frame(&self, scope: ScopeId) -> Option<usize> {
        self.stack
            .frames()
            .iter()
            .position(|f| f.kind.is_root() && f.scope == scope)
    }

    fn field_through_self(&self, frame: usize, class: TypeId, name: Name) -> EvalResult<Option<Value>> {
        let Some(slot) = self.stack.frame(frame).local(self.names.self_) else {
            return Ok(None);
        };
        let Some(field) = self
            .types
            .get(class)
            .structural()
            .and_then(|s| s.field(name))
            .map(|f| (f.ty, f.offset))
        else {
            return Ok(None);
        };
        let receiver = self.strip_ref(self.stack.resolve(slot, frame))?;
        Ok(Some(receiver.at_offset(field.0, field.1)))
    }

    /// `scope`, its ancestors and the modules each of them imports.
    pub(crate) fn scope_closure(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut out = Vec::new();
        for s in self.scopes.ancestors(scope) {
            out.push(s);
            out.extend_from_slice(self.scopes.get(s).imports());
        }
        out
    }

    /// Every scope reachable from a live frame, innermost frame first.
    fn visible_scopes(&self) -> Vec<ScopeId> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for frame in self.stack.frames().iter().rev() {
            for scope in self.scope_closure(frame.scope) {
                if seen.insert(scope) {
                    out.push(scope);
                }
            }
        }
        out
    }

    /// Overloads named `name` plus same-named types, from every live frame.
    pub(crate) fn function_candidates(&self, name: Name) -> Vec<Callee> {
        let mut out = Vec::new();
        for scope in self.visible_scopes() {
            let scope = self.scopes.get(scope);
            for &f in scope.find_function(name) {
                let callee = Callee::Function(f);
                if !out.contains(&callee) {
                    out.push(callee);
                }
            }
            if let Some(ty) = scope.find_type(name) {
                let callee = Callee::Constructor(ty);
                if !out.contains(&callee) {
                    out.push(callee);
                }
            }
        }
        out
    }

    /// Free operator overloads for `symbol`, from every live frame.
    pub(crate) fn operator_candidates(&self, symbol: Name) -> Vec<FunctionId> {
        let mut out: Vec<FunctionId> = Vec::new();
        for scope in self.visible_scopes() {
            for &f in self.scopes.get(scope).find_operator(symbol) {
                if !out.contains(&f) {
                    out.push(f);
                }
            }
        }
        out
    }

    pub(crate) fn template_function_candidates(&self, name: Name) -> Vec<TemplateId> {
        let mut out: Vec<TemplateId> = Vec::new();
        for scope in self.visible_scopes() {
            for &t in self.scopes.get(scope).find_template_functions(name) {
                if !out.contains(&t) {
                    out.push(t);
                }
            }
        }
        out
    }

    /// Resolve a plain type name from `scope`.
    pub fn resolve_type_name(&self, scope: ScopeId, name: Name) -> Option<TypeId> {
        self.scope_closure(scope)
            .into_iter()
            .find_map(|s| self.scopes.get(s).find_type(name))
    }

    pub(crate) fn find_template_param(&self, scope: ScopeId, name: Name) -> Option<TemplateBinding> {
        self.scopes
            .ancestors(scope)
            .find_map(|s| self.scopes.get(s).find_template_param(name))
    }

    pub(crate) fn find_template_type(&self, scope: ScopeId, name: Name) -> Option<TemplateId> {
        self.scope_closure(scope)
            .into_iter()
            .find_map(|s| self.scopes.get(s).find_template_type(name))
    }
}
