//! The execution context.
//!
//! One [`Interpreter`] owns every table the program touches: the type
//! registry, the scope tree, the function and template tables, the value
//! stack, the string pool and the loaded modules. Executors, lookups and
//! synthesized members are all methods on it, split across the submodules.

mod builder;
mod builtins;
mod construct;
mod declare;
mod interned_names;
mod invoke;
mod lookup;
mod modules;
mod synthesize;
mod templates;

use std::rc::Rc;

use rustc_hash::FxHashSet;
use vex_ir::{Name, NodeId, NodeKey, SharedInterner, SourcePos, SyntaxTree};

use crate::errors::{type_conversion_failure, EvalResult};
use crate::function::FunctionTable;
use crate::memory::{CallInfo, FrameKind, Scalar, Stack, StringPool, Value};
use crate::print_handler::SharedPrintHandler;
use crate::scope::{ScopeId, ScopeTree};
use crate::template::TemplateTable;
use crate::types::{CoreKind, TypeId, TypeRegistry};

pub use builder::{InterpreterBuilder, DEFAULT_MAX_CALL_DEPTH, DEFAULT_STACK_CAPACITY};
pub(crate) use declare::definition_parts;
pub(crate) use invoke::arg_types;
pub(crate) use interned_names::{OpNames, WellKnownNames};
pub(crate) use lookup::Callee;
pub use modules::{Module, ModuleId, ModuleParser};
pub(crate) use modules::ModuleLoader;

pub struct Interpreter {
    pub(crate) interner: SharedInterner,
    pub(crate) names: WellKnownNames,
    pub(crate) ops: OpNames,
    pub(crate) types: TypeRegistry,
    pub(crate) scopes: ScopeTree,
    pub(crate) functions: FunctionTable,
    pub(crate) templates: TemplateTable,
    pub(crate) stack: Stack,
    pub(crate) strings: StringPool,
    pub(crate) modules: ModuleLoader,
    pub(crate) print_handler: SharedPrintHandler,
    pub(crate) max_call_depth: usize,
    pub(crate) call_depth: usize,
    /// Tree of the code currently executing; declarations capture it.
    pub(crate) current_tree: Rc<SyntaxTree>,
    /// Position of the last statement started, for error reports.
    pub(crate) last_pos: SourcePos,
    /// Declaration nodes already processed.
    pub(crate) declared: FxHashSet<NodeKey>,
}

impl Interpreter {
    /// An interpreter with default settings and stdout output.
    pub fn new() -> Self {
        InterpreterBuilder::new().build()
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn print_handler(&self) -> &SharedPrintHandler {
        &self.print_handler
    }

    pub fn last_pos(&self) -> SourcePos {
        self.last_pos
    }

    #[inline]
    pub fn name(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    #[inline]
    pub fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    #[inline]
    pub fn type_name(&self, ty: TypeId) -> &str {
        self.types.name(ty)
    }

    /// Scope of the innermost frame.
    pub fn current_scope(&self) -> ScopeId {
        self.stack.top().map_or(ScopeId::UNIVERSE, |f| f.scope)
    }

    /// Call record of the innermost function frame.
    pub(crate) fn current_call(&self) -> Option<CallInfo> {
        self.stack
            .frames()
            .iter()
            .rev()
            .find(|f| f.kind == FrameKind::Function)
            .and_then(|f| f.call)
    }

    /// Evaluate one node of `tree`: an expression yields its value, a
    /// statement or declaration yields `None`.
    ///
    /// On error the frames pushed during evaluation are discarded.
    pub fn evaluate(&mut self, tree: &Rc<SyntaxTree>, node: NodeId) -> EvalResult<Option<Value>> {
        let depth = self.stack.depth();
        let result = self.with_tree(Rc::clone(tree), |interp, tree| {
            let node = tree.node(node);
            if node.kind().is_operand() {
                interp.evaluate_expression(node).map(Some)
            } else {
                interp.exec_statement(node).map(|_| None)
            }
        });
        if result.is_err() {
            self.unwind_to(depth);
        }
        result
    }

    /// Run `f` with `tree` as the current tree.
    pub(crate) fn with_tree<R>(
        &mut self,
        tree: Rc<SyntaxTree>,
        f: impl FnOnce(&mut Self, &SyntaxTree) -> EvalResult<R>,
    ) -> EvalResult<R> {
        let local = Rc::clone(&tree);
        let saved = std::mem::replace(&mut self.current_tree, tree);
        let result = f(self, &local);
        self.current_tree = saved;
        result
    }

    // Frames

    /// Run `f` inside a new frame.
    ///
    /// On success the frame's aggregates are destroyed before it pops; on
    /// error it is discarded without running destructors.
    pub(crate) fn with_frame<R>(
        &mut self,
        scope: ScopeId,
        kind: FrameKind,
        call: Option<CallInfo>,
        f: impl FnOnce(&mut Self) -> EvalResult<R>,
    ) -> EvalResult<R> {
        let depth = self.stack.depth();
        self.stack.push_frame(scope, kind, call);
        match f(self) {
            Ok(result) => {
                self.pop_frames_to(depth)?;
                Ok(result)
            }
            Err(e) => {
                self.unwind_to(depth);
                Err(e)
            }
        }
    }

    /// Pop frames down to `depth`, destroying their aggregates in reverse
    /// allocation order.
    pub fn pop_frames_to(&mut self, depth: usize) -> EvalResult<()> {
        while self.stack.depth() > depth {
            let doomed = match self.stack.top_mut() {
                Some(frame) => frame.take_destructibles(),
                None => break,
            };
            for value in doomed.into_iter().rev() {
                if let Err(e) = self.destroy(value) {
                    self.unwind_to(depth);
                    return Err(e);
                }
            }
            self.stack.pop_frame();
        }
        Ok(())
    }

    /// Drop frames down to `depth` without running destructors.
    pub(crate) fn unwind_to(&mut self, depth: usize) {
        while self.stack.depth() > depth {
            self.stack.pop_frame();
        }
    }

    // Values

    pub fn allocate(&mut self, ty: TypeId) -> EvalResult<Value> {
        self.stack.allocate(&self.types, ty, None)
    }

    /// Void result, located at the mark.
    pub(crate) fn void_value(&self) -> Value {
        Value::new(TypeId::VOID, self.stack.mark())
    }

    /// Core kind of a value that reads as a scalar; enums read as `Int32`.
    pub(crate) fn scalar_kind(&self, ty: TypeId) -> Option<CoreKind> {
        let t = self.types.get(ty);
        t.core()
            .or_else(|| t.is_enum().then_some(CoreKind::Int32))
    }

    pub fn read_scalar(&self, value: Value) -> EvalResult<Scalar> {
        let kind = self
            .scalar_kind(value.ty)
            .ok_or_else(|| type_conversion_failure(self.type_name(value.ty), "scalar"))?;
        self.stack.read_scalar(value.addr, kind)
    }

    pub fn write_scalar(&mut self, value: Value, scalar: Scalar) -> EvalResult<()> {
        let kind = self
            .scalar_kind(value.ty)
            .ok_or_else(|| type_conversion_failure(self.type_name(value.ty), "scalar"))?;
        self.stack.write_scalar(value.addr, kind, scalar)
    }

    pub fn alloc_scalar(&mut self, ty: TypeId, scalar: Scalar) -> EvalResult<Value> {
        let value = self.allocate(ty)?;
        self.write_scalar(value, scalar)?;
        Ok(value)
    }

    pub fn alloc_bool(&mut self, b: bool) -> EvalResult<Value> {
        self.alloc_scalar(TypeId::BOOL, Scalar::Bool(b))
    }

    pub fn alloc_str(&mut self, s: &str) -> EvalResult<Value> {
        let id = self.strings.intern(s);
        self.alloc_scalar(TypeId::STR, Scalar::UInt(id))
    }

    pub fn read_bool(&self, value: Value) -> EvalResult<bool> {
        if value.ty != TypeId::BOOL {
            return Err(type_conversion_failure(self.type_name(value.ty), "Bool"));
        }
        Ok(self.read_scalar(value)?.as_bool())
    }

    pub fn read_str(&self, value: Value) -> EvalResult<&str> {
        if value.ty != TypeId::STR {
            return Err(type_conversion_failure(self.type_name(value.ty), "Str"));
        }
        let id = self.read_scalar(value)?.as_u64();
        self.strings
            .get(id)
            .ok_or_else(|| crate::errors::invalid_memory_access(value.addr, 8))
    }

    /// The target of a `Ref` value; any other value is returned as is.
    pub(crate) fn strip_ref(&self, value: Value) -> EvalResult<Value> {
        match self.types.get(value.ty).reference_target() {
            Some(target) => Ok(Value::new(target, self.stack.read_addr(value.addr)?)),
            None => Ok(value),
        }
    }

    /// A place of type `ty`: `value` itself or the target of a `Ref<ty>`.
    pub(crate) fn place_of(&self, value: Value, ty: TypeId) -> EvalResult<Value> {
        if value.ty == ty {
            return Ok(value);
        }
        if self.types.get(value.ty).reference_target() == Some(ty) {
            return self.strip_ref(value);
        }
        Err(type_conversion_failure(self.type_name(value.ty), self.type_name(ty)))
    }

    /// `Ref<ty>`, instantiated on demand.
    pub(crate) fn reference_type(&mut self, ty: TypeId) -> EvalResult<TypeId> {
        self.types.reference_to(&mut self.scopes, ty)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
