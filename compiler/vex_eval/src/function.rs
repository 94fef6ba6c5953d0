//! Callables.
//!
//! Native functions (built-ins and synthesized members) and interpreted
//! functions (declared in source) share one table and one calling
//! convention: a list of argument [`Value`]s in, an optional result out.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use vex_ir::{Name, NodeId, SyntaxTree};

use crate::errors::EvalResult;
use crate::interpreter::Interpreter;
use crate::memory::Value;
use crate::scope::ScopeId;
use crate::types::TypeId;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FunctionId(u32);

impl FunctionId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionId({})", self.0)
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u8 {
        /// The last parameter is a `...` tail taking any number of arguments.
        const VARIADIC = 1 << 0;
        /// Named `construct`.
        const CONSTRUCTOR = 1 << 1;
        /// Returns `Ref<T>`: the result is an lvalue.
        const RETURNS_REF = 1 << 2;
        /// First parameter is named `self`.
        const METHOD = 1 << 3;
        /// Generated by the engine rather than declared in source.
        const SYNTHESIZED = 1 << 4;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Name,
    pub ty: TypeId,
}

/// Host-implemented behavior.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> EvalResult<Option<Value>>>;

#[derive(Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    Interpreted {
        tree: Rc<SyntaxTree>,
        /// The `Function` node.
        node: NodeId,
        /// Scope the body executes in.
        scope: ScopeId,
    },
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Native(_) => f.write_str("Native"),
            FunctionBody::Interpreted { node, scope, .. } => f
                .debug_struct("Interpreted")
                .field("node", node)
                .field("scope", scope)
                .finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: Name,
    pub params: Vec<Param>,
    pub ret: TypeId,
    pub flags: FunctionFlags,
    /// Class this function is a member of.
    pub owner: Option<TypeId>,
    pub body: FunctionBody,
}

impl Function {
    /// Build a function, deriving the `METHOD` flag from the first
    /// parameter's name.
    pub fn new(
        name: Name,
        params: Vec<Param>,
        ret: TypeId,
        mut flags: FunctionFlags,
        owner: Option<TypeId>,
        body: FunctionBody,
        self_name: Name,
    ) -> Self {
        if params.first().is_some_and(|p| p.name == self_name) {
            flags |= FunctionFlags::METHOD;
        }
        Function {
            name,
            params,
            ret,
            flags,
            owner,
            body,
        }
    }

    #[inline]
    pub fn is_method(&self) -> bool {
        self.flags.contains(FunctionFlags::METHOD)
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.flags.contains(FunctionFlags::VARIADIC)
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }

    /// Parameters without the variadic tail.
    pub fn fixed_params(&self) -> &[Param] {
        if self.is_variadic() {
            &self.params[..self.params.len().saturating_sub(1)]
        } else {
            &self.params
        }
    }
}

/// Every function the program can call, by id.
#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: Vec<Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(u32::try_from(self.functions.len()).unwrap_or(u32::MAX));
        self.functions.push(function);
        id
    }

    /// Ids are only minted by [`add`](Self::add), so the index is valid.
    #[inline]
    pub fn get(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    /// Resolve a raw id read back from memory (a `Function` value).
    pub fn checked(&self, raw: u64) -> Option<FunctionId> {
        let index = usize::try_from(raw).ok()?;
        (index < self.functions.len()).then(|| FunctionId(index as u32))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
