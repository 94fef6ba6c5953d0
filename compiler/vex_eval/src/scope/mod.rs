//! Lexical scopes.
//!
//! Scopes hold declarations: types, functions, operators, templates and
//! bound template parameters. They form a tree through parent links; a
//! module scope can also import other module scopes. Variables are not
//! stored here; they live in stack frames (see [`crate::memory`]).

mod overload;

use rustc_hash::FxHashMap;
use vex_ir::{Name, NodeKey};

use crate::function::FunctionId;
use crate::template::TemplateId;
use crate::types::{TemplateArg, TypeId};

pub use overload::{resolve, signature_matches, CallSite};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Root of every scope chain; holds the built-in types and natives.
    pub const UNIVERSE: Self = Self(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Universe,
    Module,
    Function,
    Block,
    Loop,
    /// A class body: also the member table of the class type.
    Class,
    /// Member table of a built-in type.
    Members,
    /// Bindings of one template instantiation.
    Template,
}

/// A bound template parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TemplateBinding {
    pub arg: TemplateArg,
    /// Declared type of a value parameter.
    pub value_type: Option<TypeId>,
}

#[derive(Debug)]
pub struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    types: FxHashMap<Name, TypeId>,
    functions: FxHashMap<Name, Vec<FunctionId>>,
    operators: FxHashMap<Name, Vec<FunctionId>>,
    template_functions: FxHashMap<Name, Vec<TemplateId>>,
    template_types: FxHashMap<Name, TemplateId>,
    template_params: FxHashMap<Name, TemplateBinding>,
    imports: Vec<ScopeId>,
    /// Class type this scope is the body of.
    owner: Option<TypeId>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Scope {
            kind,
            parent,
            types: FxHashMap::default(),
            functions: FxHashMap::default(),
            operators: FxHashMap::default(),
            template_functions: FxHashMap::default(),
            template_types: FxHashMap::default(),
            template_params: FxHashMap::default(),
            imports: Vec::new(),
            owner: None,
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn owner(&self) -> Option<TypeId> {
        self.owner
    }

    pub fn set_owner(&mut self, ty: TypeId) {
        self.owner = Some(ty);
    }

    pub fn imports(&self) -> &[ScopeId] {
        &self.imports
    }

    pub fn add_import(&mut self, scope: ScopeId) {
        if !self.imports.contains(&scope) {
            self.imports.push(scope);
        }
    }

    /// Register a type name. Returns the previous binding on conflict.
    pub fn register_type(&mut self, name: Name, ty: TypeId) -> Result<(), TypeId> {
        match self.types.get(&name) {
            Some(&existing) if existing != ty => Err(existing),
            _ => {
                self.types.insert(name, ty);
                Ok(())
            }
        }
    }

    pub fn find_type(&self, name: Name) -> Option<TypeId> {
        self.types.get(&name).copied()
    }

    pub fn register_function(&mut self, name: Name, id: FunctionId) {
        self.functions.entry(name).or_default().push(id);
    }

    /// Overloads of `name` in declaration order.
    pub fn find_function(&self, name: Name) -> &[FunctionId] {
        self.functions.get(&name).map_or(&[], Vec::as_slice)
    }

    pub fn register_operator(&mut self, symbol: Name, id: FunctionId) {
        self.operators.entry(symbol).or_default().push(id);
    }

    pub fn find_operator(&self, symbol: Name) -> &[FunctionId] {
        self.operators.get(&symbol).map_or(&[], Vec::as_slice)
    }

    pub fn register_template_function(&mut self, name: Name, id: TemplateId) {
        self.template_functions.entry(name).or_default().push(id);
    }

    pub fn find_template_functions(&self, name: Name) -> &[TemplateId] {
        self.template_functions.get(&name).map_or(&[], Vec::as_slice)
    }

    pub fn register_template_type(&mut self, name: Name, id: TemplateId) -> Result<(), TemplateId> {
        match self.template_types.get(&name) {
            Some(&existing) if existing != id => Err(existing),
            _ => {
                self.template_types.insert(name, id);
                Ok(())
            }
        }
    }

    pub fn find_template_type(&self, name: Name) -> Option<TemplateId> {
        self.template_types.get(&name).copied()
    }

    pub fn bind_template_param(&mut self, name: Name, binding: TemplateBinding) {
        self.template_params.insert(name, binding);
    }

    pub fn find_template_param(&self, name: Name) -> Option<TemplateBinding> {
        self.template_params.get(&name).copied()
    }
}

/// Arena of scopes.
///
/// Scopes for syntax nodes are created on first execution and cached by
/// node and parent, so a loop body re-entered many times reuses one scope
/// while the same body inside two template instances gets one each.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    by_node: FxHashMap<(NodeKey, ScopeId), ScopeId>,
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope::new(ScopeKind::Universe, None)],
            by_node: FxHashMap::default(),
        }
    }

    pub fn create(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).unwrap_or(u32::MAX));
        self.scopes.push(Scope::new(kind, parent));
        id
    }

    /// The scope attached to a syntax node, created on first use.
    pub fn scope_for(&mut self, key: NodeKey, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        if let Some(&id) = self.by_node.get(&(key, parent)) {
            return id;
        }
        let id = self.create(kind, Some(parent));
        self.by_node.insert((key, parent), id);
        id
    }

    #[inline]
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// `id` and its ancestors, innermost first.
    pub fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(id), move |&s| self.get(s).parent)
    }

    /// Module scope `id` was declared in.
    pub fn enclosing_module(&self, id: ScopeId) -> Option<ScopeId> {
        self.ancestors(id)
            .find(|&s| self.get(s).kind == ScopeKind::Module)
    }

    /// Nearest enclosing class type.
    pub fn enclosing_class(&self, id: ScopeId) -> Option<TypeId> {
        self.ancestors(id).find_map(|s| self.get(s).owner)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
