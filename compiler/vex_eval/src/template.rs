//! User template definitions and their instantiation caches.
//!
//! A template keeps its syntax and declaring scope. Instantiating it binds
//! the parameters in a fresh scope and declares the body there; each
//! distinct argument list is instantiated once.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use vex_ir::{Name, NodeId, SyntaxTree};

use crate::function::FunctionId;
use crate::scope::ScopeId;
use crate::types::{TemplateArg, TypeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TemplateId(u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TemplateParamKind {
    /// Binds a type.
    Type,
    /// Binds an integer constant of the given type.
    Value(TypeId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TemplateParam {
    pub name: Name,
    pub kind: TemplateParamKind,
}

impl TemplateParam {
    /// Whether `arg` has the right shape for this parameter.
    pub fn admits(&self, arg: TemplateArg) -> bool {
        matches!(
            (self.kind, arg),
            (TemplateParamKind::Type, TemplateArg::Type(_))
                | (TemplateParamKind::Value(_), TemplateArg::Int(_))
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TemplateItem {
    /// A function; `owner` is set for member templates.
    Function { owner: Option<TypeId> },
    Class { union: bool },
}

#[derive(Clone, Debug)]
pub struct TemplateDef {
    pub name: Name,
    pub params: Vec<TemplateParam>,
    pub tree: Rc<SyntaxTree>,
    pub node: NodeId,
    /// Scope the template was declared in.
    pub scope: ScopeId,
    pub item: TemplateItem,
}

#[derive(Debug, Default)]
pub struct TemplateTable {
    defs: Vec<TemplateDef>,
    function_instances: FxHashMap<(TemplateId, Vec<TemplateArg>), FunctionId>,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: TemplateDef) -> TemplateId {
        let id = TemplateId(u32::try_from(self.defs.len()).unwrap_or(u32::MAX));
        self.defs.push(def);
        id
    }

    #[inline]
    pub fn get(&self, id: TemplateId) -> &TemplateDef {
        &self.defs[id.0 as usize]
    }

    pub fn cached_function(&self, id: TemplateId, args: &[TemplateArg]) -> Option<FunctionId> {
        self.function_instances.get(&(id, args.to_vec())).copied()
    }

    pub fn cache_function(&mut self, id: TemplateId, args: &[TemplateArg], function: FunctionId) {
        self.function_instances.insert((id, args.to_vec()), function);
    }
}
