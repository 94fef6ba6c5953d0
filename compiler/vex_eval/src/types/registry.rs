//! Type registry: canonical storage for every type the program mentions.
//!
//! Types are keyed by the hash of their rendered name, so `Ref<Int32>`
//! written in two modules yields the same [`TypeId`]. Colliding hashes are
//! chained and told apart by comparing names.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;
use tracing::trace;

use super::{
    CallableKind, CoreKind, Field, StructKind, StructuralType, TemplateArg, TemplateArgs,
    TemplateKind, Type, TypeId, TypeKind,
};
use crate::errors::{redefinition, unknown_type, EvalResult};
use crate::scope::{ScopeId, ScopeKind, ScopeTree};

/// Size of `Ref<T>` and `Address<T>`.
const POINTER_SIZE: usize = 8;

/// Hash of a rendered type name.
pub fn hash_name(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Result of [`TypeRegistry::find_or_create`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interned {
    pub id: TypeId,
    /// The type did not exist before this call.
    pub created: bool,
}

pub struct TypeRegistry {
    types: Vec<Type>,
    by_hash: FxHashMap<u64, SmallVec<[TypeId; 1]>>,
}

impl TypeRegistry {
    /// Create a registry with every core and callable type registered at
    /// its fixed id.
    pub fn new(scopes: &mut ScopeTree) -> Self {
        let mut registry = TypeRegistry {
            types: Vec::with_capacity(64),
            by_hash: FxHashMap::default(),
        };
        for core in CoreKind::ALL {
            let members = scopes.create(ScopeKind::Members, None);
            registry.push(
                core.name().into(),
                TypeKind::Core(core),
                core.size(),
                members,
                false,
            );
        }
        for callable in [CallableKind::Function, CallableKind::Method] {
            let members = scopes.create(ScopeKind::Members, None);
            registry.push(
                callable.name().into(),
                TypeKind::Callable(callable),
                callable.size(),
                members,
                false,
            );
        }
        debug_assert_eq!(registry.types.len(), TypeId::FIRST_DYNAMIC as usize);
        registry
    }

    fn push(
        &mut self,
        name: String,
        kind: TypeKind,
        size: usize,
        members: ScopeId,
        aggregate: bool,
    ) -> TypeId {
        let id = TypeId::from_raw(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        let hash = hash_name(&name);
        self.types.push(Type {
            name: name.into_boxed_str(),
            hash,
            kind,
            size,
            members,
            aggregate,
            initialized: false,
        });
        self.by_hash.entry(hash).or_default().push(id);
        id
    }

    /// Look up a registered type.
    ///
    /// Ids are only minted by this registry, so the index is always valid.
    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    #[inline]
    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).name()
    }

    #[inline]
    pub fn size(&self, id: TypeId) -> usize {
        self.get(id).size
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Find a type by name hash, comparing names on collision.
    pub fn find(&self, hash: u64, name: &str) -> Option<TypeId> {
        self.by_hash
            .get(&hash)?
            .iter()
            .copied()
            .find(|&id| &*self.get(id).name == name)
    }

    pub fn find_by_name(&self, name: &str) -> Option<TypeId> {
        self.find(hash_name(name), name)
    }

    /// Register a user structural type as an incomplete shell.
    ///
    /// `members` is the class scope that will hold its methods.
    pub fn register(
        &mut self,
        name: String,
        shape: StructuralType,
        members: ScopeId,
    ) -> EvalResult<TypeId> {
        if self.find_by_name(&name).is_some() {
            return Err(redefinition(name));
        }
        let aggregate = shape.kind != StructKind::Enum;
        Ok(self.push(name, TypeKind::Structural(shape), 0, members, aggregate))
    }

    /// Fix the fields (or enum constants) of a registered shell and compute
    /// its layout.
    pub fn complete(
        &mut self,
        id: TypeId,
        mut fields: Vec<Field>,
        variants: Vec<(vex_ir::Name, i64)>,
    ) -> EvalResult<()> {
        let kind = match &self.get(id).kind {
            TypeKind::Structural(s) => s.kind,
            _ => return Err(unknown_type(self.name(id).to_owned())),
        };
        for field in &fields {
            if !self.get(field.ty).is_complete() || field.ty == TypeId::VOID {
                return Err(unknown_type(self.name(field.ty).to_owned())
                    .with_hint(format!("field of `{}` has no size", self.name(id))));
            }
        }

        let (size, align) = match kind {
            StructKind::Enum => (4, 4),
            StructKind::Class => {
                let mut offset: usize = 0;
                let mut align: usize = 1;
                for field in &mut fields {
                    let a = self.align_of(field.ty);
                    offset = offset.next_multiple_of(a);
                    field.offset = offset;
                    offset += self.size(field.ty);
                    align = align.max(a);
                }
                (offset.next_multiple_of(align), align)
            }
            StructKind::Union => {
                let mut size: usize = 0;
                let mut align: usize = 1;
                for field in &mut fields {
                    field.offset = 0;
                    size = size.max(self.size(field.ty));
                    align = align.max(self.align_of(field.ty));
                }
                (size.next_multiple_of(align), align)
            }
        };

        let ty = &mut self.types[id.index()];
        ty.size = size;
        if let TypeKind::Structural(s) = &mut ty.kind {
            s.fields = fields;
            s.variants = variants;
            s.align = align;
            s.complete = true;
        }
        trace!(name = %ty.name, size, "completed layout");
        Ok(())
    }

    /// Record which template and arguments a structural type came from.
    pub(crate) fn set_template_origin(
        &mut self,
        id: TypeId,
        origin: crate::template::TemplateId,
        args: &[TemplateArg],
    ) {
        if let TypeKind::Structural(s) = &mut self.types[id.index()].kind {
            s.template = Some((origin, args.iter().copied().collect()));
        }
    }

    pub fn align_of(&self, id: TypeId) -> usize {
        let ty = self.get(id);
        match &ty.kind {
            TypeKind::Core(k) => k.size().clamp(1, 8),
            TypeKind::Callable(_) => 8,
            TypeKind::Template { .. } => match ty.array() {
                Some((elem, _)) => self.align_of(elem),
                None => POINTER_SIZE,
            },
            TypeKind::Structural(s) => s.align,
        }
    }

    /// Render a built-in template instantiation: `Ref<Int32>`,
    /// `Array<Int32, 4>`.
    pub fn render(&self, kind: TemplateKind, args: &[TemplateArg]) -> String {
        format!("{}<{}>", kind.name(), self.render_args(args))
    }

    pub fn render_args(&self, args: &[TemplateArg]) -> String {
        let mut out = String::new();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match *arg {
                TemplateArg::Type(t) => out.push_str(self.name(t)),
                TemplateArg::Int(n) => out.push_str(&n.to_string()),
            }
        }
        out
    }

    /// Canonical instantiation of a built-in template.
    ///
    /// The caller runs post-initialization lazily; this only registers the
    /// type and its member scope.
    pub fn find_or_create(
        &mut self,
        scopes: &mut ScopeTree,
        kind: TemplateKind,
        args: &[TemplateArg],
    ) -> EvalResult<Interned> {
        let name = self.render(kind, args);
        if let Some(id) = self.find_by_name(&name) {
            return Ok(Interned { id, created: false });
        }

        let (size, aggregate) = match (kind, args) {
            (TemplateKind::Ref, [TemplateArg::Type(t)]) if *t != TypeId::VOID => {
                (POINTER_SIZE, false)
            }
            (TemplateKind::Address, [TemplateArg::Type(_)]) => (POINTER_SIZE, false),
            (TemplateKind::Array, [TemplateArg::Type(elem), TemplateArg::Int(n)]) => {
                let elem_ty = self.get(*elem);
                let len = usize::try_from(*n).ok();
                let size = len.and_then(|n| elem_ty.size.checked_mul(n));
                match size {
                    Some(size) if elem_ty.is_complete() && *elem != TypeId::VOID => {
                        (size, elem_ty.aggregate)
                    }
                    _ => {
                        return Err(unknown_type(name)
                            .with_hint("array element must be sized and length non-negative"))
                    }
                }
            }
            _ => return Err(unknown_type(name)),
        };

        let members = scopes.create(ScopeKind::Members, None);
        let args: TemplateArgs = args.iter().copied().collect();
        let id = self.push(
            name,
            TypeKind::Template { kind, args },
            size,
            members,
            aggregate,
        );
        trace!(name = self.name(id), "instantiated built-in template");
        Ok(Interned { id, created: true })
    }

    /// `Ref<ty>`, creating it if needed.
    pub fn reference_to(&mut self, scopes: &mut ScopeTree, ty: TypeId) -> EvalResult<TypeId> {
        Ok(self
            .find_or_create(scopes, TemplateKind::Ref, &[TemplateArg::Type(ty)])?
            .id)
    }

    /// `Address<ty>`, creating it if needed.
    pub fn address_of(&mut self, scopes: &mut ScopeTree, ty: TypeId) -> EvalResult<TypeId> {
        Ok(self
            .find_or_create(scopes, TemplateKind::Address, &[TemplateArg::Type(ty)])?
            .id)
    }

    /// Strip one level of `Ref`.
    pub fn decay(&self, ty: TypeId) -> TypeId {
        self.get(ty).reference_target().unwrap_or(ty)
    }

    /// Flag the type as initialized. Returns `false` if it already was, so
    /// synthesis runs exactly once.
    pub(crate) fn mark_initialized(&mut self, id: TypeId) -> bool {
        let ty = &mut self.types[id.index()];
        !std::mem::replace(&mut ty.initialized, true)
    }
}
