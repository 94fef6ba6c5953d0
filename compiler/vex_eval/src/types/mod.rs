//! The closed type model.
//!
//! Every type is one of four shapes: a core scalar, a user-declared
//! structural type, an instantiation of a built-in template (`Array`, `Ref`,
//! `Address`) or a callable handle. Types are referenced by [`TypeId`], an
//! index into the [`TypeRegistry`]; equality of ids is type identity.

mod registry;

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use vex_ir::{Name, NodeId, SyntaxTree};

use crate::scope::ScopeId;
use crate::template::TemplateId;

pub use registry::{Interned, TypeRegistry};

/// Index of a type in the [`TypeRegistry`].
///
/// Core and callable types sit at fixed indices, registered before anything
/// else, so they can be named without a lookup.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: Self = Self(0);
    pub const BOOL: Self = Self(1);
    pub const INT8: Self = Self(2);
    pub const INT16: Self = Self(3);
    pub const INT32: Self = Self(4);
    pub const INT64: Self = Self(5);
    pub const UINT8: Self = Self(6);
    pub const UINT16: Self = Self(7);
    pub const UINT32: Self = Self(8);
    pub const UINT64: Self = Self(9);
    pub const FLOAT32: Self = Self(10);
    pub const FLOAT64: Self = Self(11);
    pub const STR: Self = Self(12);
    pub const FUNCTION: Self = Self(13);
    pub const METHOD: Self = Self(14);

    /// First index handed out to registered types.
    pub const FIRST_DYNAMIC: u32 = 15;

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Built-in scalar types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoreKind {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Index into the interpreter's string pool.
    Str,
}

impl CoreKind {
    /// All core kinds in [`TypeId`] order.
    pub const ALL: [CoreKind; 13] = [
        CoreKind::Void,
        CoreKind::Bool,
        CoreKind::Int8,
        CoreKind::Int16,
        CoreKind::Int32,
        CoreKind::Int64,
        CoreKind::UInt8,
        CoreKind::UInt16,
        CoreKind::UInt32,
        CoreKind::UInt64,
        CoreKind::Float32,
        CoreKind::Float64,
        CoreKind::Str,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CoreKind::Void => "Void",
            CoreKind::Bool => "Bool",
            CoreKind::Int8 => "Int8",
            CoreKind::Int16 => "Int16",
            CoreKind::Int32 => "Int32",
            CoreKind::Int64 => "Int64",
            CoreKind::UInt8 => "UInt8",
            CoreKind::UInt16 => "UInt16",
            CoreKind::UInt32 => "UInt32",
            CoreKind::UInt64 => "UInt64",
            CoreKind::Float32 => "Float32",
            CoreKind::Float64 => "Float64",
            CoreKind::Str => "Str",
        }
    }

    /// Size in bytes.
    pub fn size(self) -> usize {
        match self {
            CoreKind::Void => 0,
            CoreKind::Bool | CoreKind::Int8 | CoreKind::UInt8 => 1,
            CoreKind::Int16 | CoreKind::UInt16 => 2,
            CoreKind::Int32 | CoreKind::UInt32 | CoreKind::Float32 => 4,
            CoreKind::Int64 | CoreKind::UInt64 | CoreKind::Float64 | CoreKind::Str => 8,
        }
    }

    pub fn type_id(self) -> TypeId {
        match self {
            CoreKind::Void => TypeId::VOID,
            CoreKind::Bool => TypeId::BOOL,
            CoreKind::Int8 => TypeId::INT8,
            CoreKind::Int16 => TypeId::INT16,
            CoreKind::Int32 => TypeId::INT32,
            CoreKind::Int64 => TypeId::INT64,
            CoreKind::UInt8 => TypeId::UINT8,
            CoreKind::UInt16 => TypeId::UINT16,
            CoreKind::UInt32 => TypeId::UINT32,
            CoreKind::UInt64 => TypeId::UINT64,
            CoreKind::Float32 => TypeId::FLOAT32,
            CoreKind::Float64 => TypeId::FLOAT64,
            CoreKind::Str => TypeId::STR,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            CoreKind::Int8 | CoreKind::Int16 | CoreKind::Int32 | CoreKind::Int64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            CoreKind::UInt8 | CoreKind::UInt16 | CoreKind::UInt32 | CoreKind::UInt64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, CoreKind::Float32 | CoreKind::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// Callable handle types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallableKind {
    /// A function id (8 bytes).
    Function,
    /// A receiver address plus a function id (16 bytes).
    Method,
}

impl CallableKind {
    pub fn name(self) -> &'static str {
        match self {
            CallableKind::Function => "Function",
            CallableKind::Method => "Method",
        }
    }

    pub fn size(self) -> usize {
        match self {
            CallableKind::Function => 8,
            CallableKind::Method => 16,
        }
    }
}

/// Built-in templates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// `Array<T, N>`: N contiguous elements.
    Array,
    /// `Ref<T>`: an address that reads and writes through to its target.
    Ref,
    /// `Address<T>`: an address with pointer arithmetic and explicit `get`.
    Address,
}

impl TemplateKind {
    pub fn name(self) -> &'static str {
        match self {
            TemplateKind::Array => "Array",
            TemplateKind::Ref => "Ref",
            TemplateKind::Address => "Address",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Array" => Some(TemplateKind::Array),
            "Ref" => Some(TemplateKind::Ref),
            "Address" => Some(TemplateKind::Address),
            _ => None,
        }
    }
}

/// One template argument: a type or an integer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateArg {
    Type(TypeId),
    Int(i64),
}

pub type TemplateArgs = SmallVec<[TemplateArg; 2]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StructKind {
    Class,
    Enum,
    Union,
}

/// Default initializer of a field: an expression in the declaring tree.
#[derive(Clone, Debug)]
pub struct FieldInit {
    pub tree: Rc<SyntaxTree>,
    pub node: NodeId,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: Name,
    pub ty: TypeId,
    pub offset: usize,
    pub init: Option<FieldInit>,
}

/// A user-declared class, union or enum.
#[derive(Clone, Debug)]
pub struct StructuralType {
    pub kind: StructKind,
    pub fields: Vec<Field>,
    /// Enum constants in declaration order.
    pub variants: Vec<(Name, i64)>,
    /// Set when the type is an instantiation of a user template class.
    pub template: Option<(TemplateId, TemplateArgs)>,
    pub align: usize,
    /// Fields and layout are final.
    pub complete: bool,
}

impl StructuralType {
    /// A shell registered before its members are known, so members may
    /// refer back to it.
    pub fn shell(kind: StructKind) -> Self {
        StructuralType {
            kind,
            fields: Vec::new(),
            variants: Vec::new(),
            template: None,
            align: 1,
            complete: false,
        }
    }

    pub fn field(&self, name: Name) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn variant(&self, name: Name) -> Option<i64> {
        self.variants
            .iter()
            .find_map(|&(n, v)| (n == name).then_some(v))
    }

    pub fn variant_name(&self, value: i64) -> Option<Name> {
        self.variants
            .iter()
            .find_map(|&(n, v)| (v == value).then_some(n))
    }
}

#[derive(Clone, Debug)]
pub enum TypeKind {
    Core(CoreKind),
    Structural(StructuralType),
    Template {
        kind: TemplateKind,
        args: TemplateArgs,
    },
    Callable(CallableKind),
}

/// A registered type.
#[derive(Clone, Debug)]
pub struct Type {
    pub(crate) name: Box<str>,
    pub(crate) hash: u64,
    pub(crate) kind: TypeKind,
    pub(crate) size: usize,
    /// Scope holding this type's member functions and operators.
    pub(crate) members: ScopeId,
    /// Values of this type own resources that need destruction.
    pub(crate) aggregate: bool,
    /// Synthesized members have been added.
    pub(crate) initialized: bool,
}

impl Type {
    /// Canonical rendered name (`Int32`, `Ref<Int32>`, `Array<Int32, 4>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn members(&self) -> ScopeId {
        self.members
    }

    /// Classes, unions and arrays of them.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn core(&self) -> Option<CoreKind> {
        match self.kind {
            TypeKind::Core(k) => Some(k),
            _ => None,
        }
    }

    pub fn structural(&self) -> Option<&StructuralType> {
        match &self.kind {
            TypeKind::Structural(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(&self.kind, TypeKind::Structural(s) if s.kind == StructKind::Enum)
    }

    /// Built-in template kind and its first type argument.
    pub fn template(&self) -> Option<(TemplateKind, TypeId)> {
        match &self.kind {
            TypeKind::Template { kind, args } => match args.first() {
                Some(&TemplateArg::Type(t)) => Some((*kind, t)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Element type and length for `Array<T, N>`.
    pub fn array(&self) -> Option<(TypeId, usize)> {
        match &self.kind {
            TypeKind::Template {
                kind: TemplateKind::Array,
                args,
            } => match args.as_slice() {
                [TemplateArg::Type(t), TemplateArg::Int(n)] => {
                    Some((*t, usize::try_from(*n).unwrap_or(0)))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Target of a `Ref<T>`.
    pub fn reference_target(&self) -> Option<TypeId> {
        match self.template() {
            Some((TemplateKind::Ref, t)) => Some(t),
            _ => None,
        }
    }

    /// Target of an `Address<T>`.
    pub fn address_target(&self) -> Option<TypeId> {
        match self.template() {
            Some((TemplateKind::Address, t)) => Some(t),
            _ => None,
        }
    }

    /// Whether the type is complete (core types always are).
    pub fn is_complete(&self) -> bool {
        match &self.kind {
            TypeKind::Structural(s) => s.complete,
            _ => true,
        }
    }
}
