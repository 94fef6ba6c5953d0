use crate::types::TypeId;

/// A typed view of arena bytes at an absolute address.
///
/// Values are views, not owners: copying a `Value` aliases the same bytes.
/// Their lifetime is the lifetime of the frame that allocated them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value {
    pub ty: TypeId,
    pub addr: usize,
}

impl Value {
    #[inline]
    pub const fn new(ty: TypeId, addr: usize) -> Self {
        Value { ty, addr }
    }

    /// Same bytes viewed as another type.
    #[inline]
    #[must_use]
    pub const fn retyped(self, ty: TypeId) -> Self {
        Value { ty, addr: self.addr }
    }

    /// View `offset` bytes further into the arena.
    #[inline]
    #[must_use]
    pub const fn at_offset(self, ty: TypeId, offset: usize) -> Self {
        Value {
            ty,
            addr: self.addr + offset,
        }
    }
}

/// A variable slot relative to its frame's base.
///
/// Binding variables by offset keeps them valid across activations: the
/// same definition in a recursive call resolves against that call's frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameBasedValue {
    pub ty: TypeId,
    pub offset: usize,
}
