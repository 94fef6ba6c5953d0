use rustc_hash::FxHashMap;
use tracing::trace;
use vex_ir::Name;

use super::{FrameBasedValue, Scalar, Value};
use crate::errors::{invalid_memory_access, stack_overflow, EvalResult};
use crate::function::FunctionId;
use crate::scope::ScopeId;
use crate::types::{CoreKind, TypeId, TypeRegistry};

/// Bytes reserved at address 0 so a zeroed reference never points at data.
pub const NULL_GUARD: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Universe,
    Module,
    Function,
    Block,
}

impl FrameKind {
    /// Frames whose variables stay visible from any function.
    pub fn is_root(self) -> bool {
        matches!(self, FrameKind::Universe | FrameKind::Module)
    }
}

/// What a function frame is executing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallInfo {
    pub function: FunctionId,
    /// Class of a method, for implicit field access through `self`.
    pub class: Option<TypeId>,
    /// Slot in the caller's frame that receives the return value.
    pub return_slot: Option<Value>,
}

#[derive(Debug)]
pub struct StackFrame {
    /// Arena mark when the frame was pushed.
    pub base: usize,
    pub scope: ScopeId,
    pub kind: FrameKind,
    pub call: Option<CallInfo>,
    locals: FxHashMap<Name, FrameBasedValue>,
    /// Aggregates allocated in this frame, in allocation order.
    destructibles: Vec<Value>,
}

impl StackFrame {
    /// Bind a variable; a later definition with the same name shadows.
    pub fn bind(&mut self, name: Name, slot: FrameBasedValue) {
        self.locals.insert(name, slot);
    }

    pub fn local(&self, name: Name) -> Option<FrameBasedValue> {
        self.locals.get(&name).copied()
    }

    pub fn destructibles(&self) -> &[Value] {
        &self.destructibles
    }

    pub(crate) fn take_destructibles(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.destructibles)
    }
}

/// Fixed-capacity arena with a frame stack on top.
///
/// Allocation bumps a mark; popping a frame rewinds it to the frame's base.
/// Every access is bounds-checked against the mark, so reading through a
/// reference into a popped frame is an error rather than stale data.
#[derive(Debug)]
pub struct Stack {
    bytes: Vec<u8>,
    mark: usize,
    frames: Vec<StackFrame>,
}

impl Stack {
    pub fn new(capacity: usize) -> Self {
        Stack {
            bytes: vec![0; capacity.max(NULL_GUARD)],
            mark: NULL_GUARD,
            frames: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// First free byte.
    #[inline]
    pub fn mark(&self) -> usize {
        self.mark
    }

    /// Number of live frames.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> &StackFrame {
        &self.frames[index]
    }

    pub fn frame_mut(&mut self, index: usize) -> &mut StackFrame {
        &mut self.frames[index]
    }

    pub fn top(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Push a frame starting at the current mark and return its index.
    pub fn push_frame(&mut self, scope: ScopeId, kind: FrameKind, call: Option<CallInfo>) -> usize {
        self.frames.push(StackFrame {
            base: self.mark,
            scope,
            kind,
            call,
            locals: FxHashMap::default(),
            destructibles: Vec::new(),
        });
        trace!(depth = self.frames.len(), base = self.mark, ?kind, "push frame");
        self.frames.len() - 1
    }

    /// Pop the top frame and release its bytes.
    ///
    /// Destructors are the caller's business; by the time this runs they
    /// have been taken with [`StackFrame::take_destructibles`].
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        let frame = self.frames.pop()?;
        self.mark = frame.base;
        trace!(depth = self.frames.len(), mark = self.mark, "pop frame");
        Some(frame)
    }

    /// Allocate a value of `ty` in the top frame, zero-filled or copied
    /// bytewise from `source`.
    pub fn allocate(
        &mut self,
        types: &TypeRegistry,
        ty: TypeId,
        source: Option<usize>,
    ) -> EvalResult<Value> {
        let size = types.size(ty);
        let addr = self.mark;
        let end = addr
            .checked_add(size)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| stack_overflow(size, self.bytes.len() - self.mark))?;
        if let Some(src) = source {
            self.check(src, size)?;
            self.bytes.copy_within(src..src + size, addr);
        } else {
            self.bytes[addr..end].fill(0);
        }
        self.mark = end;

        let value = Value::new(ty, addr);
        if types.get(ty).is_aggregate() {
            if let Some(top) = self.frames.last_mut() {
                top.destructibles.push(value);
            }
        }
        Ok(value)
    }

    /// Claim a slot in the top frame for a variable.
    ///
    /// With `look_back` the slot is the `size_of(ty)` bytes just below the
    /// mark, adopting a temporary that was allocated there; otherwise fresh
    /// bytes are allocated.
    pub fn reserve(
        &mut self,
        types: &TypeRegistry,
        ty: TypeId,
        look_back: bool,
    ) -> EvalResult<FrameBasedValue> {
        let base = self.frames.last().map_or(NULL_GUARD, |f| f.base);
        let addr = if look_back {
            let size = types.size(ty);
            self.mark
                .checked_sub(size)
                .filter(|&addr| addr >= base)
                .ok_or_else(|| invalid_memory_access(self.mark, size))?
        } else {
            self.allocate(types, ty, None)?.addr
        };
        Ok(FrameBasedValue {
            ty,
            offset: addr - base,
        })
    }

    /// Absolute value of a frame-relative slot in frame `frame`.
    #[inline]
    pub fn resolve(&self, slot: FrameBasedValue, frame: usize) -> Value {
        Value::new(slot.ty, self.frames[frame].base + slot.offset)
    }

    fn check(&self, addr: usize, len: usize) -> EvalResult<()> {
        let in_bounds = addr
            .checked_add(len)
            .is_some_and(|end| end <= self.mark && (len == 0 || addr >= NULL_GUARD));
        if in_bounds {
            Ok(())
        } else {
            Err(invalid_memory_access(addr, len))
        }
    }

    pub fn read(&self, addr: usize, len: usize) -> EvalResult<&[u8]> {
        self.check(addr, len)?;
        Ok(&self.bytes[addr..addr + len])
    }

    pub fn write(&mut self, addr: usize, bytes: &[u8]) -> EvalResult<()> {
        self.check(addr, bytes.len())?;
        self.bytes[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Bytewise copy; the ranges may overlap.
    pub fn copy(&mut self, src: usize, dst: usize, len: usize) -> EvalResult<()> {
        self.check(src, len)?;
        self.check(dst, len)?;
        self.bytes.copy_within(src..src + len, dst);
        Ok(())
    }

    pub fn read_u64(&self, addr: usize) -> EvalResult<u64> {
        let bytes = self.read(addr, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_u64(&mut self, addr: usize, v: u64) -> EvalResult<()> {
        self.write(addr, &v.to_le_bytes())
    }

    /// Read an address stored at `addr`.
    pub fn read_addr(&self, addr: usize) -> EvalResult<usize> {
        let raw = self.read_u64(addr)?;
        usize::try_from(raw).map_err(|_| invalid_memory_access(addr, 8))
    }

    pub fn read_scalar(&self, addr: usize, kind: CoreKind) -> EvalResult<Scalar> {
        Ok(Scalar::decode(kind, self.read(addr, kind.size())?))
    }

    pub fn write_scalar(&mut self, addr: usize, kind: CoreKind, value: Scalar) -> EvalResult<()> {
        let (bytes, size) = value.encode(kind);
        self.write(addr, &bytes[..size])
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::errors::EvalErrorKind;
    use crate::scope::ScopeTree;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn setup(capacity: usize) -> (Stack, TypeRegistry) {
        let mut scopes = ScopeTree::new();
        let types = TypeRegistry::new(&mut scopes);
        let mut stack = Stack::new(capacity);
        stack.push_frame(ScopeId::UNIVERSE, FrameKind::Universe, None);
        (stack, types)
    }

    #[test]
    fn allocation_starts_after_null_guard() {
        let (mut stack, types) = setup(64);
        let v = stack.allocate(&types, TypeId::INT32, None).unwrap();
        assert_eq!(v.addr, NULL_GUARD);
        assert_eq!(stack.mark(), NULL_GUARD + 4);
        assert!(stack.read(0, 4).is_err());
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        let (mut stack, types) = setup(16);
        stack.allocate(&types, TypeId::INT64, None).unwrap();
        let err = stack.allocate(&types, TypeId::INT64, None).unwrap_err();
        assert!(matches!(err.kind, EvalErrorKind::StackOverflow { .. }));
    }

    #[test]
    fn popping_rewinds_mark_and_invalidates_bytes() {
        let (mut stack, types) = setup(64);
        let before = stack.mark();
        stack.push_frame(ScopeId::UNIVERSE, FrameKind::Block, None);
        let v = stack.allocate(&types, TypeId::INT64, None).unwrap();
        stack.write_scalar(v.addr, CoreKind::Int64, Scalar::Int(7)).unwrap();
        stack.pop_frame();
        assert_eq!(stack.mark(), before);
        assert!(stack.read_scalar(v.addr, CoreKind::Int64).is_err());
    }

    #[test]
    fn reallocation_is_zeroed() {
        let (mut stack, types) = setup(64);
        stack.push_frame(ScopeId::UNIVERSE, FrameKind::Block, None);
        let v = stack.allocate(&types, TypeId::INT32, None).unwrap();
        stack.write_scalar(v.addr, CoreKind::Int32, Scalar::Int(-1)).unwrap();
        stack.pop_frame();
        let w = stack.allocate(&types, TypeId::INT32, None).unwrap();
        assert_eq!(w.addr, v.addr);
        assert_eq!(
            stack.read_scalar(w.addr, CoreKind::Int32).unwrap(),
            Scalar::Int(0)
        );
    }

    #[test]
    fn look_back_adopts_the_last_temporary() {
        let (mut stack, types) = setup(64);
        let temp = stack.allocate(&types, TypeId::INT32, None).unwrap();
        let mark = stack.mark();
        let slot = stack.reserve(&types, TypeId::INT32, true).unwrap();
        assert_eq!(stack.mark(), mark);
        assert_eq!(stack.resolve(slot, 0), temp);
    }

    #[test]
    fn look_back_cannot_cross_frame_base() {
        let (mut stack, types) = setup(64);
        stack.allocate(&types, TypeId::INT32, None).unwrap();
        stack.push_frame(ScopeId::UNIVERSE, FrameKind::Block, None);
        assert!(stack.reserve(&types, TypeId::INT32, true).is_err());
    }

    #[test]
    fn frame_relative_slots_follow_the_frame() {
        let (mut stack, types) = setup(128);
        let outer = stack.push_frame(ScopeId::UNIVERSE, FrameKind::Function, None);
        let slot = stack.reserve(&types, TypeId::INT32, false).unwrap();
        let inner = stack.push_frame(ScopeId::UNIVERSE, FrameKind::Function, None);
        stack.reserve(&types, TypeId::INT64, false).unwrap();
        let _ = stack.reserve(&types, TypeId::INT32, false).unwrap();
        assert_eq!(slot.offset, 0);
        assert_ne!(stack.resolve(slot, outer), stack.resolve(slot, inner));
    }

    #[test]
    fn copy_allocation_duplicates_bytes() {
        let (mut stack, types) = setup(64);
        let a = stack.allocate(&types, TypeId::INT16, None).unwrap();
        stack.write_scalar(a.addr, CoreKind::Int16, Scalar::Int(513)).unwrap();
        let b = stack.allocate(&types, TypeId::INT16, Some(a.addr)).unwrap();
        assert_eq!(
            stack.read_scalar(b.addr, CoreKind::Int16).unwrap(),
            Scalar::Int(513)
        );
    }

    proptest! {
        #[test]
        fn nested_frames_restore_marks(kinds in proptest::collection::vec(0usize..13, 1..24)) {
            let (mut stack, types) = setup(4096);
            let mut marks = Vec::new();
            for k in &kinds {
                marks.push(stack.mark());
                stack.push_frame(ScopeId::UNIVERSE, FrameKind::Block, None);
                stack.allocate(&types, CoreKind::ALL[*k].type_id(), None).unwrap();
            }
            while let Some(mark) = marks.pop() {
                stack.pop_frame();
                prop_assert_eq!(stack.mark(), mark);
            }
        }
    }
}
