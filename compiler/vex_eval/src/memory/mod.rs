//! Value storage.
//!
//! All program data lives in one fixed-capacity byte arena managed as a
//! stack. Frames partition it; a frame's bytes are released wholesale when
//! it pops. Values are `(type, absolute address)` handles into the arena,
//! never owning Rust objects.

mod scalar;
mod stack;
mod strings;
mod value;

pub use scalar::Scalar;
pub use stack::{CallInfo, FrameKind, Stack, StackFrame};
pub use strings::StringPool;
pub use value::{FrameBasedValue, Value};
