//! Recursion guards.
//!
//! Two limits protect the host: the native stack, which the evaluator grows
//! on demand while it recurses through nested expressions and calls, and
//! the interpreted call depth, which turns runaway recursion in a program
//! into a [`CallDepthExceeded`](crate::EvalErrorKind::CallDepthExceeded)
//! error instead of exhausting memory.

use crate::errors::{call_depth_exceeded, EvalResult};

/// Keep at least this much native stack free (100KB).
const RED_ZONE: usize = 100 * 1024;

/// Grow the native stack by this much at a time (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the native stack first if the red zone is reached.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Fail once `depth` interpreted calls are already active.
#[inline]
pub(crate) fn check_call_depth(depth: usize, limit: usize) -> EvalResult<()> {
    if depth >= limit {
        return Err(call_depth_exceeded(limit));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nest(depth: u32) -> u32 {
        if depth == 0 {
            0
        } else {
            ensure_sufficient_stack(|| 1 + nest(depth - 1))
        }
    }

    #[test]
    fn deep_native_recursion_survives() {
        assert_eq!(nest(100_000), 100_000);
    }

    #[test]
    fn call_depth_limit_is_exclusive() {
        assert!(check_call_depth(3, 4).is_ok());
        assert!(check_call_depth(4, 4).is_err());
    }
}
