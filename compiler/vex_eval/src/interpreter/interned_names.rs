//! Names the engine compares against on hot paths, interned once at
//! construction so dispatch compares `u32`s instead of strings.

use vex_ir::{Name, StringInterner};

#[derive(Clone, Copy)]
pub(crate) struct WellKnownNames {
    pub(crate) self_: Name,
    pub(crate) construct: Name,
    pub(crate) destruct: Name,
    pub(crate) get: Name,
    pub(crate) size: Name,
    pub(crate) data: Name,
    pub(crate) print: Name,
    pub(crate) println: Name,
    pub(crate) ellipsis: Name,
}

impl WellKnownNames {
    pub(crate) fn new(interner: &StringInterner) -> Self {
        Self {
            self_: interner.intern("self"),
            construct: interner.intern("construct"),
            destruct: interner.intern("destruct"),
            get: interner.intern("get"),
            size: interner.intern("size"),
            data: interner.intern("data"),
            print: interner.intern("print"),
            println: interner.intern("println"),
            ellipsis: interner.intern("..."),
        }
    }
}

/// Pre-interned operator symbols.
#[derive(Clone, Copy)]
pub(crate) struct OpNames {
    pub(crate) assign: Name,
    pub(crate) index: Name,
    pub(crate) call: Name,
    pub(crate) and: Name,
    pub(crate) amp: Name,
    pub(crate) star: Name,
}

impl OpNames {
    pub(crate) fn new(interner: &StringInterner) -> Self {
        Self {
            assign: interner.intern("="),
            index: interner.intern("[]"),
            call: interner.intern("()"),
            and: interner.intern("&&"),
            amp: interner.intern("&"),
            star: interner.intern("*"),
        }
    }
}
