//! Source positions.

use std::fmt;

/// Line/column of a node in its source file (both 1-based, 0 when unknown).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    /// Position for synthesized nodes.
    pub const DUMMY: SourcePos = SourcePos { line: 0, column: 0 };

    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        SourcePos { line, column }
    }

    #[inline]
    pub const fn is_dummy(self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
