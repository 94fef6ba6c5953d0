//! Evaluation errors.
//!
//! Every runtime failure is an [`EvalError`]: a structured
//! [`EvalErrorKind`] plus the source position it was raised at and an
//! optional hint for the host's report. Factory functions below are the
//! public way to build one.
//!
//! Control flow (`return`, `break`, `continue`) is never an error; see
//! [`Flow`](crate::Flow).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use vex_ir::SourcePos;

/// Result of evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalErrorKind {
    #[error("unresolved identifier `{name}`")]
    UnresolvedIdentifier { name: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("no matching overload for `{name}({args})`")]
    NoMatchingOverload { name: String, args: String },

    #[error("operator `{op}` is missing an operand")]
    InvalidOperatorPosition { op: String },

    #[error("cannot convert `{from}` to `{to}`")]
    TypeConversionFailure { from: String, to: String },

    #[error("stack overflow: {requested} bytes requested, {available} available")]
    StackOverflow { requested: usize, available: usize },

    #[error("stack overflow: call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("module `{path}` not found")]
    ModuleNotFound { path: String },

    #[error("module `{path}` must be imported at the top level of a module")]
    NestedImport { path: String },

    #[error("failed to parse `{path}`: {message}")]
    ParseFailure { path: String, message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid memory access of {len} bytes at {address:#x}")]
    InvalidMemoryAccess { address: usize, len: usize },

    #[error("`{name}` is already defined")]
    Redefinition { name: String },

    #[error("unexpected `{kind}` node")]
    UnexpectedNode { kind: String },
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Position of the statement that was executing when the error was raised.
    pub pos: Option<SourcePos>,
    /// Module file `pos` refers to.
    pub file: Option<PathBuf>,
    /// Extra advice for the report.
    pub hint: Option<String>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        EvalError {
            kind,
            pos: None,
            file: None,
            hint: None,
        }
    }

    /// Attach a position unless one is already set.
    ///
    /// Errors bubble outwards through nested statements; the innermost
    /// statement's position is the one that sticks.
    #[must_use]
    pub fn with_pos(mut self, pos: SourcePos) -> Self {
        if self.pos.is_none() && !pos.is_dummy() {
            self.pos = Some(pos);
        }
        self
    }

    /// Like [`with_pos`](Self::with_pos), also recording the module file
    /// the position is in.
    #[must_use]
    pub fn with_location(mut self, pos: SourcePos, file: Option<PathBuf>) -> Self {
        if self.pos.is_none() && !pos.is_dummy() {
            self.pos = Some(pos);
            self.file = file;
        }
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(pos) = self.pos {
            write!(f, " (at {pos})")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        EvalError::new(kind)
    }
}

// Lookup errors

#[cold]
pub fn unresolved_identifier(name: impl Into<String>) -> EvalError {
    EvalErrorKind::UnresolvedIdentifier { name: name.into() }.into()
}

#[cold]
pub fn unknown_type(name: impl Into<String>) -> EvalError {
    EvalErrorKind::UnknownType { name: name.into() }.into()
}

#[cold]
pub fn no_matching_overload(name: impl Into<String>, args: &[&str]) -> EvalError {
    EvalErrorKind::NoMatchingOverload {
        name: name.into(),
        args: args.join(", "),
    }
    .into()
}

#[cold]
pub fn redefinition(name: impl Into<String>) -> EvalError {
    EvalErrorKind::Redefinition { name: name.into() }.into()
}

// Expression errors

#[cold]
pub fn invalid_operator_position(op: impl Into<String>) -> EvalError {
    EvalErrorKind::InvalidOperatorPosition { op: op.into() }.into()
}

#[cold]
pub fn type_conversion_failure(from: impl Into<String>, to: impl Into<String>) -> EvalError {
    EvalErrorKind::TypeConversionFailure {
        from: from.into(),
        to: to.into(),
    }
    .into()
}

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalErrorKind::DivisionByZero.into()
}

#[cold]
pub fn unexpected_node(kind: vex_ir::NodeKind) -> EvalError {
    EvalErrorKind::UnexpectedNode {
        kind: format!("{kind:?}"),
    }
    .into()
}

// Memory errors

#[cold]
pub fn stack_overflow(requested: usize, available: usize) -> EvalError {
    EvalErrorKind::StackOverflow {
        requested,
        available,
    }
    .into()
}

#[cold]
pub fn call_depth_exceeded(limit: usize) -> EvalError {
    EvalError::new(EvalErrorKind::CallDepthExceeded { limit })
        .with_hint("check for unbounded recursion")
}

#[cold]
pub fn invalid_memory_access(address: usize, len: usize) -> EvalError {
    EvalErrorKind::InvalidMemoryAccess { address, len }.into()
}

// Module errors

#[cold]
pub fn module_not_found(path: impl Into<String>) -> EvalError {
    EvalErrorKind::ModuleNotFound { path: path.into() }.into()
}

#[cold]
pub fn nested_import(path: impl Into<String>) -> EvalError {
    EvalError::new(EvalErrorKind::NestedImport { path: path.into() })
        .with_hint("modules imported inside functions are loaded with their module")
}

#[cold]
pub fn parse_failure(path: impl Into<String>, message: impl Into<String>) -> EvalError {
    EvalErrorKind::ParseFailure {
        path: path.into(),
        message: message.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_render_from_kind() {
        assert_eq!(
            unresolved_identifier("foo").to_string(),
            "unresolved identifier `foo`"
        );
        assert_eq!(
            no_matching_overload("+", &["Int32", "Bool"]).to_string(),
            "no matching overload for `+(Int32, Bool)`"
        );
    }

    #[test]
    fn first_position_wins() {
        let err = division_by_zero()
            .with_pos(SourcePos::new(3, 4))
            .with_pos(SourcePos::new(1, 1));
        assert_eq!(err.pos, Some(SourcePos::new(3, 4)));
        assert_eq!(err.to_string(), "division by zero (at 3:4)");
    }

    #[test]
    fn file_follows_the_first_position() {
        let err = division_by_zero()
            .with_location(SourcePos::new(2, 1), Some(PathBuf::from("/lib.vx")))
            .with_location(SourcePos::new(9, 1), Some(PathBuf::from("/main.vx")));
        assert_eq!(err.pos, Some(SourcePos::new(2, 1)));
        assert_eq!(err.file, Some(PathBuf::from("/lib.vx")));
    }

    #[test]
    fn dummy_position_is_ignored() {
        let err = division_by_zero().with_pos(SourcePos::DUMMY);
        assert_eq!(err.pos, None);
    }

    #[test]
    fn call_depth_carries_hint() {
        let err = call_depth_exceeded(16);
        assert!(err.hint.is_some());
        assert!(matches!(err.kind, EvalErrorKind::CallDepthExceeded { limit: 16 }));
    }
}
