//! Vex IR - the syntax tree the evaluator consumes.
//!
//! The parser is an external collaborator. Everything it hands the engine is
//! described here: a tree of tagged nodes, each with raw source text, ordered
//! children and a source position.
//!
//! # Design
//!
//! - `Name`: interned identifier, O(1) equality
//! - `SyntaxTree`: flat node arena addressed by `NodeId`
//! - `NodeKey`: tree + node identity, stable for the whole run
//! - `TreeBuilder`: how a parser (or a test) produces a `SyntaxTree`

mod interner;
mod name;
mod node;
mod span;
mod tree;

pub use interner::{SharedInterner, StringInterner};
pub use name::Name;
pub use node::{NodeId, NodeKey, NodeKind, TreeId};
pub use span::SourcePos;
pub use tree::{NodeRef, SyntaxTree, TreeBuilder};
