//! Node tags and identities.

use std::fmt;

/// The closed set of node tags produced by the parser.
///
/// The evaluator dispatches on this tag; the meaning of each node's text and
/// children is documented per variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Top-level statements and declarations.
    Module,
    /// `import "path";` - text is the module path.
    Import,
    /// text: name. children: `[TemplateParameters] Parameters [TypeName] Block`.
    Function,
    TemplateParameters,
    /// text: name. An optional `TypeName` child makes it a value parameter.
    TemplateParameter,
    Parameters,
    /// text: name (`...` for a variadic tail). children: `TypeName`.
    Parameter,
    /// text: name. children: `[TemplateParameters] (VariableDefinition | Function)*`.
    Class,
    /// Same shape as `Class`; every field sits at offset 0.
    Union,
    /// text: name. children: `EnumValue*`.
    Enum,
    /// text: name. children: `[Expression]`.
    EnumValue,
    /// text: name. children: `[TypeName] [Expression]`.
    VariableDefinition,
    Block,
    /// children: `Expression Block [Block | If]`.
    If,
    /// children: `Expression Block`.
    While,
    /// children: `init Expression Expression Block`.
    For,
    /// children: `[Expression]`.
    Return,
    /// text: optional unwind level.
    Break,
    Continue,
    /// children: `Expression`.
    ExpressionStatement,
    /// A flat list alternating operands and operators.
    Expression,
    /// text: operator symbol.
    Operator,
    /// Postfix `()`; children are the argument expressions.
    Call,
    /// Postfix `[]`; one child expression.
    Index,
    Identifier,
    /// text: name. children: template arguments.
    TypeName,
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    BoolLiteral,
}

impl NodeKind {
    /// Whether the node declares something (as opposed to executing).
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::Function | NodeKind::Class | NodeKind::Union | NodeKind::Enum
        )
    }

    /// Whether the node may appear as an operand inside an `Expression`.
    pub fn is_operand(self) -> bool {
        matches!(
            self,
            NodeKind::Expression
                | NodeKind::Identifier
                | NodeKind::TypeName
                | NodeKind::IntegerLiteral
                | NodeKind::FloatLiteral
                | NodeKind::StringLiteral
                | NodeKind::BoolLiteral
        )
    }

    /// Whether the node is an operator token inside an `Expression`.
    pub fn is_operator(self) -> bool {
        matches!(self, NodeKind::Operator | NodeKind::Call | NodeKind::Index)
    }
}

/// Index into a [`SyntaxTree`](crate::SyntaxTree)'s node arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Process-unique identity of a parsed tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct TreeId(u32);

impl TreeId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        TreeId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identity of a node across every tree loaded in one run.
///
/// Scopes are cached by the identity of the node that introduces them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeKey {
    pub tree: TreeId,
    pub node: NodeId,
}
