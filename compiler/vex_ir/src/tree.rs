//! Flat syntax tree arena.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{Name, NodeId, NodeKey, NodeKind, SourcePos, TreeId};

static NEXT_TREE_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    text: Name,
    children: Vec<NodeId>,
    pos: SourcePos,
}

/// One parsed unit: every node lives in one arena, children are ids.
#[derive(Debug)]
pub struct SyntaxTree {
    id: TreeId,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SyntaxTree {
    #[inline]
    pub fn id(&self) -> TreeId {
        self.id
    }

    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root)
    }

    /// Borrow a node cursor.
    ///
    /// Ids come from this tree's own builder, so the index is always valid.
    #[inline]
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

/// Borrowed cursor over one node.
#[derive(Copy, Clone)]
pub struct NodeRef<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    #[inline]
    pub fn id(self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn key(self) -> NodeKey {
        NodeKey {
            tree: self.tree.id,
            node: self.id,
        }
    }

    #[inline]
    pub fn tree(self) -> &'t SyntaxTree {
        self.tree
    }

    #[inline]
    pub fn kind(self) -> NodeKind {
        self.tree.data(self.id).kind
    }

    /// Raw source text (identifier, literal, operator symbol).
    #[inline]
    pub fn text(self) -> Name {
        self.tree.data(self.id).text
    }

    #[inline]
    pub fn pos(self) -> SourcePos {
        self.tree.data(self.id).pos
    }

    pub fn child_count(self) -> usize {
        self.tree.data(self.id).children.len()
    }

    pub fn child(self, index: usize) -> Option<NodeRef<'t>> {
        self.tree
            .data(self.id)
            .children
            .get(index)
            .map(|&id| self.tree.node(id))
    }

    pub fn children(self) -> impl DoubleEndedIterator<Item = NodeRef<'t>> + ExactSizeIterator {
        let tree = self.tree;
        tree.data(self.id)
            .children
            .iter()
            .map(move |&id| tree.node(id))
    }

    /// First child with the given tag.
    pub fn find_child(self, kind: NodeKind) -> Option<NodeRef<'t>> {
        self.children().find(|c| c.kind() == kind)
    }

    /// Every node below this one, in pre-order.
    pub fn descendants(self) -> impl Iterator<Item = NodeRef<'t>> {
        let mut pending: Vec<NodeRef<'t>> = self.children().rev().collect();
        std::iter::from_fn(move || {
            let node = pending.pop()?;
            pending.extend(node.children().rev());
            Some(node)
        })
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("pos", &self.pos())
            .finish()
    }
}

/// Builds a [`SyntaxTree`] bottom-up: children first, then their parent.
#[derive(Default)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id.
    pub fn push(
        &mut self,
        kind: NodeKind,
        text: Name,
        children: Vec<NodeId>,
        pos: SourcePos,
    ) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeData {
            kind,
            text,
            children,
            pos,
        });
        id
    }

    /// Finish the tree with `root` as its root node.
    pub fn finish(self, root: NodeId) -> SyntaxTree {
        SyntaxTree {
            id: TreeId::from_raw(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)),
            nodes: self.nodes,
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StringInterner;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_links_children_in_order() {
        let interner = StringInterner::new();
        let mut b = TreeBuilder::new();
        let one = b.push(
            NodeKind::IntegerLiteral,
            interner.intern("1"),
            vec![],
            SourcePos::new(1, 1),
        );
        let plus = b.push(
            NodeKind::Operator,
            interner.intern("+"),
            vec![],
            SourcePos::new(1, 3),
        );
        let two = b.push(
            NodeKind::IntegerLiteral,
            interner.intern("2"),
            vec![],
            SourcePos::new(1, 5),
        );
        let expr = b.push(NodeKind::Expression, Name::EMPTY, vec![one, plus, two], SourcePos::new(1, 1));
        let tree = b.finish(expr);

        let root = tree.root();
        assert_eq!(root.kind(), NodeKind::Expression);
        assert_eq!(root.child_count(), 3);
        let kinds: Vec<_> = root.children().map(NodeRef::kind).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::IntegerLiteral, NodeKind::Operator, NodeKind::IntegerLiteral]
        );
        assert_eq!(interner.lookup(root.child(1).map_or(Name::EMPTY, NodeRef::text)), "+");
    }

    #[test]
    fn trees_get_distinct_ids() {
        let mut a = TreeBuilder::new();
        let ra = a.push(NodeKind::Module, Name::EMPTY, vec![], SourcePos::DUMMY);
        let mut b = TreeBuilder::new();
        let rb = b.push(NodeKind::Module, Name::EMPTY, vec![], SourcePos::DUMMY);
        let ta = a.finish(ra);
        let tb = b.finish(rb);
        assert_ne!(ta.id(), tb.id());
        assert_ne!(ta.root().key(), tb.root().key());
    }

    #[test]
    fn descendants_walk_in_pre_order() {
        let mut b = TreeBuilder::new();
        let leaf = |b: &mut TreeBuilder, kind| b.push(kind, Name::EMPTY, vec![], SourcePos::DUMMY);
        let import = leaf(&mut b, NodeKind::Import);
        let inner = b.push(NodeKind::Block, Name::EMPTY, vec![import], SourcePos::DUMMY);
        let cont = leaf(&mut b, NodeKind::Continue);
        let outer = b.push(NodeKind::Block, Name::EMPTY, vec![inner, cont], SourcePos::DUMMY);
        let tree = b.finish(outer);

        let kinds: Vec<_> = tree.root().descendants().map(NodeRef::kind).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Block, NodeKind::Import, NodeKind::Continue]
        );
    }
}
