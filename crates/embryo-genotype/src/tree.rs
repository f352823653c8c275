//! Arena-backed program tree of a genotype
//!
//! Nodes live in a flat vector and refer to each other by `NodeId`. Every
//! tree starts with a synthetic root whose single child is the real program.
//! Edits (detach, insert, remove, graft) only rewrite indices, so a full copy
//! of a tree is a plain `clone()` and discarding a failed edit is free.
//! Detached nodes stay in the arena but are unreachable from the root.

use embryo_alphabet::{NeuronProperty, Sign};
use serde::{Deserialize, Serialize};

/// Stable index of a node inside its `GenoTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Type a developmental cell differentiates into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// Body segment; cannot branch any more
    Stick,
    /// Neuron; keeps the ability to branch
    Neuron,
}

impl CellKind {
    pub fn symbol(&self) -> char {
        match self {
            CellKind::Stick => 'X',
            CellKind::Neuron => 'N',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            'X' => Some(CellKind::Stick),
            'N' => Some(CellKind::Neuron),
            _ => None,
        }
    }
}

/// Where a connection takes its input from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkSource {
    /// Cell at a signed offset from the receiving cell in creation order
    Relative(i32),
    /// Sensor neuron class, by name
    Sensor(String),
}

/// Kind of a program node, with the scratch data that kind needs
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Synthetic root; carries no genotype information
    Root,
    /// `>` ends a branch
    Terminal,
    /// `<` splits a cell; child 0 is the first branch, child 1 the second
    Division,
    /// `#n`; child 0 is the repeated fragment, child 1 the continuation
    Repetition { count: u8 },
    /// `[source:weight]`
    Connection { source: LinkSource, weight: f64 },
    /// `:+!:` and friends
    NeuronProperty {
        sign: Sign,
        property: NeuronProperty,
    },
    /// Single-letter simple modifier
    Modifier(char),
    /// `X` or `N`
    Differentiate(CellKind),
    /// Neuron class name
    ClassName(String),
}

impl NodeKind {
    /// Number of children a node of this kind owns
    pub fn arity(&self) -> usize {
        match self {
            NodeKind::Terminal => 0,
            NodeKind::Division | NodeKind::Repetition { .. } => 2,
            _ => 1,
        }
    }

    /// Kinds the "modify" mutation can perturb
    pub fn is_structurally_mutable(&self) -> bool {
        matches!(
            self,
            NodeKind::Division | NodeKind::Connection { .. } | NodeKind::Repetition { .. }
        )
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        match self {
            NodeKind::Root => "root".to_string(),
            NodeKind::Terminal => ">".to_string(),
            NodeKind::Division => "<".to_string(),
            NodeKind::Repetition { count } => format!("#{}", count),
            NodeKind::Connection { source, weight } => match source {
                LinkSource::Relative(offset) => format!("[{}:{}]", offset, weight),
                LinkSource::Sensor(name) => format!("[{}:{}]", name, weight),
            },
            NodeKind::NeuronProperty { sign, property } => {
                format!(":{}{}:", sign.symbol(), property.symbol())
            }
            NodeKind::Modifier(c) => c.to_string(),
            NodeKind::Differentiate(kind) => kind.symbol().to_string(),
            NodeKind::ClassName(name) => name.clone(),
        }
    }
}

/// One node of the program tree
#[derive(Debug, Clone)]
pub struct GenoNode {
    pub kind: NodeKind,
    /// Offset of the token in the source text
    pub pos: usize,
    parent: Option<NodeId>,
    children: [Option<NodeId>; 2],
}

impl GenoNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child(&self, slot: usize) -> Option<NodeId> {
        self.children.get(slot).copied().flatten()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().filter_map(|c| *c)
    }

    pub fn child_count(&self) -> usize {
        self.children().count()
    }
}

/// Program tree parsed from a genotype
#[derive(Debug, Clone)]
pub struct GenoTree {
    nodes: Vec<GenoNode>,
}

impl GenoTree {
    /// Tree holding only the synthetic root
    pub fn new() -> Self {
        Self {
            nodes: vec![GenoNode {
                kind: NodeKind::Root,
                pos: 0,
                parent: None,
                children: [None, None],
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// First real program node
    pub fn program(&self) -> Option<NodeId> {
        self.node(self.root()).child(0)
    }

    pub fn node(&self, id: NodeId) -> &GenoNode {
        &self.nodes[id.0]
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    /// Create a detached node
    pub fn add_node(&mut self, kind: NodeKind, pos: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(GenoNode {
            kind,
            pos,
            parent: None,
            children: [None, None],
        });
        id
    }

    /// Put `child` into `parent`'s `slot`
    pub fn attach(&mut self, parent: NodeId, slot: usize, child: NodeId) {
        self.nodes[parent.0].children[slot] = Some(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Parent and slot currently holding `id`
    pub fn slot_of(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.node(id).parent?;
        let slot = self.node(parent).children.iter().position(|&c| c == Some(id))?;
        Some((parent, slot))
    }

    /// Unhook `id` from its parent, returning where it was
    pub fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let (parent, slot) = self.slot_of(id)?;
        self.nodes[parent.0].children[slot] = None;
        self.nodes[id.0].parent = None;
        Some((parent, slot))
    }

    /// Reachable nodes below (and including) `from`, in pre-order
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = self.node(id);
            for slot in (0..2).rev() {
                if let Some(child) = node.child(slot) {
                    stack.push(child);
                }
            }
        }
        order
    }

    /// All program nodes (everything reachable except the root)
    pub fn program_nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.preorder(self.root());
        nodes.remove(0);
        nodes
    }

    /// Number of program nodes, excluding the synthetic root
    pub fn count(&self) -> usize {
        self.program().map_or(0, |p| self.subtree_size(p))
    }

    pub fn subtree_size(&self, id: NodeId) -> usize {
        self.preorder(id).len()
    }

    /// Subtree size of every node reachable from `from`, indexed by `NodeId::index`.
    /// Unreachable nodes report 0.
    pub fn subtree_sizes(&self, from: NodeId) -> Vec<usize> {
        let mut sizes = vec![0; self.nodes.len()];
        for id in self.preorder(from).into_iter().rev() {
            sizes[id.0] = 1 + self.node(id).children().map(|c| sizes[c.0]).sum::<usize>();
        }
        sizes
    }

    /// Insert a new node of `kind` in `target`'s place; `target` becomes its child 0
    pub fn insert_before(&mut self, target: NodeId, kind: NodeKind) -> Option<NodeId> {
        let (parent, slot) = self.detach(target)?;
        let pos = self.node(target).pos;
        let wrapper = self.add_node(kind, pos);
        self.attach(parent, slot, wrapper);
        self.attach(wrapper, 0, target);
        Some(wrapper)
    }

    /// Remove `id`, splicing its `keep` child into its place.
    ///
    /// A second child, if any, is dropped together with its subtree.
    /// Returns the number of program nodes removed.
    pub fn remove_node(&mut self, id: NodeId, keep: usize) -> Option<usize> {
        let kept = self.node(id).child(keep)?;
        let dropped = self.node(id).child(1 - keep.min(1));
        let (parent, slot) = self.detach(id)?;
        let dropped_size = match dropped {
            Some(d) if d != kept => self.subtree_size(d),
            _ => 0,
        };
        self.detach(kept);
        if let Some(d) = dropped
            && d != kept
        {
            self.detach(d);
        }
        self.attach(parent, slot, kept);
        Some(1 + dropped_size)
    }

    /// Put `replacement` where `old` is; `old` becomes detached
    pub fn replace_subtree(&mut self, old: NodeId, replacement: NodeId) -> bool {
        match self.detach(old) {
            Some((parent, slot)) => {
                self.detach(replacement);
                self.attach(parent, slot, replacement);
                true
            }
            None => false,
        }
    }

    /// Exchange the two children of a node
    pub fn swap_children(&mut self, id: NodeId) {
        self.nodes[id.0].children.swap(0, 1);
    }

    /// Deep-copy the subtree at `from` in `other` into this arena (detached)
    pub fn graft(&mut self, other: &GenoTree, from: NodeId) -> NodeId {
        let source = other.node(from);
        let top = self.add_node(source.kind.clone(), source.pos);
        let mut stack = vec![(from, top)];
        while let Some((src, dst)) = stack.pop() {
            for slot in 0..2 {
                if let Some(child) = other.node(src).child(slot) {
                    let child_node = other.node(child);
                    let copy = self.add_node(child_node.kind.clone(), child_node.pos);
                    self.attach(dst, slot, copy);
                    stack.push((child, copy));
                }
            }
        }
        top
    }

    /// Same shape and node kinds (source offsets are ignored)
    pub fn structurally_equal(&self, other: &GenoTree) -> bool {
        let mut stack = vec![(self.root(), other.root())];
        while let Some((a, b)) = stack.pop() {
            let (na, nb) = (self.node(a), other.node(b));
            if na.kind != nb.kind {
                return false;
            }
            for slot in 0..2 {
                match (na.child(slot), nb.child(slot)) {
                    (Some(ca), Some(cb)) => stack.push((ca, cb)),
                    (None, None) => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Check child arity and parent back-references of every reachable node
    pub fn is_consistent(&self) -> bool {
        for id in self.preorder(self.root()) {
            let node = self.node(id);
            let expected = match node.kind {
                NodeKind::Root => 1,
                ref kind => kind.arity(),
            };
            if node.child_count() != expected {
                return false;
            }
            if node.children().any(|c| self.node(c).parent != Some(id)) {
                return false;
            }
        }
        true
    }
}

impl Default for GenoTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds `X>` by hand
    fn stick_tree() -> (GenoTree, NodeId, NodeId) {
        let mut tree = GenoTree::new();
        let x = tree.add_node(NodeKind::Differentiate(CellKind::Stick), 0);
        let end = tree.add_node(NodeKind::Terminal, 1);
        let root = tree.root();
        tree.attach(root, 0, x);
        tree.attach(x, 0, end);
        (tree, x, end)
    }

    #[test]
    fn test_count_excludes_root() {
        let (tree, _, _) = stick_tree();
        assert_eq!(tree.count(), 2);
        assert!(tree.is_consistent());
        assert_eq!(GenoTree::new().count(), 0);
    }

    #[test]
    fn test_subtree_sizes_match_single_counts() {
        let (mut tree, _, terminal) = stick_tree();
        tree.insert_before(terminal, NodeKind::Modifier('L'));
        let sizes = tree.subtree_sizes(tree.root());
        for id in tree.preorder(tree.root()) {
            assert_eq!(sizes[id.index()], tree.subtree_size(id));
        }
        assert_eq!(sizes[tree.root().index()], tree.count() + 1);
    }

    #[test]
    fn test_insert_before_takes_slot() {
        let (mut tree, x, end) = stick_tree();
        let modifier = tree.insert_before(end, NodeKind::Modifier('L')).unwrap();
        assert_eq!(tree.node(x).child(0), Some(modifier));
        assert_eq!(tree.node(modifier).child(0), Some(end));
        assert_eq!(tree.node(modifier).pos, 1);
        assert_eq!(tree.count(), 3);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_insert_before_root_fails() {
        let (mut tree, _, _) = stick_tree();
        let root = tree.root();
        assert!(tree.insert_before(root, NodeKind::Modifier('L')).is_none());
    }

    #[test]
    fn test_remove_single_child_node() {
        let (mut tree, x, end) = stick_tree();
        assert_eq!(tree.remove_node(x, 0), Some(1));
        assert_eq!(tree.program(), Some(end));
        assert_eq!(tree.count(), 1);
    }

    #[test]
    fn test_remove_division_drops_other_branch() {
        // <X>N>
        let mut tree = GenoTree::new();
        let div = tree.add_node(NodeKind::Division, 0);
        let x = tree.add_node(NodeKind::Differentiate(CellKind::Stick), 1);
        let end1 = tree.add_node(NodeKind::Terminal, 2);
        let n = tree.add_node(NodeKind::Differentiate(CellKind::Neuron), 3);
        let end2 = tree.add_node(NodeKind::Terminal, 4);
        let root = tree.root();
        tree.attach(root, 0, div);
        tree.attach(div, 0, x);
        tree.attach(x, 0, end1);
        tree.attach(div, 1, n);
        tree.attach(n, 0, end2);
        assert!(tree.is_consistent());
        assert_eq!(tree.count(), 5);

        let removed = tree.remove_node(div, 1).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(tree.program(), Some(n));
        assert_eq!(tree.count(), 2);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_graft_copies_subtree() {
        let (source, x, _) = stick_tree();
        let mut target = GenoTree::new();
        let copy = target.graft(&source, x);
        let root = target.root();
        target.attach(root, 0, copy);
        assert!(target.structurally_equal(&source));
        assert!(target.is_consistent());
    }

    #[test]
    fn test_replace_subtree() {
        let (mut tree, x, end) = stick_tree();
        let neuron = tree.add_node(NodeKind::Differentiate(CellKind::Neuron), 0);
        let end2 = tree.add_node(NodeKind::Terminal, 1);
        tree.attach(neuron, 0, end2);
        assert!(tree.replace_subtree(x, neuron));
        assert_eq!(tree.program(), Some(neuron));
        assert!(tree.node(x).parent().is_none());
        assert_eq!(tree.node(x).child(0), Some(end));
        assert_eq!(tree.count(), 2);
    }

    #[test]
    fn test_structural_equality_ignores_positions() {
        let (a, _, _) = stick_tree();
        let mut b = GenoTree::new();
        let x = b.add_node(NodeKind::Differentiate(CellKind::Stick), 10);
        let end = b.add_node(NodeKind::Terminal, 20);
        let root = b.root();
        b.attach(root, 0, x);
        b.attach(x, 0, end);
        assert!(a.structurally_equal(&b));

        *b.kind_mut(x) = NodeKind::Differentiate(CellKind::Neuron);
        assert!(!a.structurally_equal(&b));
    }
}
