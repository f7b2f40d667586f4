//! Trace DAG of the search.
//!
//! When enabled with the `record_trace` option, the solver records every decision level as a node
//! of a DAG. Each node has two branches, one per value of the decided variable. A branch lists the
//! literals forced on it and points to the nodes of the sub-components solved below it. Components
//! that are answered from the cache reuse the node recorded when they were first solved, so nodes
//! can have multiple parents.
//!
//! The DAG is all a serializer needs to emit a strategy for a stochastic formula or a decision-DNNF
//! for a counted formula. Nodes are kept in an arena and reference counted. A node is freed exactly
//! when the last edge pointing to it is removed.
use log::debug;

use crate::lit::{Lit, Var};
use crate::prefix::QuantifierKind;

/// Index of a node in the [`Trace`] arena.
pub type NodeId = usize;

/// The constant false node.
pub const FALSE_NODE: NodeId = 0;
/// The constant true node.
pub const TRUE_NODE: NodeId = 1;

/// What a node stands for.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NodeKind {
    Constant(bool),
    /// The whole formula, only the second branch is used.
    Root,
    /// A decision on `var`. Branch 0 assigns the literal `var.lit(polarity)`, branch 1 its negation.
    Decision {
        var: Var,
        polarity: bool,
        quantifier: QuantifierKind,
    },
}

/// Everything recorded for one value of a decided variable.
#[derive(Clone, Debug, Default)]
pub struct TraceBranch {
    /// Forced existential literals.
    pub exist_implied: Vec<Lit>,
    /// Forced random literals.
    pub random_implied: Vec<Lit>,
    /// Existential literals dropped as pure.
    pub pure: Vec<Lit>,
    /// Variables left unconstrained, each a component of its own.
    pub free: Vec<Var>,
    /// Nodes of the sub-components solved on this branch.
    pub children: Vec<NodeId>,
}

impl TraceBranch {
    pub fn is_empty(&self) -> bool {
        self.exist_implied.is_empty()
            && self.random_implied.is_empty()
            && self.pure.is_empty()
            && self.free.is_empty()
            && self.children.is_empty()
    }
}

/// A node of the trace DAG.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub branches: [TraceBranch; 2],
    /// Number of incoming edges.
    pub refs: usize,
    /// For existential decisions, the branch with the higher probability.
    pub max_branch: Option<usize>,
    /// Branch skipped because the other one already determined the value.
    pub pruned_branch: Option<usize>,
    active_branch: usize,
}

impl Node {
    fn new(kind: NodeKind, active_branch: usize) -> Node {
        Node {
            kind,
            branches: Default::default(),
            refs: 0,
            max_branch: None,
            pruned_branch: None,
            active_branch,
        }
    }

    fn active_mut(&mut self) -> &mut TraceBranch {
        &mut self.branches[self.active_branch]
    }
}

/// Arena of trace nodes.
pub struct Trace {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    live: usize,
    edges: usize,
    root: Option<NodeId>,
    enabled: bool,
}

impl Default for Trace {
    fn default() -> Trace {
        Trace {
            nodes: vec![
                Some(Node::new(NodeKind::Constant(false), 0)),
                Some(Node::new(NodeKind::Constant(true), 0)),
            ],
            free: vec![],
            live: 2,
            edges: 0,
            root: None,
            enabled: false,
        }
    }
}

impl Trace {
    /// Whether events are recorded.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn enable(&mut self) {
        self.enabled = true;
    }

    /// The node of the whole formula.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Access a live node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).and_then(|node| node.as_ref())
    }

    /// Number of live nodes, constants included.
    pub fn num_nodes(&self) -> usize {
        self.live
    }

    /// Number of edges between live nodes.
    pub fn num_edges(&self) -> usize {
        self.edges
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes[id].as_mut() {
            Some(node) => node,
            None => panic!("access to released trace node {}", id),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    /// Create the root node, kept alive by the trace itself.
    pub(crate) fn new_root(&mut self) -> NodeId {
        let mut node = Node::new(NodeKind::Root, 1);
        node.refs = 1;
        let id = self.alloc(node);
        self.root = Some(id);
        id
    }

    /// Create a node for a new decision.
    pub(crate) fn new_decision(&mut self, decision: Lit, quantifier: QuantifierKind) -> NodeId {
        self.alloc(Node::new(
            NodeKind::Decision {
                var: decision.var(),
                polarity: decision.is_positive(),
                quantifier,
            },
            0,
        ))
    }

    /// Add an edge from the active branch of `parent` to `child`.
    pub(crate) fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert_ne!(parent, child);
        self.node_mut(parent).active_mut().children.push(child);
        self.retain(child);
        self.edges += 1;
    }

    /// Count an additional reference to a node held outside of the DAG.
    pub(crate) fn retain(&mut self, id: NodeId) {
        self.node_mut(id).refs += 1;
    }

    /// Record literals forced on the active branch.
    pub(crate) fn record_implied(&mut self, id: NodeId, exist: &[Lit], random: &[Lit]) {
        let branch = self.node_mut(id).active_mut();
        branch.exist_implied.extend_from_slice(exist);
        branch.random_implied.extend_from_slice(random);
    }

    pub(crate) fn add_pure(&mut self, id: NodeId, lit: Lit) {
        self.node_mut(id).active_mut().pure.push(lit);
    }

    pub(crate) fn add_free_var(&mut self, id: NodeId, var: Var) {
        self.node_mut(id).active_mut().free.push(var);
    }

    /// Whether nothing was recorded on the active branch yet.
    pub(crate) fn active_branch_is_empty(&self, id: NodeId) -> bool {
        self.node(id)
            .map_or(true, |node| node.branches[node.active_branch].is_empty())
    }

    pub(crate) fn change_branch(&mut self, id: NodeId) {
        self.node_mut(id).active_branch = 1;
    }

    /// Replace everything below the active branch by the false constant.
    pub(crate) fn clear_branch(&mut self, id: NodeId) {
        let children = std::mem::replace(&mut self.node_mut(id).active_mut().children, vec![]);
        self.edges -= children.len();
        for child in children {
            self.release(child);
        }
        self.add_child(id, FALSE_NODE);
    }

    /// Record that the second branch was skipped.
    pub(crate) fn skip_second_branch(&mut self, id: NodeId) {
        self.change_branch(id);
        self.add_child(id, FALSE_NODE);
        self.node_mut(id).pruned_branch = Some(1);
    }

    /// Drop everything recorded on the active branch, which stopped early.
    pub(crate) fn prune_active_branch(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.pruned_branch = Some(node.active_branch);
        let removed = std::mem::take(node.active_mut());
        self.edges -= removed.children.len();
        for child in removed.children {
            self.release(child);
        }
        self.add_child(id, FALSE_NODE);
    }

    pub(crate) fn set_max_branch(&mut self, id: NodeId, branch: usize) {
        self.node_mut(id).max_branch = Some(branch);
    }

    /// Drop a reference to a node, freeing it and everything only reachable through it.
    pub(crate) fn release(&mut self, id: NodeId) {
        let mut worklist = vec![id];

        while let Some(id) = worklist.pop() {
            if id <= TRUE_NODE {
                self.node_mut(id).refs -= 1;
                continue;
            }
            let node = self.node_mut(id);
            node.refs -= 1;
            if node.refs > 0 {
                continue;
            }
            if let Some(node) = self.nodes[id].take() {
                for branch in node.branches.iter() {
                    self.edges -= branch.children.len();
                    worklist.extend_from_slice(&branch.children);
                }
                self.free.push(id);
                self.live -= 1;
                if self.root == Some(id) {
                    self.root = None;
                }
            }
        }
    }

    /// Keep only the maximal branch of each existential decision reachable from the root.
    ///
    /// The remaining DAG describes a single strategy for the existential variables.
    pub fn prune_non_maximal(&mut self) {
        let root = match self.root {
            Some(root) => root,
            None => return,
        };

        let mut visited = vec![false; self.nodes.len()];
        let mut worklist = vec![root];
        let mut pruned = 0;

        while let Some(id) = worklist.pop() {
            if visited[id] {
                continue;
            }
            visited[id] = true;

            let node = self.node_mut(id);
            let drop_branch = match (node.kind, node.max_branch) {
                (
                    NodeKind::Decision {
                        quantifier: QuantifierKind::Exists,
                        ..
                    },
                    Some(max_branch),
                ) if node.pruned_branch.is_none() => Some(max_branch ^ 1),
                _ => None,
            };

            if let Some(branch) = drop_branch {
                node.pruned_branch = Some(branch);
                let removed = std::mem::take(&mut node.branches[branch]);
                node.branches[branch].children.push(FALSE_NODE);
                self.retain(FALSE_NODE);
                self.edges += 1;
                self.edges -= removed.children.len();
                for child in removed.children {
                    self.release(child);
                }
                pruned += 1;
            }

            if let Some(node) = self.node(id) {
                for branch in node.branches.iter() {
                    worklist.extend_from_slice(&branch.children);
                }
            }
        }

        debug!("pruned {} non-maximal branches", pruned);
    }
}
