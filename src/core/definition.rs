//! Compiled, immutable state tree.

use super::context::Context;
use super::node::{NodeId, StateNode};
use std::collections::{BTreeSet, HashMap};

/// A validated state tree stored as a flat table.
///
/// Built once by [`MachineSpec::build`](crate::builder::MachineSpec::build)
/// and never mutated afterwards. Parent and child links are [`NodeId`]s, so
/// absolute targets that cross into another parallel region are plain table
/// lookups.
#[derive(Clone, Debug)]
pub struct MachineDefinition {
    nodes: Vec<StateNode>,
    ids: HashMap<String, NodeId>,
    context: Context,
}

impl MachineDefinition {
    /// Assemble a definition from an already validated pre-order node table.
    pub(crate) fn from_parts(nodes: Vec<StateNode>, context: Context) -> Self {
        let ids = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), NodeId(index)))
            .collect();
        Self {
            nodes,
            ids,
            context,
        }
    }

    /// Id of the root node, which names the machine.
    pub fn id(&self) -> &str {
        &self.nodes[0].id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut StateNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &StateNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    /// Find a node by its unique id.
    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    /// Context every new interpreter starts from.
    pub fn initial_context(&self) -> &Context {
        &self.context
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Whether `id` is a proper descendant of `ancestor`.
    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn child_by_key(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).key == key)
    }

    /// Follow a sequence of child keys downwards from `from`.
    pub fn descend<'k>(
        &self,
        from: NodeId,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> Option<NodeId> {
        keys.into_iter()
            .try_fold(from, |node, key| self.child_by_key(node, key))
    }

    /// Every action identifier referenced anywhere in the tree, paired with
    /// the id of the state that references it.
    pub fn action_references(&self) -> BTreeSet<(&str, &str)> {
        let mut refs = BTreeSet::new();
        for node in &self.nodes {
            let transitions = node
                .transitions
                .values()
                .flatten()
                .chain(node.delayed.iter().map(|d| &d.transition));
            let names = node
                .entry
                .iter()
                .chain(node.exit.iter())
                .chain(transitions.flat_map(|t| t.actions.iter()));
            for name in names {
                refs.insert((name.as_str(), node.id.as_str()));
            }
        }
        refs
    }

    /// Every guard identifier referenced anywhere in the tree, paired with
    /// the id of the state that references it.
    pub fn guard_references(&self) -> BTreeSet<(&str, &str)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.transitions
                    .values()
                    .flatten()
                    .filter_map(move |t| t.guard.as_deref().map(|g| (g, node.id.as_str())))
            })
            .collect()
    }
}
