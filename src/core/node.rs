//! State nodes as stored in a compiled definition.
//!
//! Nodes live in a flat table and refer to each other by [`NodeId`]. Ids are
//! assigned in pre-order, so comparing two ids compares document order: a
//! parent always sorts before its descendants, and earlier siblings sort
//! before later ones.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Index of a node in a [`MachineDefinition`](super::MachineDefinition).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the definition's table.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The four kinds of statechart node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// Leaf with no children.
    Atomic,
    /// Exactly one child active at a time.
    Compound,
    /// Every child active at once.
    Parallel,
    /// Terminal leaf; completes its enclosing region.
    Final,
}

impl StateKind {
    /// Atomic and final nodes have no children.
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::Atomic | Self::Final)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Atomic => "atomic",
            Self::Compound => "compound",
            Self::Parallel => "parallel",
            Self::Final => "final",
        };
        f.write_str(name)
    }
}

/// A resolved transition.
///
/// `target` is `None` for an internal transition that runs its actions
/// without leaving the source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDef {
    pub event: String,
    pub source: NodeId,
    pub target: Option<NodeId>,
    pub guard: Option<String>,
    pub actions: Vec<String>,
}

/// A transition taken automatically once its source has been active for
/// `delay`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedTransition {
    pub delay: Duration,
    pub transition: TransitionDef,
}

/// One node of the state tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateNode {
    /// Unique id: explicit, or the dotted key path from the root.
    pub id: String,
    /// Key under the parent; the root's key is its id.
    pub key: String,
    pub kind: StateKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Default child of a compound node.
    pub initial: Option<NodeId>,
    pub entry: Vec<String>,
    pub exit: Vec<String>,
    /// Candidates per event, in declared order.
    pub transitions: IndexMap<String, Vec<TransitionDef>>,
    pub delayed: Vec<DelayedTransition>,
    pub depth: usize,
}

impl StateNode {
    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    /// Candidate transitions declared for `event`, if any.
    pub fn candidates(&self, event: &str) -> Option<&[TransitionDef]> {
        self.transitions.get(event).map(Vec::as_slice)
    }
}
