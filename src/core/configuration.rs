//! The set of currently active nodes.

use super::definition::MachineDefinition;
use super::node::{NodeId, StateKind};
use super::value::{StateValue, ValueError};
use std::collections::{BTreeMap, BTreeSet};

/// Active nodes of one interpreter, kept in document order.
///
/// A legal configuration contains the root; exactly one child of every
/// active compound node; every child of every active parallel node; and no
/// child of an inactive node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Configuration {
    active: BTreeSet<NodeId>,
}

impl Configuration {
    /// Default configuration of `definition`: descend from the root through
    /// initial children, and through every region of each parallel node.
    pub fn initial(definition: &MachineDefinition) -> Self {
        let mut active = BTreeSet::new();
        add_default_entry(definition, definition.root(), &mut active);
        Self { active }
    }

    pub(crate) fn from_set(active: BTreeSet<NodeId>) -> Self {
        Self { active }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.active.contains(&id)
    }

    /// Active nodes in document order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.active.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active atomic and final nodes, in document order.
    pub fn leaves<'a>(
        &'a self,
        definition: &'a MachineDefinition,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.iter().filter(move |id| definition.node(*id).is_leaf())
    }

    /// Ids of the active leaves.
    pub fn leaf_ids<'a>(&'a self, definition: &'a MachineDefinition) -> Vec<&'a str> {
        self.leaves(definition)
            .map(|id| definition.node(id).id.as_str())
            .collect()
    }

    /// Whether `node` has settled: a final leaf, a compound whose active child
    /// has settled, or a parallel node whose regions have all settled.
    pub fn is_in_final(&self, definition: &MachineDefinition, node: NodeId) -> bool {
        let state = definition.node(node);
        match state.kind {
            StateKind::Final => self.contains(node),
            StateKind::Atomic => false,
            StateKind::Compound => state
                .children
                .iter()
                .find(|child| self.contains(**child))
                .is_some_and(|child| self.is_in_final(definition, *child)),
            StateKind::Parallel => state
                .children
                .iter()
                .all(|child| self.is_in_final(definition, *child)),
        }
    }

    /// Check the structural invariants against `definition`.
    pub fn is_legal(&self, definition: &MachineDefinition) -> bool {
        if !self.contains(definition.root()) {
            return false;
        }
        self.iter().all(|id| {
            let node = definition.node(id);
            let parent_ok = node.parent.map_or(true, |p| self.contains(p));
            let active_children = node.children.iter().filter(|c| self.contains(**c)).count();
            let children_ok = match node.kind {
                StateKind::Compound => active_children == 1,
                StateKind::Parallel => active_children == node.children.len(),
                StateKind::Atomic | StateKind::Final => true,
            };
            parent_ok && children_ok
        })
    }

    /// Nested-mapping form of this configuration.
    pub fn value(&self, definition: &MachineDefinition) -> StateValue {
        let root = definition.root();
        if definition.node(root).is_leaf() {
            return StateValue::leaf(definition.node(root).key.clone());
        }
        self.region_value(definition, root)
    }

    fn region_value(&self, definition: &MachineDefinition, node: NodeId) -> StateValue {
        let state = definition.node(node);
        match state.kind {
            StateKind::Compound => {
                let Some(child) = state.children.iter().copied().find(|c| self.contains(*c)) else {
                    return StateValue::Nested(BTreeMap::new());
                };
                let child_state = definition.node(child);
                if child_state.is_leaf() {
                    StateValue::leaf(child_state.key.clone())
                } else {
                    StateValue::Nested(BTreeMap::from([(
                        child_state.key.clone(),
                        self.region_value(definition, child),
                    )]))
                }
            }
            StateKind::Parallel => StateValue::Nested(
                state
                    .children
                    .iter()
                    .map(|child| {
                        (
                            definition.node(*child).key.clone(),
                            self.region_value(definition, *child),
                        )
                    })
                    .collect(),
            ),
            StateKind::Atomic | StateKind::Final => StateValue::Nested(BTreeMap::new()),
        }
    }

    /// Rebuild a configuration from its nested-mapping form, rejecting values
    /// that do not describe a legal configuration of `definition`.
    pub fn from_value(
        definition: &MachineDefinition,
        value: &StateValue,
    ) -> Result<Self, ValueError> {
        let root = definition.root();
        let mut active = BTreeSet::from([root]);
        if definition.node(root).is_leaf() {
            return match value {
                StateValue::Leaf(key) if *key == definition.node(root).key => Ok(Self { active }),
                _ => Err(ValueError::ShapeMismatch {
                    state: definition.id().to_string(),
                }),
            };
        }
        collect_region(definition, root, value, &mut active)?;
        Ok(Self { active })
    }
}

fn collect_region(
    definition: &MachineDefinition,
    node: NodeId,
    value: &StateValue,
    active: &mut BTreeSet<NodeId>,
) -> Result<(), ValueError> {
    let state = definition.node(node);
    let child = |key: &str| {
        definition
            .child_by_key(node, key)
            .ok_or_else(|| ValueError::UnknownState {
                parent: state.id.clone(),
                key: key.to_string(),
            })
    };
    let mismatch = || ValueError::ShapeMismatch {
        state: state.id.clone(),
    };

    match (state.kind, value) {
        (StateKind::Compound, StateValue::Leaf(key)) => {
            let id = child(key.as_str())?;
            if !definition.node(id).is_leaf() {
                return Err(ValueError::ShapeMismatch {
                    state: definition.node(id).id.clone(),
                });
            }
            active.insert(id);
            Ok(())
        }
        (StateKind::Compound, StateValue::Nested(map)) => {
            let mut entries = map.iter();
            let (Some((key, nested)), None) = (entries.next(), entries.next()) else {
                return Err(ValueError::AmbiguousChild {
                    state: state.id.clone(),
                });
            };
            let id = child(key.as_str())?;
            if definition.node(id).is_leaf() {
                return Err(ValueError::ShapeMismatch {
                    state: definition.node(id).id.clone(),
                });
            }
            active.insert(id);
            collect_region(definition, id, nested, active)
        }
        (StateKind::Parallel, StateValue::Nested(map)) => {
            if let Some(unknown) = map.keys().find(|k| definition.child_by_key(node, k).is_none()) {
                return Err(ValueError::UnknownState {
                    parent: state.id.clone(),
                    key: unknown.clone(),
                });
            }
            for region in &state.children {
                let region_state = definition.node(*region);
                let nested = map.get(&region_state.key).ok_or_else(|| ValueError::MissingRegion {
                    state: state.id.clone(),
                    region: region_state.key.clone(),
                })?;
                active.insert(*region);
                collect_region(definition, *region, nested, active)?;
            }
            Ok(())
        }
        (StateKind::Atomic | StateKind::Final, StateValue::Nested(map)) if map.is_empty() => Ok(()),
        _ => Err(mismatch()),
    }
}

/// Insert `node` and its default descendants into `set`.
pub(crate) fn add_default_entry(
    definition: &MachineDefinition,
    node: NodeId,
    set: &mut BTreeSet<NodeId>,
) {
    set.insert(node);
    let state = definition.node(node);
    match state.kind {
        StateKind::Compound => {
            if let Some(initial) = state.initial {
                add_default_entry(definition, initial, set);
            }
        }
        StateKind::Parallel => {
            for child in &state.children {
                add_default_entry(definition, *child, set);
            }
        }
        StateKind::Atomic | StateKind::Final => {}
    }
}
