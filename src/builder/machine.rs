//! Compiling a nested specification into a validated definition.

use crate::builder::error::DefinitionError;
use crate::builder::spec::{MachineSpec, StateSpec};
use crate::core::{DelayedTransition, MachineDefinition, NodeId, StateKind, StateNode, TransitionDef};
use indexmap::IndexMap;
use std::collections::HashSet;

impl MachineSpec {
    /// Build the flat node table, resolving every initial child and
    /// transition target.
    ///
    /// All problems are collected before returning, so a definition with a
    /// missing initial child and a dangling target reports both.
    pub fn build(&self) -> Result<MachineDefinition, DefinitionError> {
        let mut errors = Vec::new();
        if self.id.is_empty() {
            errors.push(DefinitionError::EmptyId);
        }

        let mut nodes = Vec::new();
        let mut specs = Vec::new();
        flatten(
            &self.root,
            self.id.clone(),
            self.id.clone(),
            None,
            0,
            &mut nodes,
            &mut specs,
            &mut errors,
        );

        {
            let mut seen = HashSet::new();
            for node in &nodes {
                if !seen.insert(node.id.as_str()) {
                    errors.push(DefinitionError::DuplicateId {
                        id: node.id.clone(),
                    });
                }
            }
        }

        let mut definition = MachineDefinition::from_parts(nodes, self.context.clone());

        let resolved: Vec<_> = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let id = NodeId(index);
                (
                    resolve_initial(&definition, id, spec, &mut errors),
                    resolve_transitions(&definition, id, spec, &mut errors),
                    resolve_delayed(&definition, id, spec, &mut errors),
                )
            })
            .collect();

        for (index, (initial, transitions, delayed)) in resolved.into_iter().enumerate() {
            let node = definition.node_mut(NodeId(index));
            node.initial = initial;
            node.transitions = transitions;
            node.delayed = delayed;
        }

        DefinitionError::collect(errors)?;
        Ok(definition)
    }
}

#[allow(clippy::too_many_arguments)]
fn flatten<'s>(
    spec: &'s StateSpec,
    key: String,
    default_id: String,
    parent: Option<NodeId>,
    depth: usize,
    nodes: &mut Vec<StateNode>,
    specs: &mut Vec<&'s StateSpec>,
    errors: &mut Vec<DefinitionError>,
) -> NodeId {
    let index = NodeId(nodes.len());
    let kind = spec.resolved_kind();
    let id = spec.id.clone().unwrap_or(default_id);
    nodes.push(StateNode {
        id: id.clone(),
        key,
        kind,
        parent,
        children: Vec::new(),
        initial: None,
        entry: spec.entry.clone(),
        exit: spec.exit.clone(),
        transitions: IndexMap::new(),
        delayed: Vec::new(),
        depth,
    });
    specs.push(spec);

    if kind.is_leaf() {
        if !spec.states.is_empty() {
            errors.push(DefinitionError::ChildrenOnLeaf {
                state: id,
                kind: kind.to_string(),
            });
        }
        return index;
    }

    for (child_key, child_spec) in &spec.states {
        if child_key.is_empty() || child_key.contains(['.', '#']) {
            errors.push(DefinitionError::InvalidKey {
                parent: id.clone(),
                key: child_key.clone(),
            });
            continue;
        }
        let child = flatten(
            child_spec,
            child_key.clone(),
            format!("{id}.{child_key}"),
            Some(index),
            depth + 1,
            nodes,
            specs,
            errors,
        );
        nodes[index.0].children.push(child);
    }
    index
}

fn resolve_initial(
    definition: &MachineDefinition,
    id: NodeId,
    spec: &StateSpec,
    errors: &mut Vec<DefinitionError>,
) -> Option<NodeId> {
    let node = definition.node(id);
    let empty = || DefinitionError::EmptyComposite {
        state: node.id.clone(),
        kind: node.kind.to_string(),
    };
    match node.kind {
        StateKind::Compound => {
            if node.children.is_empty() {
                errors.push(empty());
                return None;
            }
            let Some(initial) = spec.initial.as_deref() else {
                errors.push(DefinitionError::MissingInitial {
                    state: node.id.clone(),
                });
                return None;
            };
            let child = definition.child_by_key(id, initial);
            if child.is_none() {
                errors.push(DefinitionError::UnknownInitial {
                    state: node.id.clone(),
                    initial: initial.to_string(),
                });
            }
            child
        }
        StateKind::Parallel | StateKind::Atomic | StateKind::Final => {
            if node.kind == StateKind::Parallel && node.children.is_empty() {
                errors.push(empty());
            }
            if spec.initial.is_some() {
                errors.push(DefinitionError::UnexpectedInitial {
                    state: node.id.clone(),
                    kind: node.kind.to_string(),
                });
            }
            None
        }
    }
}

fn resolve_transitions(
    definition: &MachineDefinition,
    id: NodeId,
    spec: &StateSpec,
    errors: &mut Vec<DefinitionError>,
) -> IndexMap<String, Vec<TransitionDef>> {
    let mut table = IndexMap::new();
    for (event, candidates) in &spec.on {
        let mut resolved = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let target = match candidate.target.as_deref() {
                None => None,
                Some(raw) => match resolve_target(definition, id, raw) {
                    Some(target) => Some(target),
                    None => {
                        errors.push(DefinitionError::UnresolvedTarget {
                            state: definition.node(id).id.clone(),
                            event: event.clone(),
                            target: raw.to_string(),
                        });
                        continue;
                    }
                },
            };
            resolved.push(TransitionDef {
                event: event.clone(),
                source: id,
                target,
                guard: candidate.guard.clone(),
                actions: candidate.actions.clone(),
            });
        }
        table.insert(event.clone(), resolved);
    }
    table
}

fn resolve_delayed(
    definition: &MachineDefinition,
    id: NodeId,
    spec: &StateSpec,
    errors: &mut Vec<DefinitionError>,
) -> Vec<DelayedTransition> {
    let node = definition.node(id);
    spec.after
        .iter()
        .filter_map(|delayed| {
            let event = format!("after({}ms)#{}", delayed.delay_ms, node.id);
            if delayed.delay_ms == 0 {
                errors.push(DefinitionError::ZeroDelay {
                    state: node.id.clone(),
                });
                return None;
            }
            let Some(target) = resolve_target(definition, id, &delayed.target) else {
                errors.push(DefinitionError::UnresolvedTarget {
                    state: node.id.clone(),
                    event,
                    target: delayed.target.clone(),
                });
                return None;
            };
            Some(DelayedTransition {
                delay: delayed.delay(),
                transition: TransitionDef {
                    event,
                    source: id,
                    target: Some(target),
                    guard: None,
                    actions: delayed.actions.clone(),
                },
            })
        })
        .collect()
}

/// Resolve a target string relative to `source`.
///
/// `#a.b.c` first tries the whole string as an id, then the longest dotted
/// prefix that is an id followed by child keys. `.a.b` descends from the
/// source. Anything else descends from the source's parent (from the source
/// itself when it is the root).
pub(crate) fn resolve_target(
    definition: &MachineDefinition,
    source: NodeId,
    target: &str,
) -> Option<NodeId> {
    if let Some(absolute) = target.strip_prefix('#') {
        if let Some(found) = definition.lookup(absolute) {
            return Some(found);
        }
        let mut end = absolute.len();
        while let Some(dot) = absolute[..end].rfind('.') {
            let found = definition
                .lookup(&absolute[..dot])
                .and_then(|base| definition.descend(base, absolute[dot + 1..].split('.')));
            if found.is_some() {
                return found;
            }
            end = dot;
        }
        return None;
    }
    if let Some(descendant) = target.strip_prefix('.') {
        return definition.descend(source, descendant.split('.'));
    }
    let base = definition.parent(source).unwrap_or(source);
    definition.descend(base, target.split('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DelayedSpec, TransitionSpec};
    use std::time::Duration;

    fn nested() -> MachineSpec {
        MachineSpec::new("m")
            .initial("a")
            .state(
                "a",
                StateSpec::compound("a1")
                    .state("a1", StateSpec::atomic().on("next", TransitionSpec::to("a2")))
                    .state("a2", StateSpec::atomic().on("deep", TransitionSpec::to("#m.p.left.l1")))
                    .on("child", TransitionSpec::to(".a2"))
                    .on("sibling", TransitionSpec::to("p")),
            )
            .state(
                "p",
                StateSpec::parallel()
                    .state("left", StateSpec::compound("l1").state("l1", StateSpec::atomic()))
                    .state(
                        "right",
                        StateSpec::compound("r1")
                            .id("rightRegion")
                            .state("r1", StateSpec::atomic().on("jump", TransitionSpec::to("#rightRegion.r2")))
                            .state("r2", StateSpec::atomic()),
                    ),
            )
    }

    fn target_of(def: &MachineDefinition, state: &str, event: &str) -> Option<String> {
        let node = def.node(def.lookup(state).unwrap());
        node.candidates(event).unwrap()[0]
            .target
            .map(|t| def.node(t).id.clone())
    }

    #[test]
    fn resolves_sibling_descendant_and_absolute_targets() {
        let def = nested().build().unwrap();
        assert_eq!(target_of(&def, "m.a.a1", "next").as_deref(), Some("m.a.a2"));
        assert_eq!(target_of(&def, "m.a", "child").as_deref(), Some("m.a.a2"));
        assert_eq!(target_of(&def, "m.a", "sibling").as_deref(), Some("m.p"));
        assert_eq!(target_of(&def, "rightRegion.r1", "jump").as_deref(), Some("rightRegion.r2"));
        assert_eq!(target_of(&def, "m.a.a2", "deep").as_deref(), Some("m.p.left.l1"));
    }

    #[test]
    fn explicit_ids_rename_the_subtree() {
        let def = nested().build().unwrap();
        assert!(def.lookup("rightRegion").is_some());
        assert!(def.lookup("m.p.right").is_none());
    }

    #[test]
    fn absolute_paths_descend_by_key_below_the_longest_known_id() {
        // `m.p.right` is not an id, but `m.p` is and `right` is still its key.
        let def = nested()
            .state("z", StateSpec::atomic().on("deep", TransitionSpec::to("#m.p.right.r2")))
            .build()
            .unwrap();
        assert_eq!(target_of(&def, "m.z", "deep").as_deref(), Some("rightRegion.r2"));
    }

    #[test]
    fn dangling_absolute_path_is_rejected() {
        let err = nested()
            .state("z", StateSpec::atomic().on("deep", TransitionSpec::to("#m.p.left.l9")))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::UnresolvedTarget { ref target, .. } if target == "#m.p.left.l9"
        ));
    }

    #[test]
    fn missing_initial_is_reported() {
        let err = MachineSpec::new("m")
            .state("a", StateSpec::atomic())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::MissingInitial {
                state: "m".to_string()
            }
        );
    }

    #[test]
    fn unknown_initial_is_reported() {
        let err = MachineSpec::new("m")
            .initial("nope")
            .state("a", StateSpec::atomic())
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownInitial { .. }));
    }

    #[test]
    fn all_problems_are_collected() {
        let err = MachineSpec::new("m")
            .initial("a")
            .state(
                "a",
                StateSpec::atomic()
                    .on("go", TransitionSpec::to("missing"))
                    .state("child", StateSpec::atomic()),
            )
            .state("b", StateSpec::compound("x").state("y", StateSpec::atomic()))
            .state("c", StateSpec::parallel().initial("z"))
            .build()
            .unwrap_err();

        let issues = err.issues();
        assert_eq!(issues.len(), 5);
        assert!(issues.iter().any(|e| matches!(e, DefinitionError::ChildrenOnLeaf { .. })));
        assert!(issues.iter().any(|e| matches!(e, DefinitionError::UnresolvedTarget { .. })));
        assert!(issues.iter().any(|e| matches!(e, DefinitionError::UnknownInitial { .. })));
        assert!(issues.iter().any(|e| matches!(e, DefinitionError::EmptyComposite { .. })));
        assert!(issues.iter().any(|e| matches!(e, DefinitionError::UnexpectedInitial { .. })));
    }

    #[test]
    fn invalid_keys_and_duplicate_ids_are_rejected() {
        let err = MachineSpec::new("m")
            .initial("a")
            .state("a", StateSpec::atomic().id("shared"))
            .state("b", StateSpec::atomic().id("shared"))
            .state("c.d", StateSpec::atomic())
            .build()
            .unwrap_err();

        let issues = err.issues();
        assert!(issues
            .iter()
            .any(|e| matches!(e, DefinitionError::DuplicateId { id } if id == "shared")));
        assert!(issues.iter().any(|e| matches!(e, DefinitionError::InvalidKey { .. })));
    }

    #[test]
    fn delayed_transitions_are_resolved() {
        let def = MachineSpec::new("m")
            .initial("a")
            .state(
                "a",
                StateSpec::atomic().after_spec(DelayedSpec::new(Duration::from_secs(2), "b").action("escalate")),
            )
            .state("b", StateSpec::atomic())
            .build()
            .unwrap();

        let a = def.node(def.lookup("m.a").unwrap());
        assert_eq!(a.delayed.len(), 1);
        let delayed = &a.delayed[0];
        assert_eq!(delayed.delay, Duration::from_secs(2));
        assert_eq!(delayed.transition.target, def.lookup("m.b"));
        assert_eq!(delayed.transition.actions, vec!["escalate"]);
        assert_eq!(delayed.transition.event, "after(2000ms)#m.a");
    }

    #[test]
    fn dangling_delayed_target_is_rejected() {
        let err = MachineSpec::new("m")
            .initial("a")
            .state("a", StateSpec::atomic().after(Duration::from_secs(1), "ghost"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnresolvedTarget { .. }));
    }

    #[test]
    fn zero_delay_is_rejected() {
        let err = MachineSpec::new("m")
            .initial("a")
            .state("a", StateSpec::atomic().after(Duration::ZERO, "b"))
            .state("b", StateSpec::atomic())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::ZeroDelay {
                state: "m.a".to_string()
            }
        );
    }

    #[test]
    fn internal_transitions_have_no_target() {
        let def = MachineSpec::new("m")
            .initial("a")
            .state("a", StateSpec::atomic().on("tick", TransitionSpec::internal().action("count")))
            .build()
            .unwrap();
        assert_eq!(target_of(&def, "m.a", "tick"), None);
    }
}
