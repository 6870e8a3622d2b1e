//! One macrostep: selecting transitions and computing what they exit and
//! enter.
//!
//! Everything here works on copies of the configuration and context. The
//! interpreter commits the returned [`Microstep`] only when every action
//! succeeded, which is what makes a failing action leave no trace.

use super::action::{ActionContext, ActionRegistry};
use super::error::InterpreterError;
use crate::core::{Configuration, Context, MachineDefinition, NodeId, StateKind, TransitionDef};
use std::collections::BTreeSet;
use tracing::debug;

/// Result of executing a set of transitions.
#[derive(Debug)]
pub(crate) struct Microstep {
    pub configuration: Configuration,
    pub context: Context,
    /// Exited nodes, innermost first.
    pub exited: Vec<NodeId>,
    /// Entered nodes, outermost first.
    pub entered: Vec<NodeId>,
    pub raised: Vec<String>,
}

/// Transitions enabled by `event`, free of conflicts, in document order of
/// the active leaves that selected them.
///
/// Each leaf looks upward for the nearest state with a candidate whose
/// guard passes, so an inner handler shadows an outer one for the same
/// event.
pub(crate) fn select_transitions<'d>(
    definition: &'d MachineDefinition,
    registry: &ActionRegistry,
    configuration: &Configuration,
    context: &Context,
    event: &str,
) -> Vec<&'d TransitionDef> {
    let mut enabled: Vec<&'d TransitionDef> = Vec::new();
    for leaf in configuration.leaves(definition) {
        let chosen = std::iter::once(leaf)
            .chain(definition.ancestors(leaf))
            .find_map(|state| {
                definition
                    .node(state)
                    .candidates(event)?
                    .iter()
                    .find(|candidate| guard_passes(registry, candidate, context, event))
            });
        if let Some(transition) = chosen {
            if !enabled.iter().any(|t| std::ptr::eq(*t, transition)) {
                enabled.push(transition);
            }
        }
    }
    remove_conflicts(definition, configuration, enabled)
}

fn guard_passes(
    registry: &ActionRegistry,
    transition: &TransitionDef,
    context: &Context,
    event: &str,
) -> bool {
    match transition.guard.as_deref() {
        None => true,
        Some(name) => registry
            .get_guard(name)
            .is_some_and(|guard| guard.check(context, event)),
    }
}

/// Drop transitions whose exit sets overlap an earlier one, unless the
/// later transition's source is nested inside the earlier's.
fn remove_conflicts<'d>(
    definition: &MachineDefinition,
    configuration: &Configuration,
    enabled: Vec<&'d TransitionDef>,
) -> Vec<&'d TransitionDef> {
    let mut kept: Vec<(&'d TransitionDef, BTreeSet<NodeId>)> = Vec::new();
    for transition in enabled {
        let exits = exit_set(definition, configuration, transition);
        let mut preempted = false;
        let mut displaced = Vec::new();
        for (index, (other, other_exits)) in kept.iter().enumerate() {
            if exits.is_disjoint(other_exits) {
                continue;
            }
            if definition.is_descendant(transition.source, other.source) {
                displaced.push(index);
            } else {
                preempted = true;
                break;
            }
        }
        if preempted {
            continue;
        }
        for index in displaced.into_iter().rev() {
            kept.remove(index);
        }
        kept.push((transition, exits));
    }
    kept.into_iter().map(|(transition, _)| transition).collect()
}

/// Where a transition's exits and entries happen.
///
/// `domain` is the nearest proper ancestor of the source that contains the
/// target. When the domain is parallel, only the region holding the target
/// is re-entered; sibling regions, including the source's own, keep their
/// active states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Scope {
    domain: NodeId,
    region: Option<NodeId>,
}

fn scope(definition: &MachineDefinition, source: NodeId, target: NodeId) -> Scope {
    let domain = definition
        .ancestors(source)
        .find(|ancestor| definition.is_descendant(target, *ancestor))
        .unwrap_or_else(|| definition.root());
    let region = match definition.node(domain).kind {
        StateKind::Parallel => std::iter::once(target)
            .chain(definition.ancestors(target))
            .find(|node| definition.parent(*node) == Some(domain)),
        _ => None,
    };
    Scope { domain, region }
}

fn exit_set(
    definition: &MachineDefinition,
    configuration: &Configuration,
    transition: &TransitionDef,
) -> BTreeSet<NodeId> {
    let Some(target) = transition.target else {
        return BTreeSet::new();
    };
    let Scope { domain, region } = scope(definition, transition.source, target);
    configuration
        .iter()
        .filter(|node| match region {
            Some(region) => *node == region || definition.is_descendant(*node, region),
            None => definition.is_descendant(*node, domain),
        })
        .collect()
}

/// Nodes from just below the domain down to `target`.
fn entry_path(definition: &MachineDefinition, source: NodeId, target: NodeId) -> Vec<NodeId> {
    let Scope { domain, .. } = scope(definition, source, target);
    let mut path: Vec<NodeId> = std::iter::once(target)
        .chain(definition.ancestors(target))
        .take_while(|node| *node != domain)
        .collect();
    path.reverse();
    path
}

/// Extend `entering` with default descendants until every entered compound
/// node has an active child and every entered parallel node has all of its
/// regions.
fn complete_entry(
    definition: &MachineDefinition,
    retained: &BTreeSet<NodeId>,
    entering: &mut BTreeSet<NodeId>,
) {
    let mut pending: Vec<NodeId> = entering.iter().copied().collect();
    while let Some(node) = pending.pop() {
        let state = definition.node(node);
        let active = |child: &NodeId| retained.contains(child) || entering.contains(child);
        let missing: Vec<NodeId> = match state.kind {
            StateKind::Compound if !state.children.iter().any(active) => {
                state.initial.into_iter().collect()
            }
            StateKind::Parallel => state.children.iter().copied().filter(|c| !active(c)).collect(),
            _ => Vec::new(),
        };
        for child in missing {
            entering.insert(child);
            pending.push(child);
        }
    }
}

/// Run exits, transition actions and entries for `transitions` on copies of
/// the configuration and context.
pub(crate) fn execute(
    definition: &MachineDefinition,
    registry: &ActionRegistry,
    configuration: &Configuration,
    context: &Context,
    transitions: &[&TransitionDef],
    event: &str,
) -> Result<Microstep, InterpreterError> {
    let mut exiting = BTreeSet::new();
    let mut entering = BTreeSet::new();
    for transition in transitions {
        exiting.extend(exit_set(definition, configuration, transition));
        if let Some(target) = transition.target {
            entering.extend(entry_path(definition, transition.source, target));
        }
    }
    let retained: BTreeSet<NodeId> = configuration
        .iter()
        .filter(|node| !exiting.contains(node))
        .collect();
    complete_entry(definition, &retained, &mut entering);

    let mut context = context.clone();
    let mut raised = Vec::new();

    let exited: Vec<NodeId> = exiting.iter().rev().copied().collect();
    for node in &exited {
        let state = definition.node(*node);
        debug!(state = %state.id, event, "exiting state");
        run_actions(registry, &state.exit, &state.id, event, &mut context, &mut raised)?;
    }

    for transition in transitions {
        let source = &definition.node(transition.source).id;
        run_actions(registry, &transition.actions, source, event, &mut context, &mut raised)?;
    }

    let entered: Vec<NodeId> = entering.iter().copied().collect();
    for node in &entered {
        let state = definition.node(*node);
        debug!(state = %state.id, event, "entering state");
        run_actions(registry, &state.entry, &state.id, event, &mut context, &mut raised)?;
    }

    let mut active = retained;
    active.extend(entering);
    Ok(Microstep {
        configuration: Configuration::from_set(active),
        context,
        exited,
        entered,
        raised,
    })
}

/// Enter the default configuration from nothing, as `start` does.
pub(crate) fn enter_initial(
    definition: &MachineDefinition,
    registry: &ActionRegistry,
    context: &Context,
    event: &str,
) -> Result<Microstep, InterpreterError> {
    let configuration = Configuration::initial(definition);
    let mut context = context.clone();
    let mut raised = Vec::new();
    let entered: Vec<NodeId> = configuration.iter().collect();
    for node in &entered {
        let state = definition.node(*node);
        debug!(state = %state.id, event, "entering state");
        run_actions(registry, &state.entry, &state.id, event, &mut context, &mut raised)?;
    }
    Ok(Microstep {
        configuration,
        context,
        exited: Vec::new(),
        entered,
        raised,
    })
}

fn run_actions(
    registry: &ActionRegistry,
    actions: &[String],
    state: &str,
    event: &str,
    context: &mut Context,
    raised: &mut Vec<String>,
) -> Result<(), InterpreterError> {
    for name in actions {
        let Some(action) = registry.get_action(name) else {
            // Registries are validated against the definition up front.
            continue;
        };
        debug!(action = %name, state, event, "running action");
        action(&mut ActionContext::new(context, event, state, raised)).map_err(|source| {
            InterpreterError::ActionFailed {
                action: name.clone(),
                state: state.to_string(),
                event: event.to_string(),
                source,
            }
        })?;
    }
    Ok(())
}
