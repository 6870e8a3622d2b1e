//! Named actions and guards bound to a definition.

use super::error::ActionError;
use crate::builder::DefinitionError;
use crate::core::{Context, Guard, MachineDefinition};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback run for an action identifier.
pub type ActionFn = Arc<dyn Fn(&mut ActionContext<'_>) -> Result<(), ActionError> + Send + Sync>;

/// What an action sees while it runs.
///
/// The context is a working copy: changes become visible only once the
/// whole macrostep succeeds.
pub struct ActionContext<'a> {
    context: &'a mut Context,
    event: &'a str,
    state: &'a str,
    raised: &'a mut Vec<String>,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        context: &'a mut Context,
        event: &'a str,
        state: &'a str,
        raised: &'a mut Vec<String>,
    ) -> Self {
        Self {
            context,
            event,
            state,
            raised,
        }
    }

    pub fn context(&self) -> &Context {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut *self.context
    }

    /// The signal being processed.
    pub fn event(&self) -> &str {
        self.event
    }

    /// Id of the state whose entry, exit or transition declared the action.
    pub fn state(&self) -> &str {
        self.state
    }

    /// Queue `event` to be processed after the current macrostep.
    pub fn raise(&mut self, event: impl Into<String>) {
        self.raised.push(event.into());
    }
}

/// Mapping from identifiers to the callbacks a definition refers to.
///
/// # Example
///
/// ```rust
/// use pasture_sentinel::interpreter::ActionRegistry;
///
/// let registry = ActionRegistry::new()
///     .action("onCrashed", |ctx| {
///         ctx.context_mut().set("crashed", true);
///         Ok(())
///     })
///     .guard("charged", |ctx, _event| ctx.get_i64("battery").unwrap_or(0) > 20);
///
/// assert!(registry.has_action("onCrashed"));
/// assert!(registry.has_guard("charged"));
/// ```
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionFn>,
    guards: HashMap<String, Guard>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.register_action(name, action);
        self
    }

    pub fn guard<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context, &str) -> bool + Send + Sync + 'static,
    {
        self.register_guard(name, Guard::new(predicate));
        self
    }

    /// Register or replace an action.
    pub fn register_action<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: Fn(&mut ActionContext<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
    }

    pub fn register_guard(&mut self, name: impl Into<String>, guard: Guard) {
        self.guards.insert(name.into(), guard);
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_guard(&self, name: &str) -> bool {
        self.guards.contains_key(name)
    }

    pub(crate) fn get_action(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(name)
    }

    pub(crate) fn get_guard(&self, name: &str) -> Option<&Guard> {
        self.guards.get(name)
    }

    /// Check that every action and guard `definition` names is registered.
    pub fn validate(&self, definition: &MachineDefinition) -> Result<(), DefinitionError> {
        let missing_actions = definition
            .action_references()
            .into_iter()
            .filter(|(name, _)| !self.has_action(name))
            .map(|(action, state)| DefinitionError::UnknownAction {
                state: state.to_string(),
                action: action.to_string(),
            });
        let missing_guards = definition
            .guard_references()
            .into_iter()
            .filter(|(name, _)| !self.has_guard(name))
            .map(|(guard, state)| DefinitionError::UnknownGuard {
                state: state.to_string(),
                guard: guard.to_string(),
            });
        DefinitionError::collect(missing_actions.chain(missing_guards).collect())
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<_> = self.actions.keys().collect();
        let mut guards: Vec<_> = self.guards.keys().collect();
        actions.sort();
        guards.sort();
        f.debug_struct("ActionRegistry")
            .field("actions", &actions)
            .field("guards", &guards)
            .finish()
    }
}
