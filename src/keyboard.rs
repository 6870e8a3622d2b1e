//! Key press shortcuts for the mission.

use crate::interpreter::{Delivery, Interpreter, InterpreterError, Snapshot};
use crate::mission::signals;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type Condition = Arc<dyn Fn(&Snapshot) -> bool + Send + Sync>;

/// One shortcut: a key, the signal it sends, and when it is allowed.
#[derive(Clone)]
pub struct KeyBinding {
    pub key: char,
    pub signal: String,
    condition: Condition,
}

impl KeyBinding {
    pub fn new<F>(key: char, signal: impl Into<String>, condition: F) -> Self
    where
        F: Fn(&Snapshot) -> bool + Send + Sync + 'static,
    {
        Self {
            key: key.to_ascii_lowercase(),
            signal: signal.into(),
            condition: Arc::new(condition),
        }
    }

    /// Binding that applies whenever `path` is active.
    pub fn when_in(key: char, signal: impl Into<String>, path: &str) -> Self {
        let path = path.to_string();
        Self::new(key, signal, move |snapshot| snapshot.matches(&path))
    }

    pub fn applies(&self, snapshot: &Snapshot) -> bool {
        (self.condition)(snapshot)
    }
}

impl fmt::Debug for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBinding")
            .field("key", &self.key)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

/// Maps key presses to signals, conditioned on the live snapshot.
///
/// The snapshot is read from the interpreter on every press.
#[derive(Clone, Debug, Default)]
pub struct KeyDispatcher {
    bindings: Vec<KeyBinding>,
}

impl KeyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for keys `1` to `6`.
    pub fn mission() -> Self {
        Self::new()
            .bind(KeyBinding::when_in('1', signals::START_SOI, "Undeployed.Off"))
            .bind(KeyBinding::when_in('2', signals::FLIGHT_PLAN, "Undeployed"))
            .bind(KeyBinding::when_in('3', signals::READY_FOR_MISSION, "Undeployed"))
            .bind(KeyBinding::when_in('4', signals::START_SHEEP_GUARD_MISSION, "Undeployed"))
            .bind(KeyBinding::when_in('5', signals::START_PATROLLING, "Deployed"))
            .bind(KeyBinding::when_in('6', signals::PREDATOR_DETECTED, "Deployed"))
    }

    /// Add a binding; the first binding for a key that applies wins.
    pub fn bind(mut self, binding: KeyBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    /// Signal `key` maps to in `snapshot`, if any.
    pub fn resolve(&self, key: char, snapshot: &Snapshot) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.bindings
            .iter()
            .find(|binding| binding.key == key && binding.applies(snapshot))
            .map(|binding| binding.signal.as_str())
    }

    /// Send the signal bound to `key`, if its condition holds right now.
    ///
    /// Returns `Ok(None)` when no binding applies.
    pub fn dispatch(
        &self,
        interpreter: &Interpreter,
        key: char,
    ) -> Result<Option<Delivery>, InterpreterError> {
        let snapshot = interpreter.get_snapshot();
        let Some(signal) = self.resolve(key, &snapshot) else {
            debug!(%key, state = ?snapshot.main_state(), "no shortcut applies");
            return Ok(None);
        };
        interpreter.send(signal).map(Some)
    }
}
