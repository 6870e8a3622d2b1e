//! Immutable views of an interpreter.

use crate::core::{Context, StateValue};
use serde::{Deserialize, Serialize};

/// Interpreter lifecycle as seen by observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Stopped,
    Done,
}

/// The configuration, context and status published after a macrostep.
///
/// Every snapshot is an independent copy; mutating one never reaches the
/// interpreter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub value: StateValue,
    pub context: Context,
    pub status: Status,
}

impl Snapshot {
    /// Whether the dotted key path is active, e.g. `Deployed.Main.Patrolling`.
    pub fn matches(&self, path: &str) -> bool {
        self.value.matches(path)
    }

    /// Top-level active state.
    pub fn main_state(&self) -> Option<&str> {
        self.value.main_state()
    }

    /// Active leaf keys below the top level.
    pub fn substates(&self) -> Vec<&str> {
        self.value.substates()
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }
}
