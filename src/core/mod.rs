//! Core statechart types and logic.
//!
//! This module contains the pure functional core of the statechart:
//! - The compiled, immutable state tree (`MachineDefinition`, `StateNode`)
//! - Active configurations and their nested-mapping form (`StateValue`)
//! - The extended-state bag (`Context`) and guard predicates
//! - Immutable macrostep history
//!
//! Nothing here runs actions or owns timers; that is the interpreter's job.

mod configuration;
mod context;
mod definition;
mod guard;
mod history;
mod node;
mod value;

pub(crate) use configuration::add_default_entry;
pub use configuration::Configuration;
pub use context::Context;
pub use definition::MachineDefinition;
pub use guard::Guard;
pub use history::{StepHistory, StepRecord};
pub use node::{DelayedTransition, NodeId, StateKind, StateNode, TransitionDef};
pub use value::{StateValue, ValueError};
