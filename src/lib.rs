//! Pasture Sentinel: a statechart interpreter for a sheep-guarding drone
//!
//! The crate is split into a pure core and an imperative shell. The core
//! holds the compiled state tree, active configurations, context and
//! history, and has no side effects. The interpreter owns the running
//! state, executes actions, manages logical-clock timers and publishes
//! snapshots to subscribers.
//!
//! # Core Concepts
//!
//! - **Definition**: An immutable tree of atomic, compound, parallel and final states
//! - **Configuration**: The set of active states, rendered as a nested `StateValue`
//! - **Interpreter**: Run-to-completion processing of signals, one macrostep at a time
//! - **Snapshot**: What subscribers see after every change
//! - **Checkpoint**: A serializable capture that restores into a fresh interpreter
//!
//! # Example
//!
//! ```rust
//! use pasture_sentinel::{ActionRegistry, Interpreter, MachineSpec, StateSpec, TransitionSpec};
//!
//! let definition = MachineSpec::new("door")
//!     .initial("closed")
//!     .state("closed", StateSpec::atomic().on("open", TransitionSpec::to("opened")))
//!     .state(
//!         "opened",
//!         StateSpec::atomic()
//!             .entry("chime")
//!             .on("close", TransitionSpec::to("closed")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let actions = ActionRegistry::new().action("chime", |_| Ok(()));
//! let door = Interpreter::new(definition, actions).unwrap();
//! door.start().unwrap();
//! door.send("open").unwrap();
//! assert!(door.get_snapshot().matches("opened"));
//! ```

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod interpreter;
pub mod keyboard;
pub mod mission;
pub mod transport;

// Re-export commonly used types
pub use builder::{DefinitionError, MachineSpec, StateSpec, TransitionSpec};
pub use checkpoint::{Checkpoint, CheckpointError};
pub use config::SentinelConfig;
pub use core::{Context, MachineDefinition, StateValue};
pub use interpreter::{
    ActionContext, ActionError, ActionRegistry, Delivery, Interpreter, InterpreterError,
    Snapshot, Status,
};
