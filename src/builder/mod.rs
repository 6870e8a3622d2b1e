//! Builder API for declaring statecharts.
//!
//! A [`MachineSpec`] is a nested, serde-friendly description of a state tree.
//! It can be written with fluent methods or loaded from JSON, and compiles
//! into a flat [`MachineDefinition`](crate::core::MachineDefinition) with
//! [`MachineSpec::build`].

pub mod error;
pub mod machine;
pub mod spec;
pub mod transition;

pub use error::DefinitionError;
pub use spec::{MachineSpec, StateSpec};
pub use transition::{DelayedSpec, TransitionSpec};
