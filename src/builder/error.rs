//! Definition errors for state tree construction.

use thiserror::Error;

/// Errors that can occur when building a state tree or binding its actions.
///
/// Validation does not stop at the first problem: everything wrong with a
/// definition is reported together as [`DefinitionError::Multiple`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Machine id must not be empty")]
    EmptyId,

    #[error("State key '{key}' under '{parent}' is invalid: keys must be non-empty and contain no '.' or '#'")]
    InvalidKey { parent: String, key: String },

    #[error("State id '{id}' is declared more than once")]
    DuplicateId { id: String },

    #[error("Compound state '{state}' does not declare an initial child")]
    MissingInitial { state: String },

    #[error("Initial child '{initial}' of state '{state}' does not exist")]
    UnknownInitial { state: String, initial: String },

    #[error("State '{state}' is {kind} and cannot declare an initial child")]
    UnexpectedInitial { state: String, kind: String },

    #[error("State '{state}' is {kind} and cannot have children")]
    ChildrenOnLeaf { state: String, kind: String },

    #[error("State '{state}' is {kind} and needs at least one child")]
    EmptyComposite { state: String, kind: String },

    #[error("Transition on '{event}' from '{state}' targets '{target}', which does not resolve")]
    UnresolvedTarget {
        state: String,
        event: String,
        target: String,
    },

    #[error("Delayed transition from '{state}' must have a non-zero delay")]
    ZeroDelay { state: String },

    #[error("State '{state}' references unknown action '{action}'")]
    UnknownAction { state: String, action: String },

    #[error("State '{state}' references unknown guard '{guard}'")]
    UnknownGuard { state: String, guard: String },

    #[error("{} definition errors: {}", .0.len(), join(.0))]
    Multiple(Vec<DefinitionError>),
}

impl DefinitionError {
    /// Fold a list of problems into a single result.
    pub fn collect(mut errors: Vec<DefinitionError>) -> Result<(), DefinitionError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(DefinitionError::Multiple(errors)),
        }
    }

    /// Individual problems, flattening `Multiple`.
    pub fn issues(&self) -> Vec<&DefinitionError> {
        match self {
            DefinitionError::Multiple(errors) => errors.iter().collect(),
            single => vec![single],
        }
    }
}

fn join(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
