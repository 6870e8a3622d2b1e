//! Checkpoint and resume functionality for interpreters.
//!
//! A checkpoint captures everything observable about a running interpreter:
//! its configuration (as a state value), context, status and step history.
//! Actions and guards are code and are not captured; resuming needs the same
//! definition and a registry for it.

use crate::core::{Configuration, Context, MachineDefinition, StateValue, StepHistory};
use crate::interpreter::{
    ActionRegistry, Interpreter, InterpreterOptions, Lifecycle, Resumed, Status,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable checkpoint of an interpreter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// Id of the machine definition the checkpoint was taken from
    pub machine: String,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// Active configuration
    pub value: StateValue,

    pub context: Context,

    pub status: Status,

    /// Macrosteps taken so far
    pub history: StepHistory,
}

impl Checkpoint {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Parse a checkpoint, rejecting formats this version cannot read.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Checkpoint = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(checkpoint)
    }
}

impl Interpreter {
    /// Capture the current snapshot and history.
    pub fn checkpoint(&self) -> Checkpoint {
        let (snapshot, history) = self.capture();
        Checkpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            machine: self.definition().id().to_string(),
            timestamp: Utc::now(),
            value: snapshot.value,
            context: snapshot.context,
            status: snapshot.status,
            history,
        }
    }

    /// Rebuild an interpreter from `checkpoint`.
    ///
    /// An active checkpoint resumes running without re-running entry
    /// actions; delayed transitions of the restored states are armed afresh
    /// on a clock starting at zero. No snapshot is published.
    ///
    /// A checkpoint marked active whose value is a top-level final state
    /// resumes as done.
    pub fn restore(
        definition: impl Into<Arc<MachineDefinition>>,
        registry: ActionRegistry,
        checkpoint: Checkpoint,
        options: InterpreterOptions,
    ) -> Result<Self, CheckpointError> {
        let definition = definition.into();
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        if checkpoint.machine != definition.id() {
            return Err(CheckpointError::MachineMismatch {
                expected: definition.id().to_string(),
                found: checkpoint.machine,
            });
        }
        let configuration = Configuration::from_value(&definition, &checkpoint.value)?;
        info!(
            machine = %checkpoint.machine,
            checkpoint = %checkpoint.id,
            status = ?checkpoint.status,
            "restoring interpreter"
        );

        let mut lifecycle = Lifecycle::resumed(checkpoint.status);
        if lifecycle == Lifecycle::Running
            && configuration.is_in_final(&definition, definition.root())
        {
            warn!(machine = %checkpoint.machine, "active checkpoint is in a final state; resuming as done");
            lifecycle = Lifecycle::Done;
        }

        let resumed = Resumed {
            lifecycle,
            configuration,
            context: checkpoint.context,
            history: checkpoint.history,
        };
        Ok(Interpreter::assemble(definition, registry, &options, resumed)?)
    }
}
