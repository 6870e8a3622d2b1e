//! Default mission actions.
//!
//! They only log and keep the shared context flags current; a host can
//! replace any of them by registering its own callback under the same name.

use crate::interpreter::{ActionContext, ActionError, ActionRegistry};
use tracing::info;

pub const LOG_STATE_ENTRY: &str = "logStateEntry";
pub const ON_START_SOI: &str = "onStartSOI";
pub const ON_FLIGHT_PLAN_RECEIVED: &str = "onFlightPlanReceived";
pub const ON_FLIGHT_PLAN_FAILED: &str = "onFlightPlanFailed";
pub const ON_READY_FOR_MISSION: &str = "onReadyForMission";
pub const ON_MISSION_START: &str = "onMissionStart";
pub const ON_DEPLOYED: &str = "onDeployed";
pub const ON_START_PATROLLING: &str = "onStartPatrolling";
pub const ON_PREDATOR_DETECTED: &str = "onPredatorDetected";
pub const ON_START_COUNTER_ACTION: &str = "onStartCounterAction";
pub const ON_PREDATOR_ENTERING_SAFE_AREA: &str = "onPredatorEnteringSafeArea";
pub const ON_PREDATOR_LEAVING_SAFE_AREA: &str = "onPredatorLeavingSafeArea";
pub const ON_PREDATOR_LEAVING_PERIMETER: &str = "onPredatorLeavingPerimeter";
pub const ON_CRASHED: &str = "onCrashed";

/// Context key set while a predator is being tracked or countered.
pub const PREDATOR_DETECTED_KEY: &str = "predatorDetected";

fn announce(message: &'static str) -> impl Fn(&mut ActionContext<'_>) -> Result<(), ActionError> {
    move |ctx: &mut ActionContext<'_>| {
        info!(state = ctx.state(), event = ctx.event(), "{message}");
        Ok(())
    }
}

/// Registry with every action either mission variant refers to.
pub fn default_actions() -> ActionRegistry {
    ActionRegistry::new()
        .action(LOG_STATE_ENTRY, |ctx| {
            info!(state = ctx.state(), event = ctx.event(), "entering state");
            Ok(())
        })
        .action(ON_START_SOI, announce("SOI started"))
        .action(ON_FLIGHT_PLAN_RECEIVED, announce("flight plan received and validated"))
        .action(ON_FLIGHT_PLAN_FAILED, announce("flight plan check failed"))
        .action(ON_READY_FOR_MISSION, announce("system ready for mission"))
        .action(ON_MISSION_START, announce("mission started"))
        .action(ON_DEPLOYED, announce("system deployed"))
        .action(ON_START_PATROLLING, announce("started patrolling"))
        .action(ON_PREDATOR_DETECTED, |ctx| {
            info!(state = ctx.state(), "predator detected");
            ctx.context_mut().set(PREDATOR_DETECTED_KEY, true);
            Ok(())
        })
        .action(ON_START_COUNTER_ACTION, announce("starting counteraction"))
        .action(
            ON_PREDATOR_ENTERING_SAFE_AREA,
            announce("predator entering safe area, activating counteraction"),
        )
        .action(
            ON_PREDATOR_LEAVING_SAFE_AREA,
            announce("predator leaving safe area, returning to tracking"),
        )
        .action(ON_PREDATOR_LEAVING_PERIMETER, |ctx| {
            info!(state = ctx.state(), "predator leaving tracking perimeter");
            ctx.context_mut().set(PREDATOR_DETECTED_KEY, false);
            Ok(())
        })
        .action(ON_CRASHED, announce("system crashed"))
}
