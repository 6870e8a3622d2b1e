//! Signal vocabulary of the pasture sentinel mission.

pub const START_SOI: &str = "Start SOI";
pub const FLIGHT_PLAN: &str = "FlightPlan";
pub const FLIGHT_PLAN_CHECK_FAILED: &str = "FlightPlan Check Failed";
pub const READY_FOR_MISSION: &str = "Ready for mission";
pub const START_SHEEP_GUARD_MISSION: &str = "Start Sheep Guard Mission";
pub const START_PATROLLING: &str = "Start Patrolling";
pub const PREDATOR_DETECTED: &str = "Predator Detected inside tracking perimeter";
pub const PREDATOR_ENTERING_SAFE_AREA: &str = "Predator Entering Safe Area";
pub const PREDATOR_LEAVING_SAFE_AREA: &str = "Predator Leaving Safe Area";
pub const PREDATOR_LEAVING_TRACKING_PERIMETER: &str = "Predator Leaving Tracking Perimeter";
pub const CRASHED_DETECTED: &str = "Crashed Detected";

/// Every signal the mission reacts to.
pub const ALL: [&str; 11] = [
    START_SOI,
    FLIGHT_PLAN,
    FLIGHT_PLAN_CHECK_FAILED,
    READY_FOR_MISSION,
    START_SHEEP_GUARD_MISSION,
    START_PATROLLING,
    PREDATOR_DETECTED,
    PREDATOR_ENTERING_SAFE_AREA,
    PREDATOR_LEAVING_SAFE_AREA,
    PREDATOR_LEAVING_TRACKING_PERIMETER,
    CRASHED_DETECTED,
];

pub fn is_known(signal: &str) -> bool {
    ALL.contains(&signal)
}
