//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions over the current context and the
//! triggering event. When several candidate transitions share an event, the
//! first candidate whose guard passes is taken.

use super::context::Context;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that decides whether a candidate transition is enabled.
///
/// # Example
///
/// ```rust
/// use pasture_sentinel::core::{Context, Guard};
///
/// let low_battery = Guard::new(|ctx: &Context, _event: &str| {
///     ctx.get_i64("battery").is_some_and(|level| level < 20)
/// });
///
/// assert!(low_battery.check(&Context::new().with("battery", 10), "tick"));
/// assert!(!low_battery.check(&Context::new().with("battery", 90), "tick"));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn(&Context, &str) -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a pure predicate.
    ///
    /// The predicate must be deterministic and free of side effects; it may
    /// be evaluated more than once per step (for example by `can`).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &str) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the guard.
    pub fn check(&self, context: &Context, event: &str) -> bool {
        (self.predicate)(context, event)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}
