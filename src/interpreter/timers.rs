//! Delayed transitions on a logical clock.
//!
//! The interpreter never reads wall time. A host advances the clock
//! explicitly and every timer that falls due is delivered like any other
//! signal, through the same queue.

use crate::core::NodeId;
use std::collections::BTreeMap;
use std::time::Duration;

/// Identifies one delayed transition: the declaring state and its position
/// in that state's `after` list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TimerKey {
    pub state: NodeId,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ArmedTimer {
    deadline: Duration,
    generation: u64,
    fired: bool,
}

/// Armed timers keyed by the transition they will take.
///
/// Each arming gets a fresh generation, so a timer that fired for an
/// earlier visit of a state is recognisably stale after the state is
/// re-entered.
#[derive(Clone, Debug, Default)]
pub(crate) struct TimerQueue {
    now: Duration,
    armed: BTreeMap<TimerKey, ArmedTimer>,
    next_generation: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn arm(&mut self, key: TimerKey, delay: Duration) {
        self.next_generation += 1;
        self.armed.insert(
            key,
            ArmedTimer {
                deadline: self.now + delay,
                generation: self.next_generation,
                fired: false,
            },
        );
    }

    /// Cancel every timer declared by `state`.
    pub fn disarm_state(&mut self, state: NodeId) {
        self.armed.retain(|key, _| key.state != state);
    }

    pub fn remove(&mut self, key: TimerKey) {
        self.armed.remove(&key);
    }

    pub fn clear(&mut self) {
        self.armed.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    /// Whether a delivered timer still belongs to the current visit of its
    /// state.
    pub fn is_current(&self, key: TimerKey, generation: u64) -> bool {
        self.armed
            .get(&key)
            .is_some_and(|timer| timer.generation == generation)
    }

    /// Let a fired timer fire again, after the step it triggered failed.
    pub fn rearm_fired(&mut self, key: TimerKey, generation: u64) {
        if let Some(timer) = self.armed.get_mut(&key) {
            if timer.generation == generation {
                timer.fired = false;
            }
        }
    }

    /// Move the clock to the earliest unfired deadline no later than
    /// `until` and mark that timer fired.
    ///
    /// Ties are broken by key, so timers due together fire in document
    /// order of their states.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerKey, u64)> {
        let (key, timer) = self
            .armed
            .iter_mut()
            .filter(|(_, timer)| !timer.fired && timer.deadline <= until)
            .min_by_key(|(key, timer)| (timer.deadline, **key))?;
        timer.fired = true;
        self.now = self.now.max(timer.deadline);
        Some((*key, timer.generation))
    }

    /// Move the clock forward to `until` without firing anything.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    /// Time left until the next unfired timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.armed
            .values()
            .filter(|timer| !timer.fired)
            .map(|timer| timer.deadline.saturating_sub(self.now))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(state: usize) -> TimerKey {
        TimerKey {
            state: NodeId(state),
            index: 0,
        }
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.arm(key(5), Duration::from_millis(300));
        timers.arm(key(2), Duration::from_millis(100));

        let until = Duration::from_millis(500);
        let (first, _) = timers.pop_due(until).unwrap();
        assert_eq!(first, key(2));
        assert_eq!(timers.now(), Duration::from_millis(100));
        let (second, _) = timers.pop_due(until).unwrap();
        assert_eq!(second, key(5));
        assert!(timers.pop_due(until).is_none());
    }

    #[test]
    fn not_due_before_deadline() {
        let mut timers = TimerQueue::new();
        timers.arm(key(1), Duration::from_secs(2));
        assert!(timers.pop_due(Duration::from_millis(1999)).is_none());
        assert_eq!(timers.next_deadline(), Some(Duration::from_secs(2)));

        timers.settle(Duration::from_millis(1500));
        assert_eq!(timers.next_deadline(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn rearming_makes_old_generation_stale() {
        let mut timers = TimerQueue::new();
        timers.arm(key(1), Duration::from_secs(1));
        let (fired, generation) = timers.pop_due(Duration::from_secs(1)).unwrap();
        timers.arm(key(1), Duration::from_secs(1));

        assert!(!timers.is_current(fired, generation));
    }

    #[test]
    fn disarm_cancels_state_timers() {
        let mut timers = TimerQueue::new();
        timers.arm(key(1), Duration::from_secs(1));
        timers.arm(
            TimerKey {
                state: NodeId(1),
                index: 1,
            },
            Duration::from_secs(3),
        );
        timers.arm(key(4), Duration::from_secs(2));

        timers.disarm_state(NodeId(1));
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.pop_due(Duration::from_secs(10)).map(|(k, _)| k), Some(key(4)));
    }

    #[test]
    fn failed_step_lets_timer_fire_again() {
        let mut timers = TimerQueue::new();
        timers.arm(key(1), Duration::from_secs(1));
        let (fired, generation) = timers.pop_due(Duration::from_secs(1)).unwrap();
        assert_eq!(timers.next_deadline(), None);

        timers.rearm_fired(fired, generation);
        assert_eq!(timers.next_deadline(), Some(Duration::ZERO));
        assert!(timers.pop_due(Duration::from_secs(1)).is_some());
    }
}
