//! Fault configuration and the blackhole-interval state machine shared by
//! the egress's drop ticker and per-destination block roll.

use quanta::Instant;
use std::time::Duration;

/// Tunables for one egress's fault injection. Cloned into every egress
/// spawned by the controller.
#[derive(Debug, Clone, Copy)]
pub struct FaultConfig {
    pub drop_probability_per_second: f64,
    pub drop_min: Duration,
    pub drop_max: Duration,
    pub block_probability_per_dst: f64,
    pub block_delay: Duration,
    pub block_min: Duration,
    pub block_max: Duration,
}

/// `NoFault → Pending → Active → Lapsed`, per spec.md §4.D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultState {
    NoFault,
    Pending,
    Active,
    Lapsed,
}

/// A scheduled (or not-yet-scheduled) fault window. `active == false`
/// means no fault has been rolled; the `start`/`end` fields are only
/// meaningful when `active` is true.
#[derive(Debug, Clone, Copy)]
pub struct BlackholeInterval {
    pub active: bool,
    pub start: Instant,
    pub end: Instant,
}

impl BlackholeInterval {
    /// No fault scheduled. `at` seeds the otherwise-unused timestamps.
    pub fn none(at: Instant) -> Self {
        BlackholeInterval {
            active: false,
            start: at,
            end: at,
        }
    }

    pub fn state(&self, now: Instant) -> FaultState {
        if !self.active {
            FaultState::NoFault
        } else if now < self.start {
            FaultState::Pending
        } else if now < self.end {
            FaultState::Active
        } else {
            FaultState::Lapsed
        }
    }

    /// True while traffic should be discarded under this interval.
    pub fn blocks(&self, now: Instant) -> bool {
        matches!(self.state(now), FaultState::Active)
    }

    /// A fault may be (re-)rolled only once it has never fired or has
    /// fully lapsed; `Pending`/`Active` must run to completion first.
    pub fn eligible_for_roll(&self, now: Instant) -> bool {
        matches!(self.state(now), FaultState::NoFault | FaultState::Lapsed)
    }

    /// Duration until the next state transition (start or end), or `None`
    /// if this interval is inactive and nothing will ever change on its
    /// own (the caller substitutes the `forever` sentinel).
    pub fn next_transition(&self, now: Instant) -> Option<Duration> {
        if !self.active {
            return None;
        }
        let candidates = [self.start, self.end]
            .into_iter()
            .filter(|t| *t > now)
            .map(|t| t - now);
        candidates.min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_interval_never_blocks() {
        let iv = BlackholeInterval::none(Instant::now());
        assert!(!iv.blocks(Instant::now()));
        assert_eq!(iv.state(Instant::now()), FaultState::NoFault);
        assert!(iv.eligible_for_roll(Instant::now()));
    }

    #[test]
    fn active_interval_transitions_through_states() {
        let now = Instant::now();
        let iv = BlackholeInterval {
            active: true,
            start: now + Duration::from_millis(50),
            end: now + Duration::from_millis(150),
        };
        assert_eq!(iv.state(now), FaultState::Pending);
        assert!(!iv.blocks(now));
        assert_eq!(iv.state(now + Duration::from_millis(100)), FaultState::Active);
        assert!(iv.blocks(now + Duration::from_millis(100)));
        assert_eq!(iv.state(now + Duration::from_millis(200)), FaultState::Lapsed);
        assert!(!iv.blocks(now + Duration::from_millis(200)));
    }

    #[test]
    fn lapsed_is_eligible_but_pending_and_active_are_not() {
        let now = Instant::now();
        let iv = BlackholeInterval {
            active: true,
            start: now,
            end: now + Duration::from_millis(10),
        };
        assert!(!iv.eligible_for_roll(now));
        assert!(iv.eligible_for_roll(now + Duration::from_millis(20)));
    }

    #[test]
    fn next_transition_picks_the_nearer_of_start_and_end() {
        let now = Instant::now();
        let pending = BlackholeInterval {
            active: true,
            start: now + Duration::from_millis(10),
            end: now + Duration::from_millis(500),
        };
        assert_eq!(pending.next_transition(now), Some(Duration::from_millis(10)));

        let active = BlackholeInterval {
            active: true,
            start: now - Duration::from_millis(10),
            end: now + Duration::from_millis(30),
        };
        assert_eq!(active.next_transition(now), Some(Duration::from_millis(30)));
    }

    #[test]
    fn inactive_interval_has_no_transition() {
        let iv = BlackholeInterval::none(Instant::now());
        assert_eq!(iv.next_transition(Instant::now()), None);
    }

    #[test]
    fn lapsed_interval_has_no_future_transition() {
        let now = Instant::now();
        let iv = BlackholeInterval {
            active: true,
            start: now - Duration::from_millis(100),
            end: now - Duration::from_millis(10),
        };
        assert_eq!(iv.next_transition(now), None);
    }
}
