//! Refresh stamping and repeating poll timers.
//!
//! Polls may overlap in flight. Each request carries a monotonically
//! increasing stamp and a completion is applied only when its stamp is newer
//! than the last one applied, so a slow earlier response can never regress
//! what is on screen.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestStamp(pub u64);

#[derive(Debug, Default, Clone)]
pub struct StampSequencer {
    issued: u64,
    applied: Option<u64>,
}

impl StampSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestStamp {
        self.issued += 1;
        RequestStamp(self.issued)
    }

    /// Returns true and records the stamp when it is newer than every stamp
    /// accepted so far.
    pub fn accept(&mut self, stamp: RequestStamp) -> bool {
        match self.applied {
            Some(applied) if stamp.0 <= applied => false,
            _ => {
                self.applied = Some(stamp.0);
                true
            }
        }
    }

    /// Rejects every stamp issued so far, so polls already in flight can no
    /// longer land.
    pub fn invalidate(&mut self) {
        self.applied = Some(self.issued);
    }

    pub fn latest_issued(&self) -> Option<RequestStamp> {
        (self.issued > 0).then_some(RequestStamp(self.issued))
    }

    pub fn latest_applied(&self) -> Option<RequestStamp> {
        self.applied.map(RequestStamp)
    }
}

/// Repeating timer driven by the console tick. A disabled timer holds no
/// deadline, so it cannot fire until re-armed.
#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(50)),
            next_due: None,
        }
    }

    /// Arms the timer so it fires immediately on the next tick.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Fires at most once per call; a late tick does not replay missed periods.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_completion_wins_over_slow_earlier_one() {
        let mut sequencer = StampSequencer::new();
        let first = sequencer.issue();
        let second = sequencer.issue();
        assert!(sequencer.accept(second));
        assert!(!sequencer.accept(first));
        assert_eq!(sequencer.latest_applied(), Some(second));
    }

    #[test]
    fn in_order_completions_are_all_applied() {
        let mut sequencer = StampSequencer::new();
        let first = sequencer.issue();
        let second = sequencer.issue();
        assert!(sequencer.accept(first));
        assert!(sequencer.accept(second));
        assert!(!sequencer.accept(second));
    }

    #[test]
    fn invalidated_stamps_are_rejected() {
        let mut sequencer = StampSequencer::new();
        let in_flight = sequencer.issue();
        sequencer.invalidate();
        assert!(!sequencer.accept(in_flight));
        let next = sequencer.issue();
        assert!(sequencer.accept(next));
    }

    #[test]
    fn timer_fires_on_interval() {
        let start = Instant::now();
        let mut timer = PollTimer::new(Duration::from_secs(2));
        assert!(!timer.fire_if_due(start));
        timer.start(start);
        assert!(timer.fire_if_due(start));
        assert!(!timer.fire_if_due(start + Duration::from_secs(1)));
        assert!(timer.fire_if_due(start + Duration::from_secs(2)));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let start = Instant::now();
        let mut timer = PollTimer::new(Duration::from_secs(1));
        timer.start(start);
        timer.cancel();
        assert!(!timer.is_active());
        assert!(!timer.fire_if_due(start + Duration::from_secs(60)));
    }
}
